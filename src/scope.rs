// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::addrs::*;
use crate::diagnostics::*;
use crate::typing::Type;
use crate::value::Value;
use crate::*;

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use log::trace;

/// Resolved names available to one evaluation.
///
/// Holds one value per root name (`var`, `local`, a resource type, ...),
/// each an object nesting the referenced objects below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalContext {
    variables: BTreeMap<Rc<str>, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(Rc::from(name), value);
    }

    /// Places `value` at the position of `addr`, creating the enclosing
    /// objects as needed.
    pub fn insert(&mut self, addr: &Addr, value: Value) -> Result<()> {
        let path = addr.path();
        let Some((last, parents)) = path.split_last() else {
            self.set_variable(addr.root_name(), value);
            return Ok(());
        };

        let root = self
            .variables
            .entry(Rc::from(addr.root_name()))
            .or_insert_with(Value::new_object);
        let mut fields = root
            .as_map_mut()
            .map_err(|_| anyhow!("`{}` is not an object", addr.root_name()))?;
        for parent in parents {
            let entry = fields
                .entry(Rc::from(*parent))
                .or_insert_with(Value::new_object);
            fields = match entry.as_map_mut() {
                Ok(f) => f,
                Err(_) => bail!("`{parent}` in `{addr}` is not an object"),
            };
        }
        fields.insert(Rc::from(*last), value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Source of values for the objects an expression refers to.
///
/// Implementations are shared by concurrent evaluations and must only be
/// read while building a context.
pub trait Scope {
    /// Builds a context holding exactly the given references.
    fn eval_context(&self, refs: &[Reference]) -> (EvalContext, Diagnostics);
}

/// Scope backed by a fixed table of address to value.
#[derive(Debug, Clone, Default)]
pub struct StaticScope {
    values: BTreeMap<Addr, Value>,
    unknown_fallback: bool,
}

impl StaticScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves references missing from the table to unknown values instead
    /// of reporting them. Models a validation pass where nothing has been
    /// computed yet.
    pub fn with_unknown_fallback(mut self) -> Self {
        self.unknown_fallback = true;
        self
    }

    pub fn set(&mut self, addr: &str, value: Value) -> Result<()> {
        match Addr::parse(addr) {
            Some(a) => {
                self.values.insert(a, value);
                Ok(())
            }
            None => bail!("invalid address `{addr}`"),
        }
    }

    pub fn with(mut self, addr: &str, value: Value) -> Result<Self> {
        self.set(addr, value)?;
        Ok(self)
    }

    /// Builds a scope from an object whose keys are addresses.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut scope = Self::new();
        for (addr, v) in value.as_map()? {
            scope.set(addr, v.clone())?;
        }
        Ok(scope)
    }

    pub fn get(&self, addr: &Addr) -> Option<&Value> {
        self.values.get(addr)
    }
}

fn undeclared(reference: &Reference) -> Diagnostic {
    let addr = &reference.addr;
    let (summary, detail) = match addr {
        Addr::InputVariable(name) => (
            "Reference to undeclared input variable",
            format!("An input variable with the name \"{name}\" has not been declared."),
        ),
        Addr::LocalValue(name) => (
            "Reference to undeclared local value",
            format!("A local value with the name \"{name}\" has not been declared."),
        ),
        Addr::ModuleCall(name) => (
            "Reference to undeclared module",
            format!("No module call named \"{name}\" is declared."),
        ),
        Addr::Resource { .. } => (
            "Reference to undeclared resource",
            format!("A resource \"{addr}\" has not been declared."),
        ),
        Addr::CountAttr(_) => (
            "Reference to \"count\" in non-counted context",
            "The \"count\" object can only be used in blocks that have the \"count\" argument set."
                .to_string(),
        ),
        Addr::ForEachAttr(_) => (
            "Reference to \"each\" in context without for_each",
            "The \"each\" object can be used only in blocks that have the \"for_each\" argument set."
                .to_string(),
        ),
        _ => (
            "Reference to unavailable object",
            format!("The object \"{addr}\" is not available here."),
        ),
    };
    Diagnostic::error(DiagnosticKind::UndeclaredReference, summary, detail)
        .with_subject(&reference.span)
}

impl Scope for StaticScope {
    fn eval_context(&self, refs: &[Reference]) -> (EvalContext, Diagnostics) {
        let mut ctx = EvalContext::new();
        let mut diags = Diagnostics::new();
        for reference in refs {
            let value = match (self.values.get(&reference.addr), self.unknown_fallback) {
                (Some(v), _) => v.clone(),
                (None, true) => Value::unknown(Type::Dynamic),
                (None, false) => {
                    diags.push(undeclared(reference));
                    continue;
                }
            };
            trace!("resolved {} to {value}", reference.addr);
            if let Err(e) = ctx.insert(&reference.addr, value) {
                diags.push(
                    Diagnostic::error(DiagnosticKind::InvalidReference, "Invalid reference", e.to_string())
                        .with_subject(&reference.span),
                );
            }
        }
        (ctx, diags)
    }
}

impl<S: Scope + ?Sized> Scope for &S {
    fn eval_context(&self, refs: &[Reference]) -> (EvalContext, Diagnostics) {
        (**self).eval_context(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(addr: &str) -> Result<Reference> {
        let source = crate::lexer::Source::from_contents("refs.tf".to_string(), addr.to_string())?;
        let expr = crate::parser::Parser::new(&source)?.parse_expression()?;
        let (mut refs, _) = references(&expr);
        refs.pop().ok_or_else(|| anyhow!("no reference in {addr}"))
    }

    #[test]
    fn builds_nested_context() -> Result<()> {
        let scope = StaticScope::new()
            .with("var.regions", Value::from("x"))?
            .with("data.aws_ami.base", Value::from("ami"))?;
        let refs = vec![reference("var.regions")?, reference("data.aws_ami.base.id")?];
        let (ctx, diags) = scope.eval_context(&refs);
        assert!(diags.is_empty());
        assert_eq!(ctx.len(), 2);
        let data = ctx.variable("data").and_then(|d| d.get("aws_ami"));
        assert_eq!(data.and_then(|d| d.get("base")), Some(&Value::from("ami")));
        Ok(())
    }

    #[test]
    fn only_referenced_names_are_resolved() -> Result<()> {
        let scope = StaticScope::new()
            .with("var.a", Value::from(1))?
            .with("var.b", Value::from(2))?;
        let (ctx, _) = scope.eval_context(&[reference("var.a")?]);
        assert_eq!(ctx.variable("var").and_then(|v| v.get("b")), None);
        Ok(())
    }

    #[test]
    fn undeclared_and_fallback() -> Result<()> {
        let refs = vec![reference("var.missing")?];
        let (_, diags) = StaticScope::new().eval_context(&refs);
        assert_eq!(diags.kinds(), vec![DiagnosticKind::UndeclaredReference]);

        let (ctx, diags) = StaticScope::new().with_unknown_fallback().eval_context(&refs);
        assert!(diags.is_empty());
        let v = ctx.variable("var").and_then(|v| v.get("missing"));
        assert_eq!(v, Some(&Value::unknown(Type::Dynamic)));
        Ok(())
    }
}
