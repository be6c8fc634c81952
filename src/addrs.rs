// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::diagnostics::*;
use crate::lexer::Span;
use crate::value::{Data, Known};
use crate::*;

use core::fmt;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// An object that an expression can refer to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Addr {
    InputVariable(Rc<str>),
    LocalValue(Rc<str>),
    ModuleCall(Rc<str>),
    Resource {
        mode: ResourceMode,
        type_name: Rc<str>,
        name: Rc<str>,
    },
    CountAttr(Rc<str>),
    ForEachAttr(Rc<str>),
    PathAttr(Rc<str>),
    TerraformAttr(Rc<str>),
    SelfRef,
}

impl Addr {
    /// Name of the root variable this address lives under in an evaluation
    /// context.
    pub fn root_name(&self) -> &str {
        match self {
            Addr::InputVariable(_) => "var",
            Addr::LocalValue(_) => "local",
            Addr::ModuleCall(_) => "module",
            Addr::Resource {
                mode: ResourceMode::Data,
                ..
            } => "data",
            Addr::Resource { type_name, .. } => type_name,
            Addr::CountAttr(_) => "count",
            Addr::ForEachAttr(_) => "each",
            Addr::PathAttr(_) => "path",
            Addr::TerraformAttr(_) => "terraform",
            Addr::SelfRef => "self",
        }
    }

    /// Attribute path below the root variable.
    pub fn path(&self) -> Vec<&str> {
        match self {
            Addr::InputVariable(n)
            | Addr::LocalValue(n)
            | Addr::ModuleCall(n)
            | Addr::CountAttr(n)
            | Addr::ForEachAttr(n)
            | Addr::PathAttr(n)
            | Addr::TerraformAttr(n) => vec![n.as_ref()],
            Addr::Resource {
                mode: ResourceMode::Data,
                type_name,
                name,
            } => vec![type_name.as_ref(), name.as_ref()],
            Addr::Resource { name, .. } => vec![name.as_ref()],
            Addr::SelfRef => vec![],
        }
    }

    /// Parses an address string such as `var.names` or `data.aws_ami.base`.
    pub fn parse(text: &str) -> Option<Addr> {
        let parts: Vec<&str> = text.split('.').collect();
        let (root, rest) = parts.split_first()?;
        let (addr, consumed) = addr_from_steps(root, rest).ok()?;
        match consumed == rest.len() {
            true => Some(addr),
            false => None,
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![self.root_name()];
        parts.extend(self.path());
        f.write_str(&parts.join("."))
    }
}

/// A reference found in an expression, with the location it was written at.
#[derive(Debug, Clone)]
pub struct Reference {
    pub addr: Addr,
    pub span: Span,
}

// Builds an address from a root name and the attribute steps following it.
// Returns the address and the number of steps it consumed.
fn addr_from_steps(root: &str, steps: &[&str]) -> Result<(Addr, usize), String> {
    let attr = |what: &str| -> Result<Rc<str>, String> {
        match steps.first() {
            Some(name) => Ok(Rc::from(*name)),
            None => Err(format!(
                "The \"{root}\" object cannot be accessed directly. Instead, access one of its attributes{what}."
            )),
        }
    };

    let addr = match root {
        "var" => Addr::InputVariable(attr(", an input variable name")?),
        "local" => Addr::LocalValue(attr(", a local value name")?),
        "module" => Addr::ModuleCall(attr(", a module call name")?),
        "path" => Addr::PathAttr(attr("")?),
        "terraform" => Addr::TerraformAttr(attr("")?),
        "count" => match attr("")?.as_ref() {
            "index" => Addr::CountAttr(Rc::from("index")),
            name => {
                return Err(format!(
                    "The \"count\" object does not have an attribute named \"{name}\". The only supported attribute is count.index."
                ))
            }
        },
        "each" => match attr("")?.as_ref() {
            name @ ("key" | "value") => Addr::ForEachAttr(Rc::from(name)),
            name => {
                return Err(format!(
                    "The \"each\" object does not have an attribute named \"{name}\". The supported attributes are each.key and each.value."
                ))
            }
        },
        "self" => return Ok((Addr::SelfRef, 0)),
        "data" => match steps {
            [type_name, name, ..] => {
                return Ok((
                    Addr::Resource {
                        mode: ResourceMode::Data,
                        type_name: Rc::from(*type_name),
                        name: Rc::from(*name),
                    },
                    2,
                ))
            }
            _ => {
                return Err(
                    "The \"data\" object must be followed by two attribute names: the data source type and the resource name."
                        .to_string(),
                )
            }
        },
        type_name => match steps.first() {
            Some(name) => Addr::Resource {
                mode: ResourceMode::Managed,
                type_name: Rc::from(type_name),
                name: Rc::from(*name),
            },
            None => {
                return Err(
                    "A reference to a resource type must be followed by at least one attribute access, specifying the resource name."
                        .to_string(),
                )
            }
        },
    };
    Ok((addr, 1))
}

// One step of a traversal: `.name` or `[index]`.
#[derive(Clone, Copy)]
enum Step<'a> {
    Attr(&'a str),
    Index(&'a Ref<Expr>),
}

impl<'a> Step<'a> {
    // A literal string index acts like an attribute access.
    fn as_name(&self) -> Option<&'a str> {
        match *self {
            Step::Attr(name) => Some(name),
            Step::Index(index) => match index.as_ref() {
                Expr::String((_, v)) => match v.data() {
                    Data::Known(Known::String(s)) => Some(s.as_ref()),
                    _ => None,
                },
                _ => None,
            },
        }
    }
}

struct Collector {
    refs: Vec<Reference>,
    seen: BTreeSet<Addr>,
    diags: Diagnostics,
}

impl Collector {
    fn add(&mut self, addr: Addr, span: &Span) {
        if self.seen.insert(addr.clone()) {
            self.refs.push(Reference {
                addr,
                span: span.clone(),
            });
        }
    }

    fn traversal(&mut self, expr: &Expr) {
        // Unwind the traversal chain down to its root.
        let mut steps = vec![];
        let mut root = expr;
        loop {
            match root {
                Expr::RefDot { refr, field, .. } => {
                    steps.push(Step::Attr(field.0.text()));
                    root = refr.as_ref();
                }
                Expr::RefBrack { refr, index, .. } => {
                    steps.push(Step::Index(index));
                    root = refr.as_ref();
                }
                _ => break,
            }
        }
        steps.reverse();

        let mut consumed = 0;
        match root {
            Expr::Var((span, _)) => {
                let names: Vec<&str> = steps.iter().map_while(Step::as_name).collect();
                match addr_from_steps(span.text(), &names) {
                    Ok((addr, n)) => {
                        consumed = n;
                        self.add(addr, expr.span());
                    }
                    Err(detail) => self.diags.push(
                        Diagnostic::error(DiagnosticKind::InvalidReference, "Invalid reference", detail)
                            .with_subject(expr.span()),
                    ),
                }
            }
            _ => self.visit(root),
        }

        for step in &steps[consumed..] {
            if let Step::Index(index) = step {
                self.visit(index);
            }
        }
    }

    fn visit(&mut self, expr: &Expr) {
        match expr {
            Expr::String(_) | Expr::Number(_) | Expr::Bool(_) | Expr::Null(_) => (),
            Expr::Var(_) | Expr::RefDot { .. } | Expr::RefBrack { .. } => self.traversal(expr),
            Expr::Array { items, .. } | Expr::Set { items, .. } => {
                for item in items {
                    self.visit(item);
                }
            }
            Expr::Object { fields, .. } => {
                for (_, key, value) in fields {
                    self.visit(key);
                    self.visit(value);
                }
            }
            // The function name is not a reference.
            Expr::Call { params, .. } => {
                for param in params {
                    self.visit(param);
                }
            }
            Expr::UnaryExpr { expr, .. } => self.visit(expr),
        }
    }
}

/// Collects the objects referenced by an expression, in order of first
/// appearance and without duplicates.
pub fn references(expr: &Expr) -> (Vec<Reference>, Diagnostics) {
    let mut collector = Collector {
        refs: vec![],
        seen: BTreeSet::new(),
        diags: Diagnostics::new(),
    };
    collector.visit(expr);
    (collector.refs, collector.diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Source;
    use crate::parser::Parser;
    use anyhow::Result;

    fn refs_of(text: &str) -> Result<(Vec<String>, Diagnostics)> {
        let source = Source::from_contents("refs.tf".to_string(), text.to_string())?;
        let expr = Parser::new(&source)?.parse_expression()?;
        let (refs, diags) = references(&expr);
        Ok((refs.iter().map(|r| r.addr.to_string()).collect(), diags))
    }

    #[test]
    fn collects_addresses() -> Result<()> {
        let (refs, diags) =
            refs_of("merge(var.a, {x = aws_instance.web.id}, data.aws_ami.base.id, var.a)")?;
        assert!(diags.is_empty());
        assert_eq!(refs, vec!["var.a", "aws_instance.web", "data.aws_ami.base"]);
        Ok(())
    }

    #[test]
    fn index_expressions_are_references() -> Result<()> {
        let (refs, _) = refs_of("local.by_name[var.name]")?;
        assert_eq!(refs, vec!["local.by_name", "var.name"]);
        let (refs, _) = refs_of("var[\"regions\"]")?;
        assert_eq!(refs, vec!["var.regions"]);
        Ok(())
    }

    #[test]
    fn invalid_references() -> Result<()> {
        let (refs, diags) = refs_of("toset(var)")?;
        assert!(refs.is_empty());
        assert_eq!(diags.kinds(), vec![DiagnosticKind::InvalidReference]);
        let (_, diags) = refs_of("count.value")?;
        assert_eq!(diags.len(), 1);
        Ok(())
    }

    #[test]
    fn parse_addr() {
        assert_eq!(Addr::parse("var.x"), Some(Addr::InputVariable(Rc::from("x"))));
        assert_eq!(Addr::parse("data.t.n").map(|a| a.to_string()), Some("data.t.n".to_string()));
        assert_eq!(Addr::parse("var"), None);
        assert_eq!(Addr::parse("var.x.y"), None);
    }
}
