// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::builtins;
use crate::cancel::CancellationToken;
use crate::diagnostics::*;
use crate::lexer::Span;
use crate::scope::EvalContext;
use crate::typing::Type;
use crate::value::{Data, Known, Value};

use std::collections::BTreeMap;

use log::trace;
use thiserror::Error;

/// Failure to evaluate an expression. Every variant carries the span of the
/// sub-expression that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("There is no variable named \"{name}\".")]
    UnknownVariable { span: Span, name: String },

    #[error("{message}")]
    UnsupportedAttribute { span: Span, message: String },

    #[error("{message}")]
    InvalidIndex { span: Span, message: String },

    #[error("There is no function named \"{name}\".")]
    UnknownFunction { span: Span, name: String },

    #[error("Call to function \"{fcn}\" failed: {message}.")]
    CallFailed {
        span: Span,
        fcn: String,
        message: String,
    },

    #[error("{message}")]
    InvalidOperand { span: Span, message: String },

    #[error("The operation was cancelled before the expression was fully evaluated.")]
    Cancelled { span: Span },
}

impl EvalError {
    pub fn span(&self) -> &Span {
        match self {
            EvalError::UnknownVariable { span, .. }
            | EvalError::UnsupportedAttribute { span, .. }
            | EvalError::InvalidIndex { span, .. }
            | EvalError::UnknownFunction { span, .. }
            | EvalError::CallFailed { span, .. }
            | EvalError::InvalidOperand { span, .. }
            | EvalError::Cancelled { span } => span,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            EvalError::UnknownVariable { .. } => "Unknown variable",
            EvalError::UnsupportedAttribute { .. } => "Unsupported attribute",
            EvalError::InvalidIndex { .. } => "Invalid index",
            EvalError::UnknownFunction { .. } => "Call to unknown function",
            EvalError::CallFailed { .. } => "Error in function call",
            EvalError::InvalidOperand { .. } => "Invalid operand",
            EvalError::Cancelled { .. } => "Operation cancelled",
        }
    }
}

impl From<EvalError> for Diagnostic {
    fn from(e: EvalError) -> Self {
        let kind = match e {
            EvalError::Cancelled { .. } => DiagnosticKind::Cancelled,
            _ => DiagnosticKind::Expression,
        };
        Diagnostic::error(kind, e.summary(), e.to_string()).with_subject(e.span())
    }
}

type EvalResult = core::result::Result<Value, EvalError>;

/// Evaluates expressions against an [`EvalContext`].
///
/// Unknown values propagate: an operation on an unknown operand yields an
/// unknown result. Sensitivity marks propagate from operands to results.
pub struct Evaluator<'a> {
    ctx: &'a EvalContext,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a EvalContext) -> Self {
        Self { ctx, cancel: None }
    }

    pub fn with_cancellation(mut self, cancel: Option<&'a CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn eval(&self, expr: &Expr) -> EvalResult {
        self.eval_expr(expr)
    }

    fn check_cancelled(&self, span: &Span) -> core::result::Result<(), EvalError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(EvalError::Cancelled { span: span.clone() }),
            _ => Ok(()),
        }
    }

    fn eval_expr(&self, expr: &Expr) -> EvalResult {
        self.check_cancelled(expr.span())?;
        let value = match expr {
            Expr::String((_, v)) | Expr::Number((_, v)) | Expr::Bool((_, v)) | Expr::Null((_, v)) => {
                v.clone()
            }
            Expr::Var((span, _)) => self.lookup_var(span)?,
            Expr::Array { items, .. } => self.eval_array(items)?,
            Expr::Set { items, .. } => self.eval_set(items)?,
            Expr::Object { fields, .. } => self.eval_object(fields)?,
            Expr::Call { span, fcn, params } => self.eval_call(span, fcn, params)?,
            Expr::UnaryExpr { span, expr } => self.eval_unary(span, expr)?,
            Expr::RefDot { refr, field, .. } => {
                let obj = self.eval_expr(refr)?;
                Self::eval_attr(&obj, &field.0)?
            }
            Expr::RefBrack { refr, index, .. } => {
                let obj = self.eval_expr(refr)?;
                let index_value = self.eval_expr(index)?;
                Self::eval_index(&obj, &index_value, index.span())?
            }
        };
        trace!("{:?} => {value}", expr.span());
        Ok(value)
    }

    fn lookup_var(&self, span: &Span) -> EvalResult {
        match self.ctx.variable(span.text()) {
            Some(v) => Ok(v.clone()),
            None => Err(EvalError::UnknownVariable {
                span: span.clone(),
                name: span.text().to_string(),
            }),
        }
    }

    fn eval_array(&self, items: &[Ref<Expr>]) -> EvalResult {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.eval_expr(item)?);
        }
        Ok(Value::list(values))
    }

    fn eval_set(&self, items: &[Ref<Expr>]) -> EvalResult {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.eval_expr(item)?);
        }
        Ok(Value::set(values))
    }

    fn eval_object(&self, fields: &[(Span, Ref<Expr>, Ref<Expr>)]) -> EvalResult {
        let mut map = BTreeMap::new();
        let mut marked = false;
        let mut unknown_key = false;
        for (_, key, value) in fields {
            let (k, key_marked) = self.eval_expr(key)?.unmark();
            marked |= key_marked;
            let v = self.eval_expr(value)?;
            match k.data() {
                Data::Unknown(_) => unknown_key = true,
                Data::Known(Known::String(s)) => {
                    map.insert(s.clone(), v);
                }
                _ => {
                    return Err(EvalError::InvalidIndex {
                        span: key.span().clone(),
                        message: format!(
                            "Object keys must be strings, but this key is of type {}",
                            k.ty()
                        ),
                    })
                }
            }
        }
        let obj = match unknown_key {
            true => Value::unknown(Type::Dynamic),
            false => Value::object(map),
        };
        Ok(obj.mark_if(marked))
    }

    fn eval_call(&self, span: &Span, fcn: &Ref<Expr>, params: &[Ref<Expr>]) -> EvalResult {
        let name = fcn.span().text();
        let Some(builtin) = builtins::BUILTINS.get(name) else {
            return Err(EvalError::UnknownFunction {
                span: fcn.span().clone(),
                name: name.to_string(),
            });
        };

        let mut args = Vec::with_capacity(params.len());
        for p in params {
            args.push(self.eval_expr(p)?);
        }

        builtin(span, params, &args).map_err(|e| EvalError::CallFailed {
            span: span.clone(),
            fcn: name.to_string(),
            message: e.to_string(),
        })
    }

    fn eval_unary(&self, span: &Span, expr: &Ref<Expr>) -> EvalResult {
        let (v, marked) = self.eval_expr(expr)?.unmark();
        let result = match v.data() {
            Data::Unknown(_) => Value::unknown(Type::Number),
            Data::Known(Known::Number(n)) => match n.neg() {
                Some(n) => Value::from(n),
                None => {
                    return Err(EvalError::InvalidOperand {
                        span: span.clone(),
                        message: format!("Negating {n} overflows."),
                    })
                }
            },
            _ => {
                return Err(EvalError::InvalidOperand {
                    span: span.clone(),
                    message: format!("Unsuitable value for unary operand: number required, got {}.", v.ty()),
                })
            }
        };
        Ok(result.mark_if(marked))
    }

    fn eval_attr(obj: &Value, field: &Span) -> EvalResult {
        let name = field.text();
        let marked = obj.is_marked();
        let result = match obj.data() {
            Data::Unknown(ty) => Value::unknown(attr_type_hint(ty, name)),
            Data::Null(_) => {
                return Err(EvalError::UnsupportedAttribute {
                    span: field.clone(),
                    message: "Attempt to get attribute from null value.".to_string(),
                })
            }
            Data::Known(Known::Map(fields)) | Data::Known(Known::Object(fields)) => {
                match fields.get(name) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(EvalError::UnsupportedAttribute {
                            span: field.clone(),
                            message: format!("This object does not have an attribute named \"{name}\"."),
                        })
                    }
                }
            }
            _ => {
                return Err(EvalError::UnsupportedAttribute {
                    span: field.clone(),
                    message: format!("Can't access attributes on a value of type {}.", obj.ty()),
                })
            }
        };
        Ok(result.mark_if(marked))
    }

    fn eval_index(obj: &Value, index: &Value, span: &Span) -> EvalResult {
        let marked = obj.is_marked() || index.is_marked();
        let invalid = |message: String| EvalError::InvalidIndex {
            span: span.clone(),
            message,
        };

        if !index.is_known() {
            return Ok(Value::unknown(Type::Dynamic).mark_if(marked));
        }
        let result = match obj.data() {
            Data::Unknown(ty) => Value::unknown(ty.element_type().cloned().unwrap_or(Type::Dynamic)),
            Data::Null(_) => return Err(invalid("Cannot index a null value.".to_string())),
            Data::Known(Known::List(items)) => {
                let idx = index
                    .as_number()
                    .ok()
                    .and_then(|n| n.as_i64())
                    .ok_or_else(|| invalid(format!("A list index must be a whole number, got {index}.")))?;
                match usize::try_from(idx).ok().and_then(|i| items.get(i)) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(invalid(format!(
                            "The given key does not identify an element in this collection value: index {idx} is out of range for a list of {} elements.",
                            items.len()
                        )))
                    }
                }
            }
            Data::Known(Known::Map(fields)) | Data::Known(Known::Object(fields)) => {
                let key = index
                    .as_string()
                    .map_err(|_| invalid(format!("A map key must be a string, got {index}.")))?;
                match fields.get(key.as_ref()) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(invalid(format!(
                            "The given key does not identify an element in this collection value: key \"{key}\" does not exist."
                        )))
                    }
                }
            }
            Data::Known(Known::Set(_)) => {
                return Err(invalid(
                    "Elements of a set are identified only by their value and don't have any separate index or key to select with, so it's only possible to perform operations across all elements of the set.".to_string(),
                ))
            }
            _ => {
                return Err(invalid(format!(
                    "This value does not have any indices: it is of type {}.",
                    obj.ty()
                )))
            }
        };
        Ok(result.mark_if(marked))
    }
}

fn attr_type_hint(ty: &Type, name: &str) -> Type {
    match ty {
        Type::Object { fields } => fields.get(name).cloned().unwrap_or(Type::Dynamic),
        Type::Map { element_type } => element_type.as_ref().clone(),
        _ => Type::Dynamic,
    }
}

/// Evaluates `expr` in `ctx`. On failure the value is null and the
/// diagnostics describe why.
pub fn evaluate(
    expr: &Expr,
    ctx: &EvalContext,
    cancel: Option<&CancellationToken>,
) -> (Value, Diagnostics) {
    match Evaluator::new(ctx).with_cancellation(cancel).eval(expr) {
        Ok(v) => (v, Diagnostics::new()),
        Err(e) => (Value::null(), Diagnostics::from(Diagnostic::from(e))),
    }
}
