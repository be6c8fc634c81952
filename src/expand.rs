// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::addrs::references;
use crate::ast::Expr;
use crate::cancel::CancellationToken;
use crate::diagnostics::*;
use crate::instances::ForEachValue;
use crate::interpreter::{EvalError, Evaluator};
use crate::lexer::Span;
use crate::scope::Scope;
use crate::typing::Type;
use crate::value::{Data, Known, Value};

use std::collections::BTreeMap;

use log::debug;

const SUMMARY: &str = "Invalid for_each argument";
const SUMMARY_SET: &str = "Invalid for_each set argument";

const DETAIL_NULL: &str = "The given \"for_each\" argument value is unsuitable: the given \"for_each\" argument value is null. A map, or set of strings is allowed.";

const DETAIL_SENSITIVE: &str = "Sensitive values, or values derived from sensitive values, cannot be used as for_each arguments. If used, the sensitive value could be exposed as a resource instance key.";

const DETAIL_UNKNOWN_MAP: &str = "The \"for_each\" map includes keys derived from resource attributes that cannot be determined until apply, and so the full set of keys that will identify the instances of this resource cannot be determined.\n\nWhen working with unknown values in for_each, it's better to define the map keys statically in your configuration and place apply-time results only in the map values.\n\nAlternatively, you could use the -target planning option to first apply only the resources that the for_each value depends on, and then apply a second time to fully converge.";

const DETAIL_UNKNOWN_SET: &str = "The \"for_each\" set includes values derived from resource attributes that cannot be determined until apply, and so the full set of keys that will identify the instances of this resource cannot be determined.\n\nWhen working with unknown values in for_each, it's better to use a map value where the keys are defined statically in your configuration and where only the values contain apply-time results.\n\nAlternatively, you could use the -target planning option to first apply only the resources that the for_each value depends on, and then apply a second time to fully converge.";

const DETAIL_SET_NULL: &str =
    "The given \"for_each\" argument value is unsuitable: \"for_each\" sets must not contain null values.";

fn diagnostic(kind: DiagnosticKind, summary: &str, detail: impl Into<String>, subject: Option<&Span>) -> Diagnostic {
    let d = Diagnostic::error(kind, summary, detail);
    match subject {
        Some(span) => d.with_subject(span),
        None => d,
    }
}

fn cancelled(span: &Span) -> Diagnostics {
    Diagnostics::from(Diagnostic::from(EvalError::Cancelled { span: span.clone() }))
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(CancellationToken::is_cancelled)
}

/// Evaluates `expr` against a context holding only the objects it refers to.
///
/// Returns `None` when the references, the scope or the evaluation reported
/// errors, or when cancellation was observed. The diagnostics say which.
pub(crate) fn evaluate_in_scope(
    expr: &Expr,
    scope: &dyn Scope,
    cancel: Option<&CancellationToken>,
) -> (Option<Value>, Diagnostics) {
    if is_cancelled(cancel) {
        return (None, cancelled(expr.span()));
    }

    let (refs, mut diags) = references(expr);
    let (ctx, more) = scope.eval_context(&refs);
    diags.append(more);
    if diags.has_errors() {
        return (None, diags);
    }

    match Evaluator::new(&ctx).with_cancellation(cancel).eval(expr) {
        Ok(_) if is_cancelled(cancel) => (None, cancelled(expr.span())),
        Ok(v) => (Some(v), diags),
        Err(e) => {
            diags.push(Diagnostic::from(e));
            (None, diags)
        }
    }
}

fn unknown(shape: UnknownShape, allow_unknown: bool, subject: Option<&Span>) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if !allow_unknown {
        let detail = match shape {
            UnknownShape::Set => DETAIL_UNKNOWN_SET,
            UnknownShape::Map => DETAIL_UNKNOWN_MAP,
        };
        diags.push(
            diagnostic(DiagnosticKind::Unknown(shape), SUMMARY, detail, subject)
                .with_extra(Extra::caused_by_unknown()),
        );
    }
    diags
}

// For a set that is not of strings, the type named in the diagnostic. Null
// elements do not count; they are reported separately.
fn offending_element_type(set: &Value) -> Option<Type> {
    let element_type = set.ty().element_type().cloned().unwrap_or(Type::Dynamic);
    match element_type {
        Type::String => None,
        Type::Dynamic => set.as_set().ok().and_then(|items| {
            items
                .iter()
                .filter(|item| !item.is_null())
                .map(Value::ty)
                .find(|ty| !matches!(ty, Type::String | Type::Dynamic))
        }),
        ty => Some(ty),
    }
}

/// Decides the instance keys of a for_each argument that has already been
/// evaluated.
///
/// Checks run in a fixed order and the first failing check decides the
/// result: null, sensitive, unknown, shape, then for sets emptiness,
/// unknown elements, element type and null elements. Every failure other
/// than a tolerated unknown reports exactly one error diagnostic located at
/// `subject`.
pub fn resolve_for_each(value: &Value, allow_unknown: bool, subject: Option<&Span>) -> (ForEachValue, Diagnostics) {
    let ty = value.ty();

    if value.is_null() {
        let d = diagnostic(DiagnosticKind::Null, SUMMARY, DETAIL_NULL, subject);
        return (ForEachValue::Null, d.into());
    }

    if value.is_marked() {
        let d = diagnostic(DiagnosticKind::Sensitive, SUMMARY, DETAIL_SENSITIVE, subject)
            .with_extra(Extra::caused_by_sensitive());
        return (ForEachValue::Null, d.into());
    }

    if !value.is_known() {
        let shape = match ty.is_set_type() {
            true => UnknownShape::Set,
            false => UnknownShape::Map,
        };
        return (
            ForEachValue::Unknown(Type::map(Type::Dynamic)),
            unknown(shape, allow_unknown, subject),
        );
    }

    match value.data() {
        Data::Known(Known::Set(items)) => {
            if items.is_empty() {
                return (ForEachValue::Known(BTreeMap::new()), Diagnostics::new());
            }

            // A set is only as known as its least known element.
            if !value.is_wholly_known() {
                return (
                    ForEachValue::Unknown(ty.clone()),
                    unknown(UnknownShape::Set, allow_unknown, subject),
                );
            }

            if let Some(element_type) = offending_element_type(value) {
                let detail = format!(
                    "The given \"for_each\" argument value is unsuitable: \"for_each\" supports maps and sets of strings, but you have provided a set containing type {}.",
                    element_type.friendly_name()
                );
                let d = diagnostic(DiagnosticKind::SetElementType, SUMMARY_SET, detail, subject);
                return (ForEachValue::Null, d.into());
            }

            let mut keys = BTreeMap::new();
            for item in items.iter() {
                match item.as_string() {
                    Ok(s) => {
                        keys.insert(s.to_string(), item.clone());
                    }
                    Err(_) => {
                        let d = diagnostic(DiagnosticKind::SetNullElement, SUMMARY_SET, DETAIL_SET_NULL, subject);
                        return (ForEachValue::Null, d.into());
                    }
                }
            }
            (ForEachValue::Known(keys), Diagnostics::new())
        }
        Data::Known(Known::Map(fields)) | Data::Known(Known::Object(fields)) => {
            let keys = fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            (ForEachValue::Known(keys), Diagnostics::new())
        }
        _ => {
            let detail = format!(
                "The given \"for_each\" argument value is unsuitable: the \"for_each\" argument must be a map, or set of strings, and you have provided a value of type {}.",
                ty.friendly_name()
            );
            let d = diagnostic(DiagnosticKind::WrongType, SUMMARY, detail, subject);
            (ForEachValue::Null, d.into())
        }
    }
}

/// Evaluates a for_each argument and decides its instance keys.
///
/// An absent argument yields [`ForEachValue::Null`] without diagnostics.
/// Expression and reference errors yield [`ForEachValue::Null`] with the
/// errors that caused it.
pub fn evaluate_for_each_expression_value(
    expr: Option<&Expr>,
    scope: &dyn Scope,
    allow_unknown: bool,
    cancel: Option<&CancellationToken>,
) -> (ForEachValue, Diagnostics) {
    let Some(expr) = expr else {
        return (ForEachValue::Null, Diagnostics::new());
    };

    debug!("expanding for_each {:?}", expr.span());
    let (value, mut diags) = evaluate_in_scope(expr, scope, cancel);
    let Some(value) = value else {
        return (ForEachValue::Null, diags);
    };

    if is_cancelled(cancel) {
        return (ForEachValue::Null, cancelled(expr.span()));
    }

    let (result, more) = resolve_for_each(&value, allow_unknown, Some(expr.span()));
    diags.append(more);
    match &result {
        ForEachValue::Known(keys) => debug!("for_each {:?}: {} keys", expr.span(), keys.len()),
        ForEachValue::Unknown(_) => debug!("for_each {:?}: unknown", expr.span()),
        ForEachValue::Null => debug!("for_each {:?}: no value, {} diagnostics", expr.span(), diags.len()),
    }
    (result, diags)
}

/// Like [`evaluate_for_each_expression_value`] with unknown values treated as
/// errors, returning plain instance values by key. Null, unknown and empty
/// arguments yield an empty map; the diagnostics explain the first two.
pub fn evaluate_for_each_expression(
    expr: Option<&Expr>,
    scope: &dyn Scope,
    cancel: Option<&CancellationToken>,
) -> (BTreeMap<String, Value>, Diagnostics) {
    let (result, diags) = evaluate_for_each_expression_value(expr, scope, false, cancel);
    (result.into_map(), diags)
}
