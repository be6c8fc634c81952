// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::Expr;
use crate::cancel::CancellationToken;
use crate::diagnostics::*;
use crate::expand::evaluate_in_scope;
use crate::instances::Expansion;
use crate::scope::Scope;
use crate::value::{Data, Known};

use log::debug;

const SUMMARY: &str = "Invalid count argument";

/// Evaluates a count argument.
///
/// Returns `None` when the argument is absent; the object then has a single
/// instance. On errors the result is `Some(Expansion::Count(0))` so that the
/// caller creates no instances, alongside the diagnostics that explain why.
/// An unknown count yields `Some(Expansion::Unknown)`, with an error only when
/// `allow_unknown` is false.
pub fn evaluate_count_expression(
    expr: Option<&Expr>,
    scope: &dyn Scope,
    allow_unknown: bool,
    cancel: Option<&CancellationToken>,
) -> (Option<Expansion>, Diagnostics) {
    let Some(expr) = expr else {
        return (None, Diagnostics::new());
    };

    let (value, mut diags) = evaluate_in_scope(expr, scope, cancel);
    let Some(value) = value else {
        return (Some(Expansion::Count(0)), diags);
    };

    let error = |kind: DiagnosticKind, detail: String| {
        Diagnostic::error(kind, SUMMARY, detail).with_subject(expr.span())
    };

    if value.is_null() {
        diags.push(error(
            DiagnosticKind::CountNull,
            "The given \"count\" argument value is null. An integer is required.".to_string(),
        ));
        return (Some(Expansion::Count(0)), diags);
    }

    if value.is_marked() {
        diags.push(
            error(
                DiagnosticKind::Sensitive,
                "Sensitive values, or values derived from sensitive values, cannot be used as count arguments. If used, the sensitive value could be exposed as a resource instance key.".to_string(),
            )
            .with_extra(Extra::caused_by_sensitive()),
        );
        return (Some(Expansion::Count(0)), diags);
    }

    let n = match value.data() {
        Data::Unknown(_) => {
            if !allow_unknown {
                diags.push(
                    error(
                        DiagnosticKind::CountUnknown,
                        "The \"count\" value depends on resource attributes that cannot be determined until apply, so the number of instances cannot be predicted. To work around this, use the -target argument to first apply only the resources that the count depends on.".to_string(),
                    )
                    .with_extra(Extra::caused_by_unknown()),
                );
            }
            return (Some(Expansion::Unknown), diags);
        }
        Data::Known(Known::Number(n)) => *n,
        _ => {
            diags.push(error(
                DiagnosticKind::CountType,
                format!(
                    "The given \"count\" argument value is unsuitable: number required, got {}.",
                    value.ty()
                ),
            ));
            return (Some(Expansion::Count(0)), diags);
        }
    };

    let Some(n) = n.as_i64() else {
        diags.push(error(
            DiagnosticKind::CountType,
            format!("The given \"count\" argument value is unsuitable: {n} is not a whole number."),
        ));
        return (Some(Expansion::Count(0)), diags);
    };

    match u64::try_from(n) {
        Ok(n) => {
            debug!("count {:?}: {n} instances", expr.span());
            (Some(Expansion::Count(n)), diags)
        }
        Err(_) => {
            diags.push(error(
                DiagnosticKind::CountNegative,
                "The given \"count\" argument value is unsuitable: must be greater than or equal to zero."
                    .to_string(),
            ));
            (Some(Expansion::Count(0)), diags)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Source;
    use crate::parser::Parser;
    use crate::scope::StaticScope;
    use crate::typing::Type;
    use crate::value::Value;
    use anyhow::Result;

    fn count(text: &str, scope: &StaticScope, allow_unknown: bool) -> Result<(Option<Expansion>, Diagnostics)> {
        let source = Source::from_contents("count.tf".to_string(), text.to_string())?;
        let expr = Parser::new(&source)?.parse_expression()?;
        Ok(evaluate_count_expression(Some(&*expr), scope, allow_unknown, None))
    }

    #[test]
    fn whole_numbers() -> Result<()> {
        let scope = StaticScope::new().with("var.n", Value::from(3))?;
        let (e, diags) = count("var.n", &scope, false)?;
        assert!(diags.is_empty());
        assert_eq!(e, Some(Expansion::Count(3)));
        let (e, _) = count("2.0", &scope, false)?;
        assert_eq!(e, Some(Expansion::Count(2)));
        Ok(())
    }

    #[test]
    fn invalid_counts() -> Result<()> {
        let scope = StaticScope::new()
            .with("var.secret", Value::from(2).mark())?
            .with("var.later", Value::unknown(Type::Number))?;
        let cases = [
            ("null", DiagnosticKind::CountNull),
            ("\"3\"", DiagnosticKind::CountType),
            ("1.5", DiagnosticKind::CountType),
            ("-1", DiagnosticKind::CountNegative),
            ("var.secret", DiagnosticKind::Sensitive),
            ("var.later", DiagnosticKind::CountUnknown),
        ];
        for (text, kind) in cases {
            let (_, diags) = count(text, &scope, false)?;
            assert_eq!(diags.kinds(), vec![kind], "{text}");
        }

        let (e, diags) = count("var.later", &scope, true)?;
        assert_eq!(e, Some(Expansion::Unknown));
        assert!(diags.is_empty());
        Ok(())
    }

    #[test]
    fn absent_count() {
        let (e, diags) = evaluate_count_expression(None, &StaticScope::new(), false, None);
        assert_eq!(e, None);
        assert!(diags.is_empty());
    }
}
