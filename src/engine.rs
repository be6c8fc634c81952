// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::cancel::CancellationToken;
use crate::count::evaluate_count_expression;
use crate::diagnostics::*;
use crate::expand::*;
use crate::instances::*;
use crate::lexer::*;
use crate::operation::OperationType;
use crate::parser::*;
use crate::scope::Scope;
use crate::value::Value;
use crate::Expression;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Policy knobs of an [`Engine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Phase of the surrounding run.
    pub operation: OperationType,

    /// Overrides the unknown policy derived from `operation`.
    pub allow_unknown: Option<bool>,
}

impl EngineOptions {
    /// Whether unknown multiplicities are tolerated.
    pub fn allows_unknown(&self) -> bool {
        self.allow_unknown
            .unwrap_or_else(|| self.operation.allows_unknown_instances())
    }
}

/// Expands the multiplicity arguments of configuration blocks.
///
/// The engine holds only options and an optional cancellation token. All
/// evaluation methods take `&self`, so one engine can serve many concurrent
/// callers.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: EngineOptions,
    cancel: Option<CancellationToken>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
    }

    pub fn set_operation(&mut self, operation: OperationType) {
        self.options.operation = operation;
    }

    pub fn set_allow_unknown(&mut self, allow_unknown: Option<bool>) {
        self.options.allow_unknown = allow_unknown;
    }

    pub fn set_cancellation_token(&mut self, token: Option<CancellationToken>) {
        self.cancel = token;
    }

    /// Parses the text of a multiplicity argument.
    pub fn parse_expression(&self, path: String, text: String) -> Result<Expression> {
        let source = Source::from_contents(path, text)?;
        let mut parser = Parser::new(&source)?;
        parser.parse_expression()
    }

    pub fn parse_expression_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Expression> {
        let source = Source::from_file(path)?;
        let mut parser = Parser::new(&source)?;
        parser.parse_expression()
    }

    /// Resolves a for_each argument to its instance keys, an unknown marker,
    /// or null with diagnostics.
    pub fn expand_for_each(&self, expr: Option<&Expression>, scope: &dyn Scope) -> (ForEachValue, Diagnostics) {
        evaluate_for_each_expression_value(
            expr.map(|e| &**e),
            scope,
            self.options.allows_unknown(),
            self.cancel.as_ref(),
        )
    }

    /// Instance values by key for callers that treat unknown arguments as
    /// errors regardless of the operation.
    pub fn for_each_map(&self, expr: Option<&Expression>, scope: &dyn Scope) -> (BTreeMap<String, Value>, Diagnostics) {
        evaluate_for_each_expression(expr.map(|e| &**e), scope, self.cancel.as_ref())
    }

    pub fn expand_count(&self, expr: Option<&Expression>, scope: &dyn Scope) -> (Option<Expansion>, Diagnostics) {
        evaluate_count_expression(
            expr.map(|e| &**e),
            scope,
            self.options.allows_unknown(),
            self.cancel.as_ref(),
        )
    }

    /// Expansion of a block that may declare count or for_each, but not both.
    pub fn expand(
        &self,
        for_each: Option<&Expression>,
        count: Option<&Expression>,
        scope: &dyn Scope,
    ) -> (Expansion, Diagnostics) {
        match (for_each, count) {
            (Some(_), Some(count)) => {
                let d = Diagnostic::error(
                    DiagnosticKind::ConflictingArguments,
                    "Invalid combination of \"count\" and \"for_each\"",
                    "The \"count\" and \"for_each\" meta-arguments are mutually-exclusive, only one should be used to be explicit about the number of resources to be created.",
                )
                .with_subject(count.span());
                (Expansion::Count(0), d.into())
            }
            (Some(_), None) => match self.expand_for_each(for_each, scope) {
                (ForEachValue::Known(keys), diags) => (Expansion::ForEach(keys), diags),
                (ForEachValue::Unknown(_), diags) => (Expansion::Unknown, diags),
                (ForEachValue::Null, diags) => (Expansion::ForEach(BTreeMap::new()), diags),
            },
            (None, Some(_)) => match self.expand_count(count, scope) {
                (Some(e), diags) => (e, diags),
                (None, diags) => (Expansion::Single, diags),
            },
            (None, None) => (Expansion::Single, Diagnostics::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::StaticScope;

    #[test]
    fn options_from_json() -> Result<()> {
        let options: EngineOptions = serde_json::from_str(r#"{"operation": "plan"}"#)?;
        assert_eq!(options.operation, OperationType::Plan);
        assert!(!options.allows_unknown());

        let options: EngineOptions = serde_json::from_str(r#"{"allowUnknown": true, "operation": "apply"}"#)?;
        assert!(options.allows_unknown());
        assert!(EngineOptions::default().allows_unknown());
        Ok(())
    }

    #[test]
    fn count_and_for_each_conflict() -> Result<()> {
        let engine = Engine::new();
        let for_each = engine.parse_expression("main.tf".to_string(), "{}".to_string())?;
        let count = engine.parse_expression("main.tf".to_string(), "1".to_string())?;
        let (e, diags) = engine.expand(Some(&for_each), Some(&count), &StaticScope::new());
        assert_eq!(e, Expansion::Count(0));
        assert_eq!(diags.kinds(), vec![DiagnosticKind::ConflictingArguments]);

        let (e, diags) = engine.expand(None, None, &StaticScope::new());
        assert_eq!(e, Expansion::Single);
        assert!(diags.is_empty());
        Ok(())
    }
}
