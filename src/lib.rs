// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod addrs;
mod ast;
mod builtins;
mod cancel;
mod count;
mod diagnostics;
mod engine;
mod expand;
mod instances;
mod interpreter;
mod lexer;
mod number;
mod operation;
mod parser;
mod scope;
mod typing;
mod value;

#[cfg(feature = "arc")]
pub(crate) use std::sync::Arc as Rc;

#[cfg(not(feature = "arc"))]
pub(crate) use std::rc::Rc;

pub use addrs::{references, Addr, Reference};
pub use cancel::CancellationToken;
pub use count::evaluate_count_expression;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Extra, Severity, UnknownShape};
pub use engine::{Engine, EngineOptions};
pub use expand::{evaluate_for_each_expression, evaluate_for_each_expression_value, resolve_for_each};
pub use instances::{Expansion, ForEachValue, InstanceKey};
pub use interpreter::{evaluate, EvalError, Evaluator};
pub use lexer::{Source, Span};
pub use number::Number;
pub use operation::OperationType;
pub use scope::{EvalContext, Scope, StaticScope};
pub use typing::Type;
pub use value::Value;

/// Parsed expression shared between the front end and evaluators.
pub type Expression = ast::Ref<ast::Expr>;

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::lexer::*;
    pub use crate::parser::*;
}
