// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod collections;
pub mod sensitive;
pub mod utils;

use crate::ast::{Expr, Ref};
use crate::lexer::Span;
use crate::value::Value;

use std::collections::HashMap;

use anyhow::Result;
use lazy_static::lazy_static;

/// A builtin receives the call span, the unevaluated parameter expressions
/// and the evaluated arguments.
pub type BuiltinFcn = fn(&Span, &[Ref<Expr>], &[Value]) -> Result<Value>;

#[rustfmt::skip]
lazy_static! {
    pub static ref BUILTINS: HashMap<&'static str, BuiltinFcn> = {
	let mut m : HashMap<&'static str, BuiltinFcn>  = HashMap::new();

	collections::register(&mut m);
	sensitive::register(&mut m);

	m
    };
}
