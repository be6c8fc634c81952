// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins;
use crate::builtins::utils::ensure_args_count;
use crate::lexer::Span;
use crate::value::Value;

use std::collections::HashMap;

use anyhow::Result;

pub fn register(m: &mut HashMap<&'static str, builtins::BuiltinFcn>) {
    m.insert("issensitive", issensitive);
    m.insert("nonsensitive", nonsensitive);
    m.insert("sensitive", sensitive);
}

fn sensitive(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count("sensitive", args, 1)?;
    Ok(args[0].clone().mark())
}

// Only the top level mark is removed. Marked elements of a collection stay
// marked.
fn nonsensitive(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count("nonsensitive", args, 1)?;
    Ok(args[0].clone().unmark().0)
}

fn issensitive(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count("issensitive", args, 1)?;
    Ok(Value::from(args[0].is_marked()))
}
