// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::value::Value;

use anyhow::{bail, Result};

pub fn ensure_args_count(fcn: &'static str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        if expected == 1 {
            bail!("`{fcn}` expects 1 argument, got {}", args.len())
        } else {
            bail!("`{fcn}` expects {expected} arguments, got {}", args.len())
        }
    }
    Ok(())
}

/// Strips the top level marks of all arguments, returning whether any was
/// marked. Results computed from marked arguments must be re-marked.
pub fn unmark_args(args: &[Value]) -> (Vec<Value>, bool) {
    let mut marked = false;
    let args = args
        .iter()
        .map(|a| {
            let (v, m) = a.clone().unmark();
            marked |= m;
            v
        })
        .collect();
    (args, marked)
}

pub fn ensure_not_null(fcn: &str, v: &Value) -> Result<()> {
    if v.is_null() {
        bail!("`{fcn}` does not accept a null argument")
    }
    Ok(())
}
