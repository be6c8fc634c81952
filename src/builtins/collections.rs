// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins;
use crate::builtins::utils::{ensure_args_count, ensure_not_null, unmark_args};
use crate::lexer::Span;
use crate::typing::Type;
use crate::value::{Data, Known, Value};
use crate::*;

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};

pub fn register(m: &mut HashMap<&'static str, builtins::BuiltinFcn>) {
    m.insert("keys", keys);
    m.insert("length", length);
    m.insert("merge", merge);
    m.insert("tolist", tolist);
    m.insert("tomap", tomap);
    m.insert("toset", toset);
    m.insert("values", values);
}

fn element_hint(ty: &Type) -> Type {
    ty.element_type().cloned().unwrap_or(Type::Dynamic)
}

// Converts a list or set to a set. Elements are taken as they are; a list
// mixing strings and numbers yields a set of mixed elements.
fn toset(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "toset";
    ensure_args_count(name, args, 1)?;
    let (v, marked) = args[0].clone().unmark();
    let result = match v.data() {
        Data::Unknown(ty) => Value::unknown(Type::set(element_hint(ty))),
        Data::Null(ty) => Value::null_of(Type::set(element_hint(ty))),
        Data::Known(Known::List(items)) => Value::set(items.iter().cloned()),
        Data::Known(Known::Set(_)) => v.clone(),
        _ => bail!("`{name}` cannot convert {} to a set", v.ty()),
    };
    Ok(result.mark_if(marked))
}

fn tolist(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "tolist";
    ensure_args_count(name, args, 1)?;
    let (v, marked) = args[0].clone().unmark();
    let result = match v.data() {
        Data::Unknown(ty) => Value::unknown(Type::list(element_hint(ty))),
        Data::Null(ty) => Value::null_of(Type::list(element_hint(ty))),
        Data::Known(Known::List(_)) => v.clone(),
        Data::Known(Known::Set(items)) => Value::list(items.iter().cloned().collect()),
        _ => bail!("`{name}` cannot convert {} to a list", v.ty()),
    };
    Ok(result.mark_if(marked))
}

fn tomap(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "tomap";
    ensure_args_count(name, args, 1)?;
    let (v, marked) = args[0].clone().unmark();
    let result = match v.data() {
        Data::Unknown(ty) => Value::unknown(Type::map(element_hint(ty))),
        Data::Null(ty) => Value::null_of(Type::map(element_hint(ty))),
        Data::Known(Known::Map(_)) => v.clone(),
        Data::Known(Known::Object(fields)) => {
            let mut ty = Type::Dynamic;
            for (k, f) in fields.iter() {
                ty = match ty.unify(&f.ty()) {
                    Some(t) => t,
                    None => bail!(
                        "`{name}` cannot convert {} to a map: attribute \"{k}\" has type {} but an earlier attribute has type {ty}",
                        v.ty(),
                        f.ty()
                    ),
                };
            }
            Value::map((**fields).clone())
        }
        _ => bail!("`{name}` cannot convert {} to a map", v.ty()),
    };
    Ok(result.mark_if(marked))
}

fn keys(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "keys";
    ensure_args_count(name, args, 1)?;
    ensure_not_null(name, &args[0])?;
    let (v, marked) = args[0].clone().unmark();
    let result = match v.data() {
        Data::Unknown(_) => Value::unknown(Type::list(Type::String)),
        Data::Known(Known::Map(fields)) | Data::Known(Known::Object(fields)) => {
            Value::list(fields.keys().map(|k| Value::from(k.clone())).collect())
        }
        _ => bail!("`{name}` expects a map or object, got {}", v.ty()),
    };
    Ok(result.mark_if(marked))
}

fn values(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "values";
    ensure_args_count(name, args, 1)?;
    ensure_not_null(name, &args[0])?;
    let (v, marked) = args[0].clone().unmark();
    let result = match v.data() {
        Data::Unknown(ty) => Value::unknown(Type::list(element_hint(ty))),
        Data::Known(Known::Map(fields)) | Data::Known(Known::Object(fields)) => {
            Value::list(fields.values().cloned().collect())
        }
        _ => bail!("`{name}` expects a map or object, got {}", v.ty()),
    };
    Ok(result.mark_if(marked))
}

fn length(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "length";
    ensure_args_count(name, args, 1)?;
    ensure_not_null(name, &args[0])?;
    let (v, marked) = args[0].clone().unmark();
    let result = match v.data() {
        Data::Unknown(_) => Value::unknown(Type::Number),
        _ => match v.length() {
            Ok(n) => Value::from(n),
            Err(_) => bail!("`{name}` expects a collection or string, got {}", v.ty()),
        },
    };
    Ok(result.mark_if(marked))
}

// Later arguments win on conflicting keys. Null arguments are ignored.
// The result is a map only when every argument is a map.
fn merge(_span: &Span, _params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "merge";
    let (args, marked) = unmark_args(args);

    let mut fields: BTreeMap<Rc<str>, Value> = BTreeMap::new();
    let mut all_maps = true;
    let mut unknown = false;
    for (idx, arg) in args.iter().enumerate() {
        match arg.data() {
            Data::Null(_) => (),
            Data::Unknown(_) => unknown = true,
            Data::Known(Known::Map(m)) => fields.extend(m.iter().map(|(k, v)| (k.clone(), v.clone()))),
            Data::Known(Known::Object(m)) => {
                all_maps = false;
                fields.extend(m.iter().map(|(k, v)| (k.clone(), v.clone())))
            }
            _ => bail!("`{name}` argument {} must be a map or object, got {}", idx + 1, arg.ty()),
        }
    }

    let result = match (unknown, all_maps && !args.is_empty()) {
        (true, _) => Value::unknown(Type::Dynamic),
        (false, true) => Value::map(fields),
        (false, false) => Value::object(fields),
    };
    Ok(result.mark_if(marked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Source;

    fn span() -> Span {
        let source = Source::from_contents("test.tf".to_string(), "f()".to_string()).unwrap();
        Span {
            source,
            line: 1,
            col: 1,
            start: 0,
            end: 3,
        }
    }

    fn call(f: builtins::BuiltinFcn, args: &[Value]) -> Result<Value> {
        f(&span(), &[], args)
    }

    #[test]
    fn toset_lifts_element_marks() {
        let list = Value::list(vec![Value::from("a"), Value::from("b").mark()]);
        let set = call(toset, &[list]).unwrap();
        assert!(set.is_marked());
        assert_eq!(set.mark_safe_length().unwrap(), 2);
    }

    #[test]
    fn toset_keeps_unknown() {
        let v = call(toset, &[Value::unknown(Type::list(Type::String))]).unwrap();
        assert_eq!(v, Value::unknown(Type::set(Type::String)));
        let v = call(toset, &[Value::from(1)]);
        assert!(v.is_err());
    }

    #[test]
    fn tomap_rejects_mixed_types() {
        let mut fields = BTreeMap::new();
        fields.insert(Rc::from("a"), Value::from("x"));
        fields.insert(Rc::from("b"), Value::from(1));
        assert!(call(tomap, &[Value::object(fields)]).is_err());
    }

    #[test]
    fn merge_maps_and_objects() {
        let mut a = BTreeMap::new();
        a.insert(Rc::from("a"), Value::from("1"));
        let mut b = BTreeMap::new();
        b.insert(Rc::from("a"), Value::from("2"));
        let merged = call(merge, &[Value::map(a.clone()), Value::map(b.clone())]).unwrap();
        assert!(merged.is_map());
        assert_eq!(merged.get("a"), Some(&Value::from("2")));

        let merged = call(merge, &[Value::map(a), Value::object(b).mark()]).unwrap();
        assert!(merged.is_object());
        assert!(merged.is_marked());
    }

    #[test]
    fn length_of_marked_list_is_marked() {
        let v = Value::list(vec![Value::from(1), Value::from(2)]).mark();
        let n = call(length, &[v]).unwrap();
        assert_eq!(n, Value::from(2).mark());
    }
}
