// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::*;

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Shape of a value.
///
/// Collections are homogeneous except for objects and tuples, whose
/// members are typed individually.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum Type {
    /// Not yet determined. Used for nulls and unknowns without a hint and
    /// for the elements of empty collections.
    Dynamic,

    Bool,
    Number,
    String,

    List { element_type: Box<Type> },
    Set { element_type: Box<Type> },
    Map { element_type: Box<Type> },

    Object { fields: Rc<BTreeMap<String, Type>> },
    Tuple { items: Rc<Vec<Type>> },
}

impl Type {
    pub fn list(element_type: Type) -> Type {
        Type::List {
            element_type: Box::new(element_type),
        }
    }

    pub fn set(element_type: Type) -> Type {
        Type::Set {
            element_type: Box::new(element_type),
        }
    }

    pub fn map(element_type: Type) -> Type {
        Type::Map {
            element_type: Box::new(element_type),
        }
    }

    pub fn object(fields: BTreeMap<String, Type>) -> Type {
        Type::Object {
            fields: Rc::new(fields),
        }
    }

    pub fn tuple(items: Vec<Type>) -> Type {
        Type::Tuple {
            items: Rc::new(items),
        }
    }

    pub fn is_set_type(&self) -> bool {
        matches!(self, Type::Set { .. })
    }

    pub fn is_map_type(&self) -> bool {
        matches!(self, Type::Map { .. })
    }

    pub fn is_object_type(&self) -> bool {
        matches!(self, Type::Object { .. })
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Type::Dynamic)
    }

    /// Element type of a list, set or map.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List { element_type }
            | Type::Set { element_type }
            | Type::Map { element_type } => Some(element_type),
            _ => None,
        }
    }

    /// The most specific type that both `self` and `other` conform to.
    /// `Dynamic` unifies with anything. Returns `None` on conflict.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Type::Dynamic, t) | (t, Type::Dynamic) => Some(t.clone()),
            (Type::List { element_type: a }, Type::List { element_type: b }) => {
                a.unify(b).map(Type::list)
            }
            (Type::Set { element_type: a }, Type::Set { element_type: b }) => {
                a.unify(b).map(Type::set)
            }
            (Type::Map { element_type: a }, Type::Map { element_type: b }) => {
                a.unify(b).map(Type::map)
            }
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    /// Human readable name used in diagnostics.
    pub fn friendly_name(&self) -> String {
        match self {
            Type::Dynamic => "dynamic".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Number => "number".to_string(),
            Type::String => "string".to_string(),
            Type::List { element_type } => format!("list of {}", element_type.friendly_name()),
            Type::Set { element_type } => format!("set of {}", element_type.friendly_name()),
            Type::Map { element_type } => format!("map of {}", element_type.friendly_name()),
            Type::Object { .. } => "object".to_string(),
            Type::Tuple { .. } => "tuple".to_string(),
        }
    }
}

/// Parses the names produced by [`Type::friendly_name`]. Objects parse to
/// an object type without fields; tuples are not accepted.
impl FromStr for Type {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("list of ") {
            return Ok(Type::list(rest.parse()?));
        }
        if let Some(rest) = s.strip_prefix("set of ") {
            return Ok(Type::set(rest.parse()?));
        }
        if let Some(rest) = s.strip_prefix("map of ") {
            return Ok(Type::map(rest.parse()?));
        }
        Ok(match s {
            "dynamic" => Type::Dynamic,
            "bool" => Type::Bool,
            "number" => Type::Number,
            "string" => Type::String,
            "object" => Type::object(BTreeMap::new()),
            _ => bail!("unknown type `{s}`"),
        })
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.friendly_name())
    }
}
