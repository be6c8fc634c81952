// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::typing::Type;
use crate::value::Value;

use core::fmt;
use core::iter;
use std::collections::BTreeMap;

use serde::Serialize;

/// Key identifying one instance of a repeated object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum InstanceKey {
    /// The single instance of an object that sets neither count nor for_each.
    NoKey,
    Int(u64),
    String(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::NoKey => Ok(()),
            InstanceKey::Int(i) => write!(f, "[{i}]"),
            InstanceKey::String(s) => write!(f, "[{}]", serde_json::Value::from(s.as_str())),
        }
    }
}

/// Outcome of resolving a for_each argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForEachValue {
    /// No usable value: the argument was absent, null, or invalid.
    Null,

    /// The argument is valid so far but its keys are not known yet. The
    /// type is the declared shape of the argument.
    Unknown(Type),

    /// Instance keys mapped to each instance's `each.value`.
    Known(BTreeMap<String, Value>),
}

impl ForEachValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ForEachValue::Null)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ForEachValue::Unknown(_))
    }

    /// Instance values keyed by instance key. Null and unknown arguments
    /// yield no instances.
    pub fn into_map(self) -> BTreeMap<String, Value> {
        match self {
            ForEachValue::Known(m) => m,
            _ => BTreeMap::new(),
        }
    }
}

/// How many instances an object has, and how they are keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Single,
    Count(u64),
    ForEach(BTreeMap<String, Value>),

    /// The number of instances cannot be decided yet.
    Unknown,
}

impl Expansion {
    /// Keys of all instances, in order. Unknown expansions have none.
    ///
    /// Keys are produced lazily; a count may be far larger than what fits
    /// in memory at once.
    pub fn keys(&self) -> Box<dyn Iterator<Item = InstanceKey> + '_> {
        match self {
            Expansion::Single => Box::new(iter::once(InstanceKey::NoKey)),
            Expansion::Count(n) => Box::new((0..*n).map(InstanceKey::Int)),
            Expansion::ForEach(m) => Box::new(m.keys().cloned().map(InstanceKey::String)),
            Expansion::Unknown => Box::new(iter::empty()),
        }
    }

    /// Number of instances, or `None` while unknown.
    pub fn instance_count(&self) -> Option<u64> {
        match self {
            Expansion::Single => Some(1),
            Expansion::Count(n) => Some(*n),
            Expansion::ForEach(m) => Some(m.len() as u64),
            Expansion::Unknown => None,
        }
    }

    /// The `each.value` of the instance with the given key.
    pub fn each_value(&self, key: &InstanceKey) -> Option<&Value> {
        match (self, key) {
            (Expansion::ForEach(m), InstanceKey::String(k)) => m.get(k),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Expansion::Unknown)
    }
}
