// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::number::Number;
use crate::typing::Type;
use crate::*;

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Text shown instead of the payload of a sensitive value.
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

/// Text shown for values that are not known until apply.
pub const UNKNOWN_PLACEHOLDER: &str = "(known after apply)";

// A value is a payload plus a sensitivity mark that travels with it.
// The mark is part of equality and ordering so that a marked and an
// unmarked copy of the same payload are never confused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Value {
    data: Data,
    sensitive: bool,
}

/// Three-valued payload of a value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Data {
    /// Explicit absence. The type, if any, is the type the null stands in for.
    Null(Type),

    /// Not yet computable. The type is a hint of the eventual shape.
    Unknown(Type),

    Known(Known),
}

// BTree is used for collections so that iteration order, and therefore
// instance key order, is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Known {
    Bool(bool),
    Number(Number),
    String(Rc<str>),

    List(Rc<Vec<Value>>),
    Set(Rc<BTreeSet<Value>>),

    // Maps and objects are keyed by strings only.
    Map(Rc<BTreeMap<Rc<str>, Value>>),
    Object(Rc<BTreeMap<Rc<str>, Value>>),
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.sensitive {
            return serializer.serialize_str(SENSITIVE_PLACEHOLDER);
        }

        match &self.data {
            Data::Null(_) => serializer.serialize_none(),
            Data::Unknown(_) => serializer.serialize_str(UNKNOWN_PLACEHOLDER),
            Data::Known(k) => match k {
                Known::Bool(b) => serializer.serialize_bool(*b),
                Known::Number(n) => n.serialize(serializer),
                Known::String(s) => serializer.serialize_str(s.as_ref()),
                Known::List(a) => a.serialize(serializer),

                // display set as an array
                Known::Set(s) => s.serialize(serializer),

                Known::Map(fields) | Known::Object(fields) => {
                    let mut map = serializer.serialize_map(Some(fields.len()))?;
                    for (k, v) in fields.iter() {
                        map.serialize_entry(k.as_ref(), v)?;
                    }
                    map.end()
                }
            },
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::null())
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::null())
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(Number::from(v)))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(s))
    }

    fn visit_string<E>(self, s: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(s))
    }

    fn visit_seq<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
    where
        V: SeqAccess<'de>,
    {
        let mut arr = vec![];
        while let Some(v) = visitor.next_element()? {
            arr.push(v);
        }
        Ok(Value::from(arr))
    }

    fn visit_map<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
    where
        V: MapAccess<'de>,
    {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = visitor.next_entry::<String, Value>()? {
            map.insert(Rc::from(key.as_str()), value);
        }
        Ok(Value::object(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}

impl Value {
    fn known(k: Known) -> Value {
        Value {
            data: Data::Known(k),
            sensitive: false,
        }
    }

    pub fn null() -> Value {
        Value::null_of(Type::Dynamic)
    }

    pub fn null_of(ty: Type) -> Value {
        Value {
            data: Data::Null(ty),
            sensitive: false,
        }
    }

    pub fn unknown(ty: Type) -> Value {
        Value {
            data: Data::Unknown(ty),
            sensitive: false,
        }
    }

    pub fn new_object() -> Value {
        Value::object(BTreeMap::new())
    }

    pub fn new_map() -> Value {
        Value::map(BTreeMap::new())
    }

    pub fn new_set() -> Value {
        Value::set(vec![])
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::known(Known::List(Rc::new(items)))
    }

    /// Builds a set. Set membership depends on element identity, so a mark
    /// anywhere inside an element is lifted onto the set as a whole.
    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Value {
        let mut sensitive = false;
        let items: BTreeSet<Value> = items
            .into_iter()
            .map(|v| {
                if v.contains_marks() {
                    sensitive = true;
                    v.unmark_deep()
                } else {
                    v
                }
            })
            .collect();
        Value {
            data: Data::Known(Known::Set(Rc::new(items))),
            sensitive,
        }
    }

    /// Builds a map. Marks on elements stay on the elements.
    pub fn map(entries: BTreeMap<Rc<str>, Value>) -> Value {
        Value::known(Known::Map(Rc::new(entries)))
    }

    pub fn object(fields: BTreeMap<Rc<str>, Value>) -> Value {
        Value::known(Known::Object(Rc::new(fields)))
    }

    pub fn map_from<K: AsRef<str>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Value {
        Value::map(collect_fields(entries))
    }

    pub fn object_from<K: AsRef<str>, I: IntoIterator<Item = (K, Value)>>(fields: I) -> Value {
        Value::object(collect_fields(fields))
    }

    pub fn from_json_str(json: &str) -> Result<Value> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_str(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_file(path: &String) -> Result<Value> {
        match std::fs::read_to_string(path) {
            Ok(c) => Self::from_json_str(c.as_str()),
            Err(e) => bail!("Failed to read {path}. {e}"),
        }
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Value> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_file(path: &String) -> Result<Value> {
        match std::fs::read_to_string(path) {
            Ok(c) => Self::from_yaml_str(c.as_str()),
            Err(e) => bail!("Failed to read {path}. {e}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::known(Known::Bool(b))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::known(Known::Number(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::from(Number::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::from(Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::from(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::from(Number::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::known(Known::String(s.into()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::known(Known::String(s.into()))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::known(Known::String(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::list(a)
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(s: BTreeSet<Value>) -> Self {
        Value::set(s)
    }
}

impl FromStr for Value {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Value::from_json_str(s)
    }
}

// Structural queries.
impl Value {
    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn as_known(&self) -> Option<&Known> {
        match &self.data {
            Data::Known(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, Data::Null(_))
    }

    /// False only when the value itself is unknown. Elements of a known
    /// collection may still be unknown; see [`Value::is_wholly_known`].
    pub fn is_known(&self) -> bool {
        !matches!(self.data, Data::Unknown(_))
    }

    pub fn is_wholly_known(&self) -> bool {
        match &self.data {
            Data::Null(_) => true,
            Data::Unknown(_) => false,
            Data::Known(k) => match k {
                Known::Bool(_) | Known::Number(_) | Known::String(_) => true,
                Known::List(items) => items.iter().all(Value::is_wholly_known),
                Known::Set(items) => items.iter().all(Value::is_wholly_known),
                Known::Map(fields) | Known::Object(fields) => {
                    fields.values().all(Value::is_wholly_known)
                }
            },
        }
    }

    pub fn ty(&self) -> Type {
        match &self.data {
            Data::Null(t) | Data::Unknown(t) => t.clone(),
            Data::Known(k) => match k {
                Known::Bool(_) => Type::Bool,
                Known::Number(_) => Type::Number,
                Known::String(_) => Type::String,
                Known::List(items) => Type::list(common_type(items.iter())),
                Known::Set(items) => Type::set(common_type(items.iter())),
                Known::Map(fields) => Type::map(common_type(fields.values())),
                Known::Object(fields) => Type::object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.ty()))
                        .collect(),
                ),
            },
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self.data, Data::Known(Known::Set(_)))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.data, Data::Known(Known::Map(_)))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.data, Data::Known(Known::Object(_)))
    }

    pub fn as_bool(&self) -> Result<bool> {
        match &self.data {
            Data::Known(Known::Bool(b)) => Ok(*b),
            _ => Err(anyhow!("not a bool")),
        }
    }

    pub fn as_number(&self) -> Result<&Number> {
        match &self.data {
            Data::Known(Known::Number(n)) => Ok(n),
            _ => Err(anyhow!("not a number")),
        }
    }

    pub fn as_string(&self) -> Result<&Rc<str>> {
        match &self.data {
            Data::Known(Known::String(s)) => Ok(s),
            _ => Err(anyhow!("not a string")),
        }
    }

    pub fn as_list(&self) -> Result<&Vec<Value>> {
        match &self.data {
            Data::Known(Known::List(a)) => Ok(a),
            _ => Err(anyhow!("not a list")),
        }
    }

    pub fn as_set(&self) -> Result<&BTreeSet<Value>> {
        match &self.data {
            Data::Known(Known::Set(s)) => Ok(s),
            _ => Err(anyhow!("not a set")),
        }
    }

    /// Entries of a map or an object.
    pub fn as_map(&self) -> Result<&BTreeMap<Rc<str>, Value>> {
        match &self.data {
            Data::Known(Known::Map(m)) | Data::Known(Known::Object(m)) => Ok(m),
            _ => Err(anyhow!("not a map or object")),
        }
    }

    pub fn as_map_mut(&mut self) -> Result<&mut BTreeMap<Rc<str>, Value>> {
        match &mut self.data {
            Data::Known(Known::Map(m)) | Data::Known(Known::Object(m)) => Ok(Rc::make_mut(m)),
            _ => Err(anyhow!("not a map or object")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().ok().and_then(|m| m.get(key))
    }

    /// Number of elements of a known collection.
    ///
    /// Fails on sensitive values: asking for the length is a read of the
    /// payload. Use [`Value::mark_safe_length`] for shape inspection.
    pub fn length(&self) -> Result<usize> {
        if self.sensitive {
            bail!("cannot take the length of a sensitive value");
        }
        match &self.data {
            Data::Null(_) => bail!("cannot take the length of a null value"),
            Data::Unknown(_) => bail!("cannot take the length of an unknown value"),
            Data::Known(k) => match k {
                Known::List(items) => Ok(items.len()),
                Known::Set(items) => Ok(items.len()),
                Known::Map(fields) | Known::Object(fields) => Ok(fields.len()),
                Known::String(s) => Ok(s.chars().count()),
                _ => bail!("value of type {} has no length", self.ty()),
            },
        }
    }

    /// Length of the structure with all marks stripped.
    pub fn mark_safe_length(&self) -> Result<usize> {
        self.unmark_deep().length()
    }
}

fn collect_fields<K: AsRef<str>, I: IntoIterator<Item = (K, Value)>>(
    entries: I,
) -> BTreeMap<Rc<str>, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (Rc::from(k.as_ref()), v))
        .collect()
}

fn common_type<'a, I: Iterator<Item = &'a Value>>(items: I) -> Type {
    let mut ty = Type::Dynamic;
    for item in items {
        match ty.unify(&item.ty()) {
            Some(t) => ty = t,
            None => return Type::Dynamic,
        }
    }
    ty
}

// Sensitivity marks.
impl Value {
    /// Whether the value itself carries the mark. Marks on elements of a
    /// map, object or list do not count.
    pub fn is_marked(&self) -> bool {
        self.sensitive
    }

    /// Whether the value or anything nested inside it carries the mark.
    pub fn contains_marks(&self) -> bool {
        if self.sensitive {
            return true;
        }
        match &self.data {
            Data::Known(Known::List(items)) => items.iter().any(Value::contains_marks),
            Data::Known(Known::Set(items)) => items.iter().any(Value::contains_marks),
            Data::Known(Known::Map(fields)) | Data::Known(Known::Object(fields)) => {
                fields.values().any(Value::contains_marks)
            }
            _ => false,
        }
    }

    pub fn mark(mut self) -> Value {
        self.sensitive = true;
        self
    }

    pub fn mark_if(self, sensitive: bool) -> Value {
        match sensitive {
            true => self.mark(),
            false => self,
        }
    }

    /// Strips the top level mark, returning whether it was present.
    pub fn unmark(mut self) -> (Value, bool) {
        let sensitive = self.sensitive;
        self.sensitive = false;
        (self, sensitive)
    }

    /// A copy with every mark removed at every depth. Structure is unchanged.
    pub fn unmark_deep(&self) -> Value {
        let data = match &self.data {
            Data::Known(Known::List(items)) => {
                Data::Known(Known::List(Rc::new(items.iter().map(Value::unmark_deep).collect())))
            }
            Data::Known(Known::Set(items)) => {
                Data::Known(Known::Set(Rc::new(items.iter().map(Value::unmark_deep).collect())))
            }
            Data::Known(Known::Map(fields)) => Data::Known(Known::Map(Rc::new(unmark_fields(fields)))),
            Data::Known(Known::Object(fields)) => {
                Data::Known(Known::Object(Rc::new(unmark_fields(fields))))
            }
            d => d.clone(),
        };
        Value {
            data,
            sensitive: false,
        }
    }
}

fn unmark_fields(fields: &BTreeMap<Rc<str>, Value>) -> BTreeMap<Rc<str>, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.unmark_deep()))
        .collect()
}
