//! The tagged value tree every document is made of.
//!
//! Documents are untyped trees of [`Value`]. Nested object members are addressed with
//! dot-separated field paths (`"address.street"`); traversal stops, and the field is
//! considered absent, as soon as an intermediate segment is not an object.
//!
//! # Example
//!
//! ```ignore
//! use owldb::value::Value;
//! use serde_json::json;
//!
//! let doc: Value = json!({ "name": "lamp", "ratings": { "score": 4 } }).into();
//! assert_eq!(doc.get_path("ratings.score"), Some(&Value::Integer(4)));
//! assert_eq!(doc.get_path("ratings.score.value"), None);
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};
use thiserror::Error;

/// Object members, in insertion order.
///
/// Equality between two objects ignores member order.
pub type Object = IndexMap<String, Value>;

/// A point in time with millisecond precision, stored as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    /// The current wall-clock time, truncated to milliseconds.
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_millis())
    }

    /// Milliseconds since the Unix epoch.
    pub const fn timestamp_millis(&self) -> i64 {
        self.0
    }

    /// Converts to a chrono `DateTime<Utc>`, clamping values chrono cannot represent.
    pub fn to_chrono(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or(if self.0 < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp(value.timestamp_millis())
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// The kind of a [`Value`], as matched by the `$type` filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Timestamp,
    Array,
    Object,
}

impl Kind {
    /// The canonical name of this kind.
    pub const fn name(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Boolean => "bool",
            Kind::Integer => "int",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Timestamp => "timestamp",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }

    /// Resolves a `$type` name to the kinds it selects.
    ///
    /// Besides the canonical names a few common aliases are understood; `"number"` selects
    /// both integers and floats. Returns `None` for unknown names.
    pub fn parse_selector(name: &str) -> Option<Vec<Kind>> {
        let kinds = match name {
            "null" => vec![Kind::Null],
            "bool" | "boolean" => vec![Kind::Boolean],
            "int" | "integer" | "long" => vec![Kind::Integer],
            "float" | "double" => vec![Kind::Float],
            "number" => vec![Kind::Integer, Kind::Float],
            "string" => vec![Kind::String],
            "timestamp" | "date" | "time" => vec![Kind::Timestamp],
            "array" => vec![Kind::Array],
            "object" => vec![Kind::Object],
            _ => return None,
        };

        Some(kinds)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while writing through a field path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("field path is empty")]
    EmptyPath,
    #[error("document root is not an object")]
    RootNotObject,
    #[error("cannot traverse {0}: it is not an object")]
    NotAnObject(String),
}

/// A node of a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(Timestamp),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    /// Creates an empty object.
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a top-level member of an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Resolves a dot-separated field path.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is not an object.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;

        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }

        Some(current)
    }

    /// Mutable variant of [`Value::get_path`].
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut current = self;

        for segment in path.split('.') {
            current = current.as_object_mut()?.get_mut(segment)?;
        }

        Some(current)
    }

    /// Writes `value` at `path`, creating missing intermediate objects.
    ///
    /// Returns the previous value at that path, if any.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<Option<Value>, PathError> {
        let (parent, leaf) = self
            .parent_mut(path, true)?
            .ok_or(PathError::EmptyPath)?;

        Ok(parent.insert(leaf.to_string(), value))
    }

    /// Removes the value at `path`, keeping sibling order intact.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match self.parent_mut(path, false) {
            Ok(Some((parent, leaf))) => parent.shift_remove(leaf),
            _ => None,
        }
    }

    /// Walks to the object holding the last segment of `path`.
    ///
    /// With `create`, missing intermediate objects are inserted; without it a missing
    /// intermediate yields `Ok(None)`.
    fn parent_mut<'a, 'p>(
        &'a mut self,
        path: &'p str,
        create: bool,
    ) -> Result<Option<(&'a mut Object, &'p str)>, PathError> {
        if path.is_empty() {
            return Err(PathError::EmptyPath);
        }

        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };

        let mut current = match self {
            Value::Object(map) => map,
            _ => return Err(PathError::RootNotObject),
        };

        if let Some(parents) = parents {
            let mut walked = 0;

            for segment in parents.split('.') {
                walked += segment.len() + 1;

                if !current.contains_key(segment) {
                    if !create {
                        return Ok(None);
                    }
                    current.insert(segment.to_string(), Value::object());
                }

                current = match current.get_mut(segment) {
                    Some(Value::Object(map)) => map,
                    Some(_) => return Err(PathError::NotAnObject(path[..walked - 1].to_string())),
                    None => return Ok(None),
                };
            }
        }

        Ok(Some((current, leaf)))
    }

    /// Ordered comparison used by the range operators.
    ///
    /// Only numbers (integers and floats in any combination) and timestamps are comparable.
    /// Every other pairing yields `None`, which the range operators treat as "no match".
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Float(b)) => cmp_integer_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_integer_float(*b, *a).map(Ordering::reverse),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting results.
    ///
    /// Values of the same kind compare naturally (numbers across integer and float). Values of
    /// different kinds fall back to a fixed kind rank so a sort never sees an inconsistent
    /// comparator.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Float(b)) => sort_integer_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => sort_integer_float(*b, *a).reverse(),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.sort_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Value::Object(_), Value::Object(_)) => Ordering::Equal,
            _ => self.sort_rank().cmp(&other.sort_rank()),
        }
    }

    // Mirrors the cross-type ordering MongoDB uses for sorting.
    fn sort_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::String(_) => 2,
            Value::Object(_) => 3,
            Value::Array(_) => 4,
            Value::Boolean(_) => 5,
            Value::Timestamp(_) => 6,
        }
    }

    /// Converts to JSON for display. Timestamps become RFC 3339 strings and non-finite floats
    /// become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(value) => serde_json::Value::Bool(*value),
            Value::Integer(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::Timestamp(value) => serde_json::Value::String(value.to_string()),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value.into())
    }
}

// 2^63 as a float; every float in [-2^63, 2^63) truncates to an exact i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Compares an integer with a float without rounding the integer through `f64`.
fn cmp_integer_float(integer: i64, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        return None;
    }
    if float >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if float < -I64_BOUND {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    Some(integer.cmp(&(whole as i64)).then_with(|| {
        if float > whole {
            Ordering::Less
        } else if float < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }))
}

// NaN sorts the way `f64::total_cmp` places it: positive NaN above every number, negative below.
fn sort_integer_float(integer: i64, float: f64) -> Ordering {
    cmp_integer_float(integer, float).unwrap_or(if float.is_sign_negative() {
        Ordering::Greater
    } else {
        Ordering::Less
    })
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value.into())
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Boolean(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::Integer(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Value::String(value),
            serde_json::Value::Array(values) => {
                Value::Array(values.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "name": "lamp",
            "price": 10,
            "ratings": { "score": 4.5, "count": 12 },
            "tags": ["home", "light"],
        })
        .into()
    }

    #[test]
    fn resolves_nested_paths() {
        let doc = sample();

        assert_eq!(doc.get_path("ratings.count"), Some(&Value::Integer(12)));
        assert_eq!(doc.get_path("ratings.missing"), None);
        // traversal stops at a non-object segment
        assert_eq!(doc.get_path("price.value"), None);
        assert_eq!(doc.get_path("tags.0"), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut doc = sample();

        doc.set_path("dimensions.size.width", Value::Integer(3)).unwrap();

        assert_eq!(doc.get_path("dimensions.size.width"), Some(&Value::Integer(3)));
    }

    #[test]
    fn set_path_refuses_to_traverse_scalars() {
        let mut doc = sample();

        let err = doc.set_path("price.currency", "EUR".into()).unwrap_err();

        assert_eq!(err, PathError::NotAnObject("price".to_string()));
        assert_eq!(doc.get_path("price"), Some(&Value::Integer(10)));
    }

    #[test]
    fn remove_path_keeps_siblings() {
        let mut doc = sample();

        assert_eq!(doc.remove_path("ratings.score"), Some(Value::Float(4.5)));
        assert_eq!(doc.remove_path("ratings.score"), None);
        assert_eq!(doc.remove_path("nothing.here"), None);
        assert_eq!(doc.get_path("ratings.count"), Some(&Value::Integer(12)));
    }

    #[test]
    fn object_equality_ignores_member_order() {
        let left: Value = json!({ "a": 1, "b": 2 }).into();
        let mut right = Value::object();
        right.set_path("b", 2.into()).unwrap();
        right.set_path("a", 1.into()).unwrap();

        assert_eq!(left, right);
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn compare_is_explicit_about_incomparable_kinds() {
        assert_eq!(Value::Integer(2).compare(&Value::Float(1.5)), Some(Ordering::Greater));
        assert_eq!(
            Value::Timestamp(Timestamp::from_millis(5)).compare(&Value::Timestamp(Timestamp::from_millis(9))),
            Some(Ordering::Less)
        );
        assert_eq!(Value::from("b").compare(&Value::from("a")), None);
        assert_eq!(Value::Integer(1).compare(&Value::from("1")), None);
        assert_eq!(Value::Timestamp(Timestamp::from_millis(1)).compare(&Value::Integer(1)), None);
    }

    #[test]
    fn sort_cmp_orders_mixed_kinds_by_rank() {
        let mut values = vec![
            Value::from("b"),
            Value::Boolean(true),
            Value::Integer(3),
            Value::Null,
            Value::Float(1.5),
            Value::from("a"),
        ];

        values.sort_by(Value::sort_cmp);

        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(1.5),
                Value::Integer(3),
                Value::from("a"),
                Value::from("b"),
                Value::Boolean(true),
            ]
        );
    }

    #[test]
    fn large_integers_compare_exactly_against_floats() {
        let big = i64::MAX - 1;
        let rounded = big as f64;

        assert_eq!(Value::Integer(big).compare(&Value::Float(rounded)), Some(Ordering::Less));
        assert_eq!(Value::Float(rounded).compare(&Value::Integer(big)), Some(Ordering::Greater));
        assert_eq!(Value::Integer(1 << 53).compare(&Value::Float(9_007_199_254_740_992.0)), Some(Ordering::Equal));
        assert_eq!(
            Value::Integer((1 << 53) + 1).compare(&Value::Float(9_007_199_254_740_992.0)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Integer(-3).compare(&Value::Float(-2.5)), Some(Ordering::Less));
        assert_eq!(Value::Integer(i64::MIN).compare(&Value::Float(-1e19)), Some(Ordering::Greater));
        assert_eq!(Value::Integer(0).compare(&Value::Float(f64::NAN)), None);
    }

    #[test]
    fn sort_cmp_stays_transitive_above_float_precision() {
        let a = Value::Integer((1 << 53) + 1);
        let b = Value::Float(9_007_199_254_740_992.0);
        let c = Value::Integer(1 << 53);

        assert_eq!(c.sort_cmp(&b), Ordering::Equal);
        assert_eq!(b.sort_cmp(&a), Ordering::Less);
        assert_eq!(c.sort_cmp(&a), Ordering::Less);

        let mut values = vec![Value::Float(f64::NAN), a.clone(), Value::Float(0.5), Value::Integer(0)];
        values.sort_by(Value::sort_cmp);
        assert_eq!(values[..3], [Value::Integer(0), Value::Float(0.5), a]);
        assert!(matches!(values[3], Value::Float(nan) if nan.is_nan()));
    }

    #[test]
    fn kind_selectors_understand_aliases() {
        assert_eq!(Kind::parse_selector("boolean"), Some(vec![Kind::Boolean]));
        assert_eq!(Kind::parse_selector("number"), Some(vec![Kind::Integer, Kind::Float]));
        assert_eq!(Kind::parse_selector("time"), Some(vec![Kind::Timestamp]));
        assert_eq!(Kind::parse_selector("decimal"), None);
    }

    #[test]
    fn json_conversion_keeps_integers_integral() {
        let value: Value = json!({ "i": 3, "f": 3.5, "n": null }).into();

        assert_eq!(value.get("i"), Some(&Value::Integer(3)));
        assert_eq!(value.get("f"), Some(&Value::Float(3.5)));
        assert_eq!(value.get("n"), Some(&Value::Null));
        assert_eq!(value.to_json(), json!({ "i": 3, "f": 3.5, "n": null }));
    }
}
