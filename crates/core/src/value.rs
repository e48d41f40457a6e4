//! Tagged row values.
//!
//! Result sets arrive without a declared schema, so every cell is one of a
//! closed set of scalar kinds. JSON serialization is a single match over that
//! set: decimals become `f64` numbers (precision is not preserved across the
//! boundary) and anything the warehouse returned that has no JSON mapping
//! fails serialization.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// Fixed-point numeric, kept exact until encoding.
    Decimal(Decimal),
    /// A column type with no JSON mapping (timestamps, bytea, ...).
    Unsupported { type_name: String },
}

impl SqlValue {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::Unsupported {
            type_name: type_name.into(),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SqlValue::String(s) => serializer.serialize_str(s),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Float(f) => serializer.serialize_f64(*f),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Decimal(d) => match d.to_f64() {
                Some(f) => serializer.serialize_f64(f),
                None => Err(S::Error::custom(format!(
                    "decimal {d} has no double-precision representation"
                ))),
            },
            SqlValue::Unsupported { type_name } => Err(S::Error::custom(format!(
                "type {type_name} is not JSON serializable"
            ))),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// One result row: column name -> value, in the order the warehouse returned
/// the columns.
///
/// Inserting a name that already exists replaces the value but keeps the
/// column's original position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    /// Builder-style [`Row::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn row_keeps_column_order() {
        let row = Row::new()
            .with("zeta", 1_i64)
            .with("alpha", "a")
            .with("mid", true);

        let names: Vec<_> = row.column_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"zeta":1,"alpha":"a","mid":true}"#
        );
    }

    #[test]
    fn duplicate_column_keeps_first_position_and_last_value() {
        let row = Row::new().with("a", 1_i64).with("b", 2_i64).with("a", 3_i64);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&SqlValue::Integer(3)));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"a":3,"b":2}"#);
    }

    #[test]
    fn decimal_serializes_as_number() {
        let value = SqlValue::Decimal(Decimal::from_str("10.50").unwrap());
        assert_eq!(serde_json::to_string(&value).unwrap(), "10.5");
    }

    #[test]
    fn null_and_none_serialize_as_null() {
        assert_eq!(serde_json::to_string(&SqlValue::Null).unwrap(), "null");
        let missing: Option<i64> = None;
        assert_eq!(SqlValue::from(missing), SqlValue::Null);
    }

    #[test]
    fn non_finite_float_serializes_as_null() {
        assert_eq!(
            serde_json::to_string(&SqlValue::Float(f64::NAN)).unwrap(),
            "null"
        );
    }

    #[test]
    fn unsupported_value_fails_serialization() {
        let err = serde_json::to_string(&SqlValue::unsupported("timestamptz")).unwrap_err();
        assert!(err.to_string().contains("timestamptz"));
    }
}
