//! Value transforms: decode a raw column value before an accessor returns it.
//!
//! A transform runs after the raw value has been merged into the record, so
//! a lazily fetched value is decoded exactly like an eagerly fetched one.
//! Decoded values are cached on the record until the raw value changes.

use crate::error::LazyError;
use sea_query::Value;

/// Hook that turns a stored raw value into the value accessors return
pub trait ValueTransform {
    /// Decode `raw`, which was read from `column`
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Transform` when the raw value cannot be decoded.
    fn decode(&self, column: &str, raw: &Value) -> Result<Value, LazyError>;
}

impl<F> ValueTransform for F
where
    F: Fn(&str, &Value) -> Result<Value, LazyError>,
{
    fn decode(&self, column: &str, raw: &Value) -> Result<Value, LazyError> {
        self(column, raw)
    }
}

/// Columns storing JSON documents as text.
///
/// Scalars decode to the matching SQL value (`3` becomes a `BigInt`,
/// `"a"` a `String`); arrays and objects decode to a JSON value.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonColumn;

impl ValueTransform for JsonColumn {
    fn decode(&self, column: &str, raw: &Value) -> Result<Value, LazyError> {
        let text = match raw {
            Value::String(Some(s)) => s.to_string(),
            Value::Bytes(Some(b)) => String::from_utf8(b.to_vec())
                .map_err(|e| LazyError::transform(column, e.to_string()))?,
            Value::String(None) | Value::Bytes(None) => return Ok(raw.clone()),
            other => {
                return Err(LazyError::transform(
                    column,
                    format!("expected serialized text, found {other:?}"),
                ))
            }
        };
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| LazyError::transform(column, e.to_string()))?;
        Ok(json_to_value(parsed))
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::String(None),
        serde_json::Value::Bool(b) => Value::from(b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::from(i),
            (None, Some(f)) => Value::from(f),
            (None, None) => Value::from(n.to_string()),
        },
        serde_json::Value::String(s) => Value::from(s),
        other => Value::from(other),
    }
}
