//! Hashable form of a primary key value.
//!
//! `sea_query::Value` is neither `Eq` nor `Hash`, and rows may report the
//! same key as `Int` in one query and `BigInt` in another. Keys are
//! normalized here before they index the identity map or match fetched rows
//! back to records.

use crate::schema::is_null;
use sea_query::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KeyValue {
    Int(i64),
    Unsigned(u64),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    /// Key types without a dedicated form compare by their debug rendering
    Other(String),
}

impl KeyValue {
    /// Normalize a key; `None` for SQL NULL
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        if is_null(value) {
            return None;
        }
        let key = match value {
            Value::TinyInt(Some(i)) => KeyValue::Int(*i as i64),
            Value::SmallInt(Some(i)) => KeyValue::Int(*i as i64),
            Value::Int(Some(i)) => KeyValue::Int(*i as i64),
            Value::BigInt(Some(i)) => KeyValue::Int(*i),
            Value::TinyUnsigned(Some(u)) => KeyValue::Int(*u as i64),
            Value::SmallUnsigned(Some(u)) => KeyValue::Int(*u as i64),
            Value::Unsigned(Some(u)) => KeyValue::Int(*u as i64),
            Value::BigUnsigned(Some(u)) => match i64::try_from(*u) {
                Ok(i) => KeyValue::Int(i),
                Err(_) => KeyValue::Unsigned(*u),
            },
            Value::String(Some(s)) => KeyValue::Text(s.to_string()),
            Value::Bytes(Some(b)) => KeyValue::Bytes(b.to_vec()),
            Value::Bool(Some(b)) => KeyValue::Bool(*b),
            other => KeyValue::Other(format!("{other:?}")),
        };
        Some(key)
    }
}
