//! Table schema for an entity: ordered, typed columns and the primary key.
//!
//! The schema is the "natural column order" the projection rewriter keeps
//! when it expands an unrestricted `SELECT *`, and the source of column
//! types for setter typecasting.

use crate::error::LazyError;
use sea_query::Value;

/// Column storage type, used when coercing values assigned through setters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Boolean,
    Float,
    Bytes,
    Json,
}

/// A single column in an entity's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// Schema of the table backing an entity
///
/// # Example
///
/// ```
/// use lifeguard_lazy::{ColumnType, EntitySchema};
///
/// let schema = EntitySchema::new("la")
///     .column("id", ColumnType::Integer)
///     .column("name", ColumnType::Text)
///     .primary_key("id");
/// assert_eq!(schema.column_names(), vec!["id", "name"]);
/// ```
#[derive(Debug, Clone)]
pub struct EntitySchema {
    table: String,
    columns: Vec<ColumnDef>,
    primary_key: Option<String>,
}

impl EntitySchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    /// Append a column; redeclaring an existing name replaces its type in place
    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.column_type = column_type,
            None => self.columns.push(ColumnDef { name, column_type }),
        }
        self
    }

    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = Some(name.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    pub fn primary_key_name(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Check that the declared primary key is one of the columns
    pub(crate) fn validate(&self) -> Result<(), LazyError> {
        if let Some(pk) = &self.primary_key {
            if !self.has_column(pk) {
                return Err(LazyError::configuration(format!(
                    "primary key {pk} is not a column of {}",
                    self.table
                )));
            }
        }
        Ok(())
    }
}

/// Coerce `value` into the storage type of `column`.
///
/// Nulls pass through untouched; columns without a declared type keep the
/// value as given.
pub(crate) fn typecast(
    column: &str,
    column_type: Option<ColumnType>,
    value: Value,
) -> Result<Value, LazyError> {
    let Some(column_type) = column_type else {
        return Ok(value);
    };
    if is_null(&value) {
        return Ok(value);
    }

    match column_type {
        ColumnType::Integer => match &value {
            Value::TinyInt(Some(i)) => Ok(Value::from(*i as i64)),
            Value::SmallInt(Some(i)) => Ok(Value::from(*i as i64)),
            Value::Int(Some(i)) => Ok(Value::from(*i as i64)),
            Value::BigInt(Some(_)) => Ok(value),
            Value::TinyUnsigned(Some(u)) => Ok(Value::from(*u as i64)),
            Value::SmallUnsigned(Some(u)) => Ok(Value::from(*u as i64)),
            Value::Unsigned(Some(u)) => Ok(Value::from(*u as i64)),
            Value::BigUnsigned(Some(u)) => i64::try_from(*u)
                .map(Value::from)
                .map_err(|_| LazyError::typecast(column, format!("{u} exceeds i64::MAX"))),
            Value::String(Some(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| LazyError::typecast(column, format!("{s:?}: {e}"))),
            other => Err(LazyError::typecast(
                column,
                format!("cannot store {other:?} in an integer column"),
            )),
        },
        ColumnType::Text => match &value {
            Value::String(Some(_)) => Ok(value),
            Value::Bool(Some(b)) => Ok(Value::from(b.to_string())),
            Value::TinyInt(Some(i)) => Ok(Value::from(i.to_string())),
            Value::SmallInt(Some(i)) => Ok(Value::from(i.to_string())),
            Value::Int(Some(i)) => Ok(Value::from(i.to_string())),
            Value::BigInt(Some(i)) => Ok(Value::from(i.to_string())),
            Value::TinyUnsigned(Some(u)) => Ok(Value::from(u.to_string())),
            Value::SmallUnsigned(Some(u)) => Ok(Value::from(u.to_string())),
            Value::Unsigned(Some(u)) => Ok(Value::from(u.to_string())),
            Value::BigUnsigned(Some(u)) => Ok(Value::from(u.to_string())),
            Value::Float(Some(f)) => Ok(Value::from(f.to_string())),
            Value::Double(Some(f)) => Ok(Value::from(f.to_string())),
            other => Err(LazyError::typecast(
                column,
                format!("cannot store {other:?} in a text column"),
            )),
        },
        ColumnType::Boolean => match &value {
            Value::Bool(Some(_)) => Ok(value),
            Value::String(Some(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" | "on" => Ok(Value::from(true)),
                "f" | "false" | "0" | "n" | "no" | "off" => Ok(Value::from(false)),
                _ => Err(LazyError::typecast(column, format!("{s:?} is not a boolean"))),
            },
            Value::Int(Some(i)) => Ok(Value::from(*i != 0)),
            Value::BigInt(Some(i)) => Ok(Value::from(*i != 0)),
            other => Err(LazyError::typecast(
                column,
                format!("cannot store {other:?} in a boolean column"),
            )),
        },
        ColumnType::Float => match &value {
            Value::Double(Some(_)) => Ok(value),
            Value::Float(Some(f)) => Ok(Value::from(*f as f64)),
            Value::Int(Some(i)) => Ok(Value::from(*i as f64)),
            Value::BigInt(Some(i)) => Ok(Value::from(*i as f64)),
            Value::String(Some(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| LazyError::typecast(column, format!("{s:?}: {e}"))),
            other => Err(LazyError::typecast(
                column,
                format!("cannot store {other:?} in a float column"),
            )),
        },
        ColumnType::Bytes => match &value {
            Value::Bytes(Some(_)) => Ok(value),
            Value::String(Some(s)) => Ok(Value::from(s.as_bytes().to_vec())),
            other => Err(LazyError::typecast(
                column,
                format!("cannot store {other:?} in a bytes column"),
            )),
        },
        // Serialized payloads are stored verbatim.
        ColumnType::Json => Ok(value),
    }
}

/// True for the `None` form of the scalar variants rows are decoded into
pub(crate) fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Bytes(None)
    )
}
