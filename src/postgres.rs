//! `RowExecutor` over a `may_postgres::Client`.
//!
//! Requests are rendered by SeaQuery with values inlined, so no parameter
//! binding is needed. Cells are decoded by Postgres type into
//! `sea_query::Value`; types without a dedicated mapping are read as text.

use crate::config::LazyConfig;
use crate::error::LazyError;
use crate::executor::{RawRow, RowExecutor};
use crate::query::SelectRequest;
use may_postgres::types::Type;
use may_postgres::{Client, Row};
use sea_query::Value;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

pub struct PgExecutor {
    client: Client,
}

impl PgExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using a `postgresql://` URI or a key-value connection string
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Postgres` if the connection cannot be established.
    pub fn connect(connection_string: &str) -> Result<Self, LazyError> {
        if connection_string.is_empty() {
            return Err(LazyError::configuration("connection string cannot be empty"));
        }
        let client = may_postgres::connect(connection_string)?;
        Ok(Self::new(client))
    }

    /// Connect to `config.database_url`
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Postgres` if the connection cannot be established.
    pub fn from_config(config: &LazyConfig) -> Result<Self, LazyError> {
        Self::connect(&config.database_url)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }
}

impl RowExecutor for PgExecutor {
    fn execute_select(&self, request: &SelectRequest) -> Result<Vec<RawRow>, LazyError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::query_span(&request.table).entered();

        let sql = request.to_sql();
        let rows = self.client.query(sql.as_str(), &[])?;
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &Row) -> Result<RawRow, LazyError> {
    let mut out = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx, column.type_())
            .map_err(|e| LazyError::Parse(format!("column {}: {e}", column.name())))?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_cell(row: &Row, idx: usize, ty: &Type) -> Result<Value, may_postgres::Error> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Bool(None))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::SmallInt(None))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Int(None))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::BigInt(None))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Float(None))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Double(None))
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Bytes(None))
    } else {
        row.try_get::<_, Option<String>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::String(None))
    };
    Ok(value)
}
