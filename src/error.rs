//! Error type shared by the registry, the loader and the executors.

use std::fmt;

#[cfg(feature = "postgres")]
use may_postgres::Error as PostgresError;

/// Errors raised while configuring entities or loading lazy attributes
#[derive(Debug)]
pub enum LazyError {
    /// Invalid entity configuration, reported at registration time
    Configuration(String),
    /// `PostgreSQL` error from `may_postgres`
    #[cfg(feature = "postgres")]
    Postgres(PostgresError),
    /// Data-access failure reported by an executor
    Query(String),
    /// Row parsing/conversion error
    Parse(String),
    /// A setter could not coerce a value into the column's type
    Typecast { column: String, message: String },
    /// A value transform rejected a raw value
    Transform { column: String, message: String },
}

impl LazyError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        LazyError::Configuration(message.into())
    }

    pub(crate) fn typecast(column: &str, message: impl Into<String>) -> Self {
        LazyError::Typecast {
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn transform(column: &str, message: impl Into<String>) -> Self {
        LazyError::Transform {
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// True when the error came from the data source rather than from
    /// configuration or value handling.
    pub fn is_data_access(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            LazyError::Postgres(_) => true,
            LazyError::Query(_) | LazyError::Parse(_) => true,
            LazyError::Configuration(_)
            | LazyError::Typecast { .. }
            | LazyError::Transform { .. } => false,
        }
    }
}

impl fmt::Display for LazyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyError::Configuration(s) => write!(f, "Configuration error: {s}"),
            #[cfg(feature = "postgres")]
            LazyError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            LazyError::Query(s) => write!(f, "Query error: {s}"),
            LazyError::Parse(s) => write!(f, "Parse error: {s}"),
            LazyError::Typecast { column, message } => {
                write!(f, "Typecast error on column {column}: {message}")
            }
            LazyError::Transform { column, message } => {
                write!(f, "Transform error on column {column}: {message}")
            }
        }
    }
}

impl std::error::Error for LazyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "postgres")]
            LazyError::Postgres(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "postgres")]
impl From<PostgresError> for LazyError {
    fn from(err: PostgresError) -> Self {
        LazyError::Postgres(err)
    }
}
