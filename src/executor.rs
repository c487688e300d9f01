//! `RowExecutor` - the data-access boundary.
//!
//! Lazy loading never talks to a database directly. It hands a
//! [`SelectRequest`] to a `RowExecutor` and gets back decoded rows keyed by
//! column name. The bundled [`PgExecutor`](crate::PgExecutor) runs requests
//! on `may_postgres`; tests plug in an in-memory executor.

use crate::error::LazyError;
use crate::query::SelectRequest;
use sea_query::Value;
use std::collections::BTreeMap;

/// One decoded row: column name to raw value
pub type RawRow = BTreeMap<String, Value>;

/// Trait for executing single-table SELECTs
///
/// Implementations must support equality and set-membership filters on the
/// primary key column, and honor `limit` when it is set.
///
/// # Examples
///
/// ```
/// use lifeguard_lazy::{LazyError, RawRow, RowExecutor, SelectRequest};
///
/// struct Empty;
///
/// impl RowExecutor for Empty {
///     fn execute_select(&self, _request: &SelectRequest) -> Result<Vec<RawRow>, LazyError> {
///         Ok(Vec::new())
///     }
/// }
///
/// let rows = Empty.execute_select(&SelectRequest::new("la")).unwrap();
/// assert!(rows.is_empty());
/// ```
pub trait RowExecutor {
    /// Execute `request` and return every matching row
    ///
    /// # Errors
    ///
    /// Returns `LazyError` if the query cannot be executed or a row cannot
    /// be decoded.
    fn execute_select(&self, request: &SelectRequest) -> Result<Vec<RawRow>, LazyError>;
}

impl<T: RowExecutor + ?Sized> RowExecutor for &T {
    fn execute_select(&self, request: &SelectRequest) -> Result<Vec<RawRow>, LazyError> {
        (**self).execute_select(request)
    }
}

impl<T: RowExecutor + ?Sized> RowExecutor for std::rc::Rc<T> {
    fn execute_select(&self, request: &SelectRequest) -> Result<Vec<RawRow>, LazyError> {
        (**self).execute_select(request)
    }
}
