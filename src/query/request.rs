//! Structured SELECT requests handed to a [`RowExecutor`](crate::executor::RowExecutor).
//!
//! Every query this crate issues is a projection of named columns from one
//! table, filtered by equality or set membership on a column, with an
//! optional row limit. Keeping that shape structured lets executors and
//! tests inspect it; [`SelectRequest::to_statement`] renders it through
//! SeaQuery for execution.

use sea_query::{Asterisk, DynIden, Expr, ExprTrait, PostgresQueryBuilder, SelectStatement, Value};

/// Filter on a single column
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFilter {
    /// `column = value`
    Eq(String, Value),
    /// `column IN (values...)`
    In(String, Vec<Value>),
}

impl KeyFilter {
    pub fn column(&self) -> &str {
        match self {
            KeyFilter::Eq(column, _) | KeyFilter::In(column, _) => column,
        }
    }

    fn to_expr(&self) -> Expr {
        match self {
            KeyFilter::Eq(column, value) => Expr::col(iden(column)).eq(value.clone()),
            KeyFilter::In(column, values) => Expr::col(iden(column)).is_in(values.clone()),
        }
    }
}

/// A single-table SELECT
///
/// # Example
///
/// ```
/// use lifeguard_lazy::{KeyFilter, SelectRequest};
///
/// let request = SelectRequest::new("la")
///     .columns(["name"])
///     .filter(KeyFilter::Eq("id".into(), 1i64.into()))
///     .limit(1);
/// assert_eq!(request.columns, vec!["name".to_string()]);
/// assert_eq!(request.limit, Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub table: String,
    /// Selected columns in order; empty selects every column
    pub columns: Vec<String>,
    /// Conditions joined with AND
    pub filters: Vec<KeyFilter>,
    pub limit: Option<u64>,
}

impl SelectRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: KeyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when the request selects every column
    pub fn selects_all(&self) -> bool {
        self.columns.is_empty()
    }

    /// Render as a SeaQuery statement
    pub fn to_statement(&self) -> SelectStatement {
        let mut query = SelectStatement::default();
        if self.columns.is_empty() {
            query.column(Asterisk);
        } else {
            query.columns(self.columns.iter().map(|c| iden(c)));
        }
        query.from(iden(&self.table));
        for filter in &self.filters {
            query.and_where(filter.to_expr());
        }
        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        query
    }

    /// Postgres SQL with values inlined, as used for logging and by
    /// [`PgExecutor`](crate::PgExecutor)
    pub fn to_sql(&self) -> String {
        self.to_statement().to_string(PostgresQueryBuilder)
    }
}

fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all_renders_asterisk() {
        let sql = SelectRequest::new("la").to_sql();
        assert!(sql.starts_with("SELECT *"), "got {sql}");
        assert!(sql.contains("la"));
    }

    #[test]
    fn test_single_row_request_renders_eq_and_limit() {
        let sql = SelectRequest::new("la")
            .columns(["name"])
            .filter(KeyFilter::Eq("id".into(), Value::from(1i64)))
            .limit(1)
            .to_sql();
        assert!(sql.contains("name"), "got {sql}");
        assert!(sql.contains("WHERE"), "got {sql}");
        assert!(sql.contains("= 1"), "got {sql}");
        assert!(sql.ends_with("LIMIT 1"), "got {sql}");
    }

    #[test]
    fn test_batch_request_renders_in_list() {
        let sql = SelectRequest::new("la")
            .columns(["id", "name"])
            .filter(KeyFilter::In(
                "id".into(),
                vec![Value::from(1i64), Value::from(2i64)],
            ))
            .to_sql();
        assert!(sql.contains("IN (1, 2)"), "got {sql}");
        assert!(!sql.contains("LIMIT"), "got {sql}");
    }

    #[test]
    fn test_filter_column_accessor() {
        let filter = KeyFilter::In("id".into(), vec![]);
        assert_eq!(filter.column(), "id");
    }
}
