//! Retrieval builder returned by [`Entity::find`](crate::Entity::find).
//!
//! A `Dataset` starts from the entity's default projection (lazy columns
//! already removed), can be narrowed with filters and a limit, and
//! materializes [`Record`]s through a [`Session`].

use crate::entity::Entity;
use crate::error::LazyError;
use crate::query::{KeyFilter, Projection, SelectRequest};
use crate::record::Record;
use crate::session::Session;
use sea_query::Value;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Query builder for retrieving records of one entity
///
/// # Example
///
/// ```
/// use lifeguard_lazy::{ColumnType, Entity, EntitySchema};
///
/// let la = Entity::new(
///     EntitySchema::new("la")
///         .column("id", ColumnType::Integer)
///         .column("name", ColumnType::Text)
///         .primary_key("id"),
/// )?;
/// la.lazy_attributes(["name"])?;
///
/// let request = la.find().filter_eq("id", 1i64).limit(1).request();
/// assert_eq!(request.columns, vec!["id".to_string()]);
/// assert_eq!(request.limit, Some(1));
/// # Ok::<(), lifeguard_lazy::LazyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Dataset {
    entity: Entity,
    projection: Option<Projection>,
    filters: Vec<KeyFilter>,
    limit: Option<u64>,
}

impl Dataset {
    pub(crate) fn new(entity: Entity) -> Self {
        Self {
            entity,
            projection: None,
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Select an explicit column list for this retrieval; lazy columns are
    /// still stripped from it
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(Projection::columns(columns));
        self
    }

    pub fn filter(mut self, filter: KeyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(KeyFilter::Eq(column.into(), value.into()))
    }

    pub fn filter_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(KeyFilter::In(
            column.into(),
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The request this retrieval issues
    pub fn request(&self) -> SelectRequest {
        let projection = match &self.projection {
            Some(explicit) => self.entity.narrow(explicit),
            None => self.entity.projection(),
        };
        let mut request = self.entity.request_for(&projection);
        request.filters = self.filters.clone();
        request.limit = self.limit;
        request
    }

    pub fn sql(&self) -> String {
        self.request().to_sql()
    }

    /// Execute and materialize every matching record
    ///
    /// # Errors
    ///
    /// Returns `LazyError` if the executor fails.
    pub fn all(self, session: &Session) -> Result<Vec<Record>, LazyError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::retrieve_span(self.entity.table()).entered();

        let request = self.request();
        log::debug!("retrieve: {}", request.to_sql());
        let rows = session.executor().execute_select(&request)?;
        session.materialize(&self.entity, rows)
    }

    /// Execute with `LIMIT 1` and return the first record, if any
    ///
    /// # Errors
    ///
    /// Returns `LazyError` if the executor fails.
    pub fn first(self, session: &Session) -> Result<Option<Record>, LazyError> {
        Ok(self.limit(1).all(session)?.into_iter().next())
    }

    /// Look up one record by primary key
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Configuration` if the entity has no primary key,
    /// or the executor's error.
    pub fn find_by_pk(self, key: impl Into<Value>, session: &Session) -> Result<Option<Record>, LazyError> {
        let Some(pk) = self.entity.primary_key_name() else {
            return Err(LazyError::configuration(format!(
                "{} has no primary key",
                self.entity.table()
            )));
        };
        let pk = pk.to_string();
        self.filter_eq(pk, key).first(session)
    }
}
