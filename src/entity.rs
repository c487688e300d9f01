//! Entity types: schema, lazy attribute registry, default projection and
//! accessor configuration.
//!
//! An [`Entity`] is a cheap handle; clones share configuration. It is
//! mutated while the application is being configured and read while records
//! are retrieved and accessed.
//!
//! # Example
//!
//! ```
//! use lifeguard_lazy::{ColumnType, Entity, EntitySchema};
//!
//! let la = Entity::new(
//!     EntitySchema::new("la")
//!         .column("id", ColumnType::Integer)
//!         .column("name", ColumnType::Text)
//!         .primary_key("id"),
//! )?;
//! la.lazy_attributes(["name"])?;
//! assert_eq!(la.default_request().columns, vec!["id".to_string()]);
//! # Ok::<(), lifeguard_lazy::LazyError>(())
//! ```

use crate::accessor::{AccessorFn, Layer, Super};
use crate::error::LazyError;
use crate::query::{rewrite, Dataset, Projection, SelectRequest};
use crate::record::Record;
use crate::schema::EntitySchema;
use crate::transform::ValueTransform;
use sea_query::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

struct EntityInner {
    schema: EntitySchema,
    state: RefCell<EntityState>,
}

#[derive(Default)]
struct EntityState {
    /// Registered lazy attributes, in registration order
    lazy: Vec<String>,
    projection: Option<Projection>,
    /// Columns known from explicit projections but absent from the schema
    extra_columns: Vec<String>,
    accessors: HashMap<String, Vec<AccessorFn>>,
    transforms: HashMap<String, Rc<dyn ValueTransform>>,
}

impl Entity {
    /// Create an entity whose default query selects every column
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Configuration` if the primary key is not a column.
    pub fn new(schema: EntitySchema) -> Result<Self, LazyError> {
        schema.validate()?;
        Ok(Self {
            inner: Rc::new(EntityInner {
                schema,
                state: RefCell::new(EntityState::default()),
            }),
        })
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.inner.schema
    }

    pub fn table(&self) -> &str {
        self.inner.schema.table()
    }

    pub fn primary_key_name(&self) -> Option<&str> {
        self.inner.schema.primary_key_name()
    }

    /// Mark columns as lazy.
    ///
    /// Additive: names already registered stay lazy. The default projection
    /// is narrowed immediately, and reads of each name go through the
    /// lazy-load overlay from now on.
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Configuration` if a name is not a known column or
    /// is the primary key. Nothing is registered in that case.
    pub fn lazy_attributes<I, S>(&self, names: I) -> Result<(), LazyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut state = self.inner.state.borrow_mut();

        for name in &names {
            if Some(name.as_str()) == self.primary_key_name() {
                return Err(LazyError::configuration(format!(
                    "primary key {name} of {} cannot be lazy",
                    self.table()
                )));
            }
            if !self.inner.schema.has_column(name) && !state.extra_columns.contains(name) {
                return Err(LazyError::configuration(format!(
                    "{name} is not a column of {}",
                    self.table()
                )));
            }
        }

        for name in names {
            if !state.lazy.contains(&name) {
                log::debug!("{}: registering lazy attribute {name}", self.table());
                state.lazy.push(name);
            }
        }

        let current = state.projection.clone().unwrap_or(Projection::All);
        let narrowed = rewrite(&self.inner.schema.column_names(), &state.lazy, &current);
        state.projection = Some(narrowed);
        Ok(())
    }

    pub fn registered_lazy_attributes(&self) -> Vec<String> {
        self.inner.state.borrow().lazy.clone()
    }

    pub fn is_lazy(&self, name: &str) -> bool {
        self.inner.state.borrow().lazy.iter().any(|l| l == name)
    }

    /// Replace the default projection; lazy columns are stripped from it
    pub fn set_projection(&self, projection: Projection) {
        let mut state = self.inner.state.borrow_mut();
        if let Projection::Columns(cols) = &projection {
            for col in cols {
                if !self.inner.schema.has_column(col) && !state.extra_columns.contains(col) {
                    state.extra_columns.push(col.clone());
                }
            }
        }
        state.projection = if state.lazy.is_empty() {
            Some(projection)
        } else {
            Some(rewrite(&self.inner.schema.column_names(), &state.lazy, &projection))
        };
    }

    /// The effective default projection
    pub fn projection(&self) -> Projection {
        self.inner
            .state
            .borrow()
            .projection
            .clone()
            .unwrap_or(Projection::All)
    }

    /// Narrow an ad-hoc projection the way the default one is narrowed
    pub(crate) fn narrow(&self, projection: &Projection) -> Projection {
        let state = self.inner.state.borrow();
        if state.lazy.is_empty() {
            return projection.clone();
        }
        rewrite(&self.inner.schema.column_names(), &state.lazy, projection)
    }

    /// The request a plain retrieval issues
    pub fn default_request(&self) -> SelectRequest {
        self.request_for(&self.projection())
    }

    pub(crate) fn request_for(&self, projection: &Projection) -> SelectRequest {
        let request = SelectRequest::new(self.table());
        match projection {
            Projection::All => request,
            // Every column lazy: keep the key so records can still load later
            Projection::Columns(cols) if cols.is_empty() => match self.primary_key_name() {
                Some(pk) => request.columns([pk]),
                None => request,
            },
            Projection::Columns(cols) => request.columns(cols.iter().cloned()),
        }
    }

    pub fn default_sql(&self) -> String {
        self.default_request().to_sql()
    }

    /// Define an accessor for `attribute`, layered over whatever was defined before.
    ///
    /// # Example
    ///
    /// ```
    /// # use lifeguard_lazy::{ColumnType, Entity, EntitySchema};
    /// # use sea_query::Value;
    /// # let la = Entity::new(EntitySchema::new("la").column("id", ColumnType::Integer).column("name", ColumnType::Text).primary_key("id"))?;
    /// la.define_accessor("name", |_record, sup| {
    ///     Ok(sup.call()?.map(|v| match v {
    ///         Value::String(Some(s)) => Value::from(format!("{s}-blah")),
    ///         other => other,
    ///     }))
    /// });
    /// # Ok::<(), lifeguard_lazy::LazyError>(())
    /// ```
    pub fn define_accessor<F>(&self, attribute: impl Into<String>, accessor: F)
    where
        F: Fn(&Record, &Super<'_>) -> Result<Option<Value>, LazyError> + 'static,
    {
        self.inner
            .state
            .borrow_mut()
            .accessors
            .entry(attribute.into())
            .or_default()
            .push(Rc::new(accessor));
    }

    /// Decode `column` through `transform` whenever it is read
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Configuration` if `column` is not a known column.
    pub fn serialize_column<T>(&self, column: impl Into<String>, transform: T) -> Result<(), LazyError>
    where
        T: ValueTransform + 'static,
    {
        let column = column.into();
        let mut state = self.inner.state.borrow_mut();
        if !self.inner.schema.has_column(&column) && !state.extra_columns.contains(&column) {
            return Err(LazyError::configuration(format!(
                "{column} is not a column of {}",
                self.table()
            )));
        }
        state.transforms.insert(column, Rc::new(transform));
        Ok(())
    }

    /// Start a retrieval
    pub fn find(&self) -> Dataset {
        Dataset::new(self.clone())
    }

    /// A new, unpersisted record
    pub fn new_record(&self) -> Record {
        Record::new(self.clone())
    }

    /// Accessor layers for `attribute`, bottom first
    pub(crate) fn layers(&self, attribute: &str) -> Vec<Layer> {
        let state = self.inner.state.borrow();
        let mut layers = vec![Layer::Column];
        if state.lazy.iter().any(|l| l == attribute) {
            layers.push(Layer::LazyLoad);
        }
        if let Some(defined) = state.accessors.get(attribute) {
            layers.extend(defined.iter().cloned().map(Layer::Defined));
        }
        layers
    }

    pub(crate) fn transform(&self, column: &str) -> Option<Rc<dyn ValueTransform>> {
        self.inner.state.borrow().transforms.get(column).cloned()
    }

    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Entity")
            .field("table", &self.table())
            .field("lazy", &state.lazy)
            .field("projection", &state.projection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn la() -> Entity {
        Entity::new(
            EntitySchema::new("la")
                .column("id", ColumnType::Integer)
                .column("name", ColumnType::Text)
                .primary_key("id"),
        )
        .unwrap()
    }

    #[test]
    fn test_default_projection_is_all_until_lazy() {
        let la = la();
        assert_eq!(la.projection(), Projection::All);
        assert!(la.default_request().selects_all());
    }

    #[test]
    fn test_lazy_attribute_removed_from_default_request() {
        let la = la();
        la.lazy_attributes(["name"]).unwrap();
        assert_eq!(la.default_request().columns, vec!["id".to_string()]);
        assert!(la.is_lazy("name"));
        assert!(!la.is_lazy("id"));
    }

    #[test]
    fn test_registration_is_idempotent() {
        let la = la();
        la.lazy_attributes(["name"]).unwrap();
        la.lazy_attributes(["name", "name"]).unwrap();
        assert_eq!(la.registered_lazy_attributes(), vec!["name".to_string()]);
    }

    #[test]
    fn test_unknown_column_rejected_at_registration() {
        let la = la();
        let err = la.lazy_attributes(["name", "nope"]);
        assert!(matches!(err, Err(LazyError::Configuration(_))));
        // all-or-nothing
        assert!(la.registered_lazy_attributes().is_empty());
        assert_eq!(la.projection(), Projection::All);
    }

    #[test]
    fn test_primary_key_cannot_be_lazy() {
        let err = la().lazy_attributes(["id"]);
        assert!(matches!(err, Err(LazyError::Configuration(_))));
    }

    #[test]
    fn test_explicit_projection_columns_become_known() {
        let la = la();
        la.set_projection(Projection::columns(["id", "blah"]));
        assert_eq!(la.default_request().columns, vec!["id", "blah"]);

        la.lazy_attributes(["blah"]).unwrap();
        assert_eq!(la.projection(), Projection::columns(["id"]));
    }

    #[test]
    fn test_set_projection_after_registration_is_narrowed() {
        let la = la();
        la.lazy_attributes(["name"]).unwrap();
        la.set_projection(Projection::All);
        assert_eq!(la.projection(), Projection::columns(["id"]));
    }

    #[test]
    fn test_layers_order() {
        let la = la();
        assert_eq!(la.layers("name").len(), 1);
        la.define_accessor("name", |_, sup| sup.call());
        la.lazy_attributes(["name"]).unwrap();
        let layers = la.layers("name");
        assert_eq!(layers.len(), 3);
        assert!(matches!(layers[0], Layer::Column));
        assert!(matches!(layers[1], Layer::LazyLoad));
        assert!(matches!(layers[2], Layer::Defined(_)));
    }

    #[test]
    fn test_serialize_unknown_column_rejected() {
        let err = la().serialize_column("nope", crate::transform::JsonColumn);
        assert!(matches!(err, Err(LazyError::Configuration(_))));
    }
}
