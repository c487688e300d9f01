//! Records: one row's materialized values plus the link back to the
//! retrieval that produced it.

use crate::accessor;
use crate::entity::Entity;
use crate::error::LazyError;
use crate::executor::RawRow;
use crate::identity::{BatchContext, BatchLink};
use crate::schema::{is_null, typecast};
use crate::session::Session;
use sea_query::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Shared handle to a persisted or new row.
///
/// Clones refer to the same row; within an identity scope, retrieving the
/// same primary key twice yields handles to one record.
#[derive(Clone)]
pub struct Record {
    pub(crate) inner: Rc<RecordInner>,
}

pub(crate) struct RecordInner {
    entity: Entity,
    state: RefCell<RecordState>,
    link: Option<Link>,
}

struct RecordState {
    values: RawRow,
    /// Lazy columns whose follow-up fetch found no row
    vanished: BTreeSet<String>,
    /// Transform output per column, dropped when the raw value changes
    decoded: BTreeMap<String, Value>,
    new: bool,
}

/// Where a retrieved record came from
pub(crate) struct Link {
    pub(crate) session: Session,
    pub(crate) batch: Option<BatchLink>,
}

impl Record {
    pub(crate) fn new(entity: Entity) -> Self {
        Self::build(entity, RawRow::new(), true, None)
    }

    pub(crate) fn retrieved(entity: Entity, values: RawRow, link: Link) -> Self {
        Self::build(entity, values, false, Some(link))
    }

    fn build(entity: Entity, values: RawRow, new: bool, link: Option<Link>) -> Self {
        Self {
            inner: Rc::new(RecordInner {
                entity,
                state: RefCell::new(RecordState {
                    values,
                    vanished: BTreeSet::new(),
                    decoded: BTreeMap::new(),
                    new,
                }),
                link,
            }),
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.inner.entity
    }

    /// Read `attribute` through its accessor chain.
    ///
    /// Lazy attributes that have not been materialized are fetched first;
    /// `Ok(None)` means the record has no value for the attribute.
    ///
    /// # Errors
    ///
    /// Propagates data-access errors from a follow-up fetch and transform
    /// errors from the column's value transform.
    pub fn get(&self, attribute: &str) -> Result<Option<Value>, LazyError> {
        let layers = self.inner.entity.layers(attribute);
        accessor::dispatch(self, attribute, &layers)
    }

    /// Assign `attribute`, coercing the value to the column's type
    ///
    /// # Errors
    ///
    /// Returns `LazyError::Typecast` if the value cannot be coerced.
    pub fn set(&self, attribute: &str, value: impl Into<Value>) -> Result<(), LazyError> {
        let column_type = self.inner.entity.schema().column_type(attribute);
        let value = typecast(attribute, column_type, value.into())?;
        let mut state = self.inner.state.borrow_mut();
        state.vanished.remove(attribute);
        state.decoded.remove(attribute);
        state.values.insert(attribute.to_string(), value);
        Ok(())
    }

    /// Raw materialized value, bypassing accessors and lazy loading
    pub fn raw(&self, attribute: &str) -> Option<Value> {
        self.inner.state.borrow().values.get(attribute).cloned()
    }

    /// Snapshot of the materialized value store
    pub fn values(&self) -> RawRow {
        self.inner.state.borrow().values.clone()
    }

    /// Snapshot of cached transform output
    pub fn decoded_values(&self) -> BTreeMap<String, Value> {
        self.inner.state.borrow().decoded.clone()
    }

    pub fn has_value(&self, attribute: &str) -> bool {
        self.inner.state.borrow().values.contains_key(attribute)
    }

    /// True when a follow-up fetch found no row for `attribute`
    pub fn is_vanished(&self, attribute: &str) -> bool {
        self.inner.state.borrow().vanished.contains(attribute)
    }

    pub fn is_new(&self) -> bool {
        self.inner.state.borrow().new
    }

    /// Primary key value, `None` when unset or NULL
    pub fn primary_key(&self) -> Option<Value> {
        let pk = self.inner.entity.primary_key_name()?;
        self.raw(pk).filter(|v| !is_null(v))
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Value already materialized or known to be absent
    pub(crate) fn is_considered(&self, attribute: &str) -> bool {
        let state = self.inner.state.borrow();
        state.values.contains_key(attribute) || state.vanished.contains(attribute)
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.inner.link.as_ref().map(|l| &l.session)
    }

    pub(crate) fn batch_context(&self) -> Option<Rc<BatchContext>> {
        self.inner.link.as_ref()?.batch.as_ref()?.context()
    }

    /// Merge columns from `row` that the record does not hold yet, skipping `except`
    pub(crate) fn fill(&self, row: &RawRow, except: Option<&str>) -> usize {
        let mut state = self.inner.state.borrow_mut();
        let mut merged = 0;
        for (column, value) in row {
            if Some(column.as_str()) == except || state.values.contains_key(column) {
                continue;
            }
            state.vanished.remove(column);
            state.decoded.remove(column);
            state.values.insert(column.clone(), value.clone());
            merged += 1;
        }
        merged
    }

    pub(crate) fn mark_vanished(&self, attribute: &str) {
        let mut state = self.inner.state.borrow_mut();
        if !state.values.contains_key(attribute) {
            state.vanished.insert(attribute.to_string());
        }
    }

    /// Bottom accessor layer: raw value through the column transform.
    pub(crate) fn read_column(&self, attribute: &str) -> Result<Option<Value>, LazyError> {
        let raw = {
            let state = self.inner.state.borrow();
            if let Some(decoded) = state.decoded.get(attribute) {
                return Ok(Some(decoded.clone()));
            }
            match state.values.get(attribute) {
                Some(raw) => raw.clone(),
                None => return Ok(None),
            }
        };

        let Some(transform) = self.inner.entity.transform(attribute) else {
            return Ok(Some(raw));
        };
        let decoded = transform.decode(attribute, &raw)?;
        self.inner
            .state
            .borrow_mut()
            .decoded
            .insert(attribute.to_string(), decoded.clone());
        Ok(Some(decoded))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Record")
            .field("table", &self.inner.entity.table())
            .field("values", &state.values)
            .field("vanished", &state.vanished)
            .field("new", &state.new)
            .finish()
    }
}
