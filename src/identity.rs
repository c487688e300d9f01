//! Identity map and batch contexts.
//!
//! A [`BatchContext`] groups the records of one entity that were retrieved
//! together, so a lazy read on one of them can hydrate all of them with a
//! single query. Batch contexts come from two places:
//!
//! - an [`IdentityMap`] open on the session owns one context per table,
//!   covering every record materialized while the scope is open
//! - outside a scope, a retrieval returning several records gets a transient
//!   context of its own, shared by exactly those records
//!
//! Contexts hold records weakly; records that have been dropped simply stop
//! being siblings.

use crate::key::KeyValue;
use crate::record::{Record, RecordInner};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Records of one entity retrieved together
pub struct BatchContext {
    table: String,
    members: RefCell<Vec<Weak<RecordInner>>>,
}

impl BatchContext {
    pub(crate) fn new(table: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            table: table.into(),
            members: RefCell::new(Vec::new()),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn track(&self, record: &Record) {
        self.members.borrow_mut().push(Rc::downgrade(&record.inner));
    }

    /// Live members, in the order they were retrieved
    pub fn records(&self) -> Vec<Record> {
        self.members
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Record { inner })
            .collect()
    }

    /// Members with a primary key that have neither a value nor a tombstone
    /// for `attribute`, in retrieval order, leaving out `excluding`
    pub fn siblings_missing(&self, attribute: &str, excluding: Option<&Record>) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| excluding.map_or(true, |ex| !ex.ptr_eq(r)))
            .filter(|r| !r.is_new() && r.primary_key().is_some())
            .filter(|r| !r.is_considered(attribute))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for BatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchContext")
            .field("table", &self.table)
            .field("members", &self.len())
            .finish()
    }
}

/// How a record reaches its batch context
pub(crate) enum BatchLink {
    /// Context owned by an identity scope; gone once the scope closes
    Shared(Weak<BatchContext>),
    /// Transient context of a single retrieval
    Owned(Rc<BatchContext>),
}

impl BatchLink {
    pub(crate) fn context(&self) -> Option<Rc<BatchContext>> {
        match self {
            BatchLink::Shared(weak) => weak.upgrade(),
            BatchLink::Owned(rc) => Some(Rc::clone(rc)),
        }
    }
}

/// Scoped registry of materialized records keyed by (table, primary key)
#[derive(Default)]
pub struct IdentityMap {
    records: RefCell<HashMap<(String, KeyValue), Record>>,
    batches: RefCell<HashMap<String, Rc<BatchContext>>>,
}

impl IdentityMap {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn lookup(&self, table: &str, key: &KeyValue) -> Option<Record> {
        self.records
            .borrow()
            .get(&(table.to_string(), key.clone()))
            .cloned()
    }

    /// The batch context for `table`, created on first use
    pub(crate) fn batch(&self, table: &str) -> Rc<BatchContext> {
        Rc::clone(
            self.batches
                .borrow_mut()
                .entry(table.to_string())
                .or_insert_with(|| BatchContext::new(table)),
        )
    }

    pub(crate) fn register(&self, record: &Record, key: KeyValue) {
        let table = record.entity().table().to_string();
        self.batch(&table).track(record);
        self.records.borrow_mut().insert((table, key), record.clone());
    }

    /// Records of `table` materialized in this scope, in retrieval order
    pub fn records_for(&self, table: &str) -> Vec<Record> {
        self.batches
            .borrow()
            .get(table)
            .map(|b| b.records())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("records", &self.len())
            .field("tables", &self.batches.borrow().len())
            .finish()
    }
}
