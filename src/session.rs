//! Sessions: the executor and settings records load through, plus the
//! optional identity scope that links retrievals into one batch.
//!
//! # Example
//!
//! ```no_run
//! # use lifeguard_lazy::{Entity, Session, RowExecutor};
//! # fn demo(la: &Entity, executor: impl RowExecutor + 'static) -> Result<(), lifeguard_lazy::LazyError> {
//! let session = Session::new(executor);
//! session.with_identity_map(|| -> Result<(), lifeguard_lazy::LazyError> {
//!     let records = la.find().all(&session)?;
//!     // one query hydrates `name` for every record above
//!     for record in &records {
//!         record.get("name")?;
//!     }
//!     Ok(())
//! })
//! # }
//! ```

use crate::config::LazyConfig;
use crate::entity::Entity;
use crate::error::LazyError;
use crate::executor::{RawRow, RowExecutor};
use crate::identity::{BatchContext, BatchLink, IdentityMap};
use crate::key::KeyValue;
use crate::record::{Link, Record};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

struct SessionInner {
    executor: Box<dyn RowExecutor>,
    config: LazyConfig,
    scope: RefCell<Option<Rc<IdentityMap>>>,
}

impl Session {
    pub fn new(executor: impl RowExecutor + 'static) -> Self {
        Self::with_config(executor, LazyConfig::default())
    }

    pub fn with_config(executor: impl RowExecutor + 'static, config: LazyConfig) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                executor: Box::new(executor),
                config,
                scope: RefCell::new(None),
            }),
        }
    }

    pub fn executor(&self) -> &dyn RowExecutor {
        self.inner.executor.as_ref()
    }

    pub fn config(&self) -> &LazyConfig {
        &self.inner.config
    }

    /// Open an identity scope for as long as the guard lives.
    ///
    /// When a scope is already open the guard joins it and closing the guard
    /// leaves the outer scope open.
    pub fn identity_scope(&self) -> IdentityScope {
        let mut scope = self.inner.scope.borrow_mut();
        let owned = scope.is_none();
        if owned {
            log::trace!("opening identity scope");
            *scope = Some(IdentityMap::new());
        }
        IdentityScope {
            session: self.clone(),
            owned,
        }
    }

    /// Run `f` inside an identity scope
    pub fn with_identity_map<R>(&self, f: impl FnOnce() -> R) -> R {
        let _scope = self.identity_scope();
        f()
    }

    pub fn is_identity_scope_active(&self) -> bool {
        self.inner.scope.borrow().is_some()
    }

    /// The identity map of the open scope
    pub fn identity_map(&self) -> Option<Rc<IdentityMap>> {
        self.inner.scope.borrow().clone()
    }

    /// Turn fetched rows into records, de-duplicating through the open
    /// identity scope and grouping them into a batch context.
    pub(crate) fn materialize(&self, entity: &Entity, rows: Vec<RawRow>) -> Result<Vec<Record>, LazyError> {
        match self.identity_map() {
            Some(map) => Ok(self.materialize_scoped(entity, rows, &map)),
            None => Ok(self.materialize_transient(entity, rows)),
        }
    }

    fn materialize_scoped(&self, entity: &Entity, rows: Vec<RawRow>, map: &Rc<IdentityMap>) -> Vec<Record> {
        let table = entity.table();
        let batch = map.batch(table);
        let pk = entity.primary_key_name();

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let key = pk.and_then(|pk| row.get(pk)).and_then(KeyValue::from_value);
            if let Some(existing) = key.as_ref().and_then(|k| map.lookup(table, k)) {
                existing.fill(&row, pk);
                records.push(existing);
                continue;
            }

            let link = Link {
                session: self.clone(),
                batch: Some(BatchLink::Shared(Rc::downgrade(&batch))),
            };
            let record = Record::retrieved(entity.clone(), row, link);
            match key {
                Some(key) => map.register(&record, key),
                // Keyless rows cannot be identity-mapped or lazily loaded
                None => batch.track(&record),
            }
            records.push(record);
        }
        records
    }

    fn materialize_transient(&self, entity: &Entity, rows: Vec<RawRow>) -> Vec<Record> {
        let batch = (rows.len() > 1).then(|| BatchContext::new(entity.table()));
        rows.into_iter()
            .map(|row| {
                let link = Link {
                    session: self.clone(),
                    batch: batch.as_ref().map(|b| BatchLink::Owned(Rc::clone(b))),
                };
                let record = Record::retrieved(entity.clone(), row, link);
                if let Some(batch) = &batch {
                    batch.track(&record);
                }
                record
            })
            .collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("identity_scope", &self.inner.scope.borrow())
            .finish()
    }
}

/// Guard for an open identity scope; closes it on drop
#[must_use = "the identity scope closes when the guard is dropped"]
pub struct IdentityScope {
    session: Session,
    owned: bool,
}

impl IdentityScope {
    pub fn identity_map(&self) -> Option<Rc<IdentityMap>> {
        self.session.identity_map()
    }
}

impl Drop for IdentityScope {
    fn drop(&mut self) {
        if self.owned {
            log::trace!("closing identity scope");
            // Take first so records released here cannot observe a live borrow
            let closed = self.session.inner.scope.borrow_mut().take();
            drop(closed);
        }
    }
}

impl fmt::Debug for IdentityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityScope").field("owned", &self.owned).finish()
    }
}
