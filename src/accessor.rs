//! Accessor override chains.
//!
//! Reading an attribute resolves through a stack of layers, top first:
//!
//! 1. accessors defined with [`Entity::define_accessor`](crate::Entity::define_accessor),
//!    most recent on top
//! 2. the lazy-load overlay, present when the attribute is registered lazy
//! 3. the column read: raw value from the record, passed through the
//!    column's [`ValueTransform`](crate::ValueTransform) if one is set
//!
//! A defined accessor reaches the layers beneath it through [`Super::call`],
//! so it can post-process a lazily loaded value without re-implementing the
//! load trigger.

use crate::error::LazyError;
use crate::loader;
use crate::record::Record;
use sea_query::Value;
use std::rc::Rc;

/// User-defined accessor: receives the record and a handle to the layers below
pub type AccessorFn = Rc<dyn Fn(&Record, &Super<'_>) -> Result<Option<Value>, LazyError>>;

#[derive(Clone)]
pub(crate) enum Layer {
    Column,
    LazyLoad,
    Defined(AccessorFn),
}

/// Delegation handle to the shadowed accessor implementation
pub struct Super<'a> {
    record: &'a Record,
    attribute: &'a str,
    below: &'a [Layer],
}

impl Super<'_> {
    /// Invoke the next layer down
    pub fn call(&self) -> Result<Option<Value>, LazyError> {
        dispatch(self.record, self.attribute, self.below)
    }

    pub fn attribute(&self) -> &str {
        self.attribute
    }
}

/// Resolve `attribute` through `layers`, ordered bottom to top
pub(crate) fn dispatch(
    record: &Record,
    attribute: &str,
    layers: &[Layer],
) -> Result<Option<Value>, LazyError> {
    let Some((top, below)) = layers.split_last() else {
        return record.read_column(attribute);
    };
    match top {
        Layer::Column => record.read_column(attribute),
        Layer::LazyLoad => {
            loader::ensure_loaded(record, attribute)?;
            dispatch(record, attribute, below)
        }
        Layer::Defined(accessor) => accessor(
            record,
            &Super {
                record,
                attribute,
                below,
            },
        ),
    }
}
