//! The lazy-attribute loader.
//!
//! `ensure_loaded` is invoked by the lazy-load accessor layer when a record
//! does not hold a value for a lazy attribute. It decides between a
//! single-record fetch and a batch fetch covering every sibling in the
//! record's batch context that is still missing the attribute, issues the
//! follow-up query, and merges the fetched columns into the right records.
//!
//! Targets that receive no row are tombstoned so they are never fetched
//! again. A failed query leaves every target untouched, so the next read
//! retries.

use crate::error::LazyError;
use crate::executor::RawRow;
use crate::key::KeyValue;
use crate::query::{KeyFilter, SelectRequest};
use crate::record::Record;
use crate::session::Session;
use sea_query::Value;
use std::collections::HashMap;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Make sure `record` holds a value or a tombstone for `attribute`.
///
/// New records, records without a primary key and records that were not
/// retrieved through a session are left alone: they read as "no value".
pub(crate) fn ensure_loaded(record: &Record, attribute: &str) -> Result<(), LazyError> {
    if record.is_considered(attribute) {
        log::trace!("{}.{attribute}: already materialized", record.entity().table());
        return Ok(());
    }
    if record.is_new() {
        return Ok(());
    }
    let (Some(pk_name), Some(pk_value)) = (record.entity().primary_key_name(), record.primary_key()) else {
        return Ok(());
    };
    let Some(session) = record.session() else {
        return Ok(());
    };

    let targets = gather_targets(record, attribute);
    if targets.len() > 1 {
        load_batch(session, &targets, pk_name, attribute)
    } else {
        load_single(session, record, pk_name, pk_value, attribute)
    }
}

/// Siblings still missing `attribute`, always including `record` itself
fn gather_targets(record: &Record, attribute: &str) -> Vec<Record> {
    let Some(batch) = record.batch_context() else {
        return vec![record.clone()];
    };
    let siblings = batch.siblings_missing(attribute, None);
    if siblings.iter().any(|s| s.ptr_eq(record)) {
        siblings
    } else {
        vec![record.clone()]
    }
}

fn load_single(
    session: &Session,
    record: &Record,
    pk_name: &str,
    pk_value: Value,
    attribute: &str,
) -> Result<(), LazyError> {
    let entity = record.entity();
    let mut columns = vec![attribute.to_string()];
    if session.config().fetch_missing_together {
        columns.extend(
            entity
                .registered_lazy_attributes()
                .into_iter()
                .filter(|a| a != attribute && !record.is_considered(a)),
        );
    }

    let request = SelectRequest::new(entity.table())
        .columns(columns.iter().cloned())
        .filter(KeyFilter::Eq(pk_name.to_string(), pk_value))
        .limit(1);

    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::lazy_load_span(entity.table(), attribute, 1).entered();
    log::debug!("lazy load (single): {}", request.to_sql());

    let start = Instant::now();
    let rows = fetch(session, &request, "single")?;

    let mut hydrated = 0;
    let mut vanished = 0;
    match rows.into_iter().next() {
        Some(row) => {
            record.fill(&row, Some(pk_name));
            hydrated += 1;
        }
        None => log::warn!(
            "lazy load of {}.{attribute} matched no row; treating as absent",
            entity.table()
        ),
    }
    for column in &columns {
        if !record.has_value(column) {
            record.mark_vanished(column);
            vanished += 1;
        }
    }

    #[cfg(feature = "metrics")]
    METRICS.record_load("single", start.elapsed(), hydrated, vanished);
    #[cfg(not(feature = "metrics"))]
    let _ = (start, hydrated, vanished);

    Ok(())
}

fn load_batch(
    session: &Session,
    targets: &[Record],
    pk_name: &str,
    attribute: &str,
) -> Result<(), LazyError> {
    let entity = targets[0].entity();
    // Rows outside an identity scope may repeat a key; every holder is a target
    let mut by_key: HashMap<KeyValue, Vec<&Record>> = HashMap::with_capacity(targets.len());
    let mut keys: Vec<Value> = Vec::with_capacity(targets.len());
    for target in targets {
        let Some(pk_value) = target.primary_key() else {
            continue;
        };
        let Some(key) = KeyValue::from_value(&pk_value) else {
            continue;
        };
        let holders = by_key.entry(key).or_default();
        if holders.is_empty() {
            keys.push(pk_value);
        }
        holders.push(target);
    }

    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::lazy_load_span(entity.table(), attribute, keys.len()).entered();

    let chunk_size = session.config().batch_chunk_size.unwrap_or(keys.len()).max(1);
    let start = Instant::now();

    // Every chunk must succeed before any record is touched
    let mut fetched = Vec::new();
    for chunk in keys.chunks(chunk_size) {
        let request = SelectRequest::new(entity.table())
            .columns([pk_name, attribute])
            .filter(KeyFilter::In(pk_name.to_string(), chunk.to_vec()));
        log::debug!("lazy load (batch of {}): {}", chunk.len(), request.to_sql());
        fetched.extend(fetch(session, &request, "batch")?);
    }

    let hydrated: usize = fetched
        .iter()
        .map(|row| distribute(row, pk_name, attribute, &by_key))
        .sum();

    let mut vanished = 0;
    for target in by_key.values().flatten() {
        if !target.has_value(attribute) {
            log::warn!(
                "lazy load of {}.{attribute} found no row for {:?}; treating as absent",
                entity.table(),
                target.primary_key()
            );
            target.mark_vanished(attribute);
            vanished += 1;
        }
    }

    #[cfg(feature = "metrics")]
    METRICS.record_load("batch", start.elapsed(), hydrated, vanished);
    #[cfg(not(feature = "metrics"))]
    let _ = (start, hydrated, vanished);

    Ok(())
}

/// Merge one batch row into every target holding its key; returns records hydrated
fn distribute(
    row: &RawRow,
    pk_name: &str,
    attribute: &str,
    by_key: &HashMap<KeyValue, Vec<&Record>>,
) -> usize {
    let Some(holders) = row
        .get(pk_name)
        .and_then(KeyValue::from_value)
        .and_then(|key| by_key.get(&key))
    else {
        return 0;
    };
    let mut hydrated = 0;
    for target in holders.iter().filter(|t| !t.has_value(attribute)) {
        target.fill(row, Some(pk_name));
        hydrated += 1;
    }
    hydrated
}

fn fetch(session: &Session, request: &SelectRequest, mode: &'static str) -> Result<Vec<RawRow>, LazyError> {
    session.executor().execute_select(request).map_err(|e| {
        log::debug!("lazy load ({mode}) failed: {e}");
        #[cfg(feature = "metrics")]
        METRICS.record_error(mode);
        e
    })
}
