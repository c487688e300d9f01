//! End-to-end lazy attribute behavior against an in-memory executor.
//!
//! Entity `la` has columns `id` and `name`, with `name` lazy. The executor
//! records every request so each test can assert exactly which follow-up
//! queries were issued.

use lifeguard_lazy::{
    ColumnType, Entity, EntitySchema, JsonColumn, KeyFilter, LazyError, Projection, RawRow,
    RowExecutor, SelectRequest, Session,
};
use sea_query::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ============================================================================
// Test executor
// ============================================================================

struct RecordingExecutor {
    rows: Vec<RawRow>,
    requests: RefCell<Vec<SelectRequest>>,
}

impl RecordingExecutor {
    fn new(rows: Vec<RawRow>) -> Rc<Self> {
        Rc::new(Self {
            rows,
            requests: RefCell::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<SelectRequest> {
        self.requests.borrow().clone()
    }

    fn reset(&self) {
        self.requests.borrow_mut().clear();
    }
}

fn key_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int(Some(i)) => Some(*i as i64),
        Value::BigInt(Some(i)) => Some(*i),
        _ => None,
    }
}

impl RowExecutor for RecordingExecutor {
    fn execute_select(&self, request: &SelectRequest) -> Result<Vec<RawRow>, LazyError> {
        self.requests.borrow_mut().push(request.clone());
        let limit = request.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                let id = row.get("id").and_then(key_of);
                request.filters.iter().all(|f| match f {
                    KeyFilter::Eq(_, v) => id.is_some() && id == key_of(v),
                    KeyFilter::In(_, vs) => id.is_some() && vs.iter().any(|v| key_of(v) == id),
                })
            })
            .take(limit)
            .map(|row| {
                if request.columns.is_empty() {
                    row.clone()
                } else {
                    request
                        .columns
                        .iter()
                        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                        .collect()
                }
            })
            .collect())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn row(id: i64, name: &str) -> RawRow {
    RawRow::from([
        ("id".to_string(), Value::from(id)),
        ("name".to_string(), Value::from(name)),
    ])
}

fn values(pairs: &[(&str, Value)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn la() -> Entity {
    let la = Entity::new(
        EntitySchema::new("la")
            .column("id", ColumnType::Integer)
            .column("name", ColumnType::Text)
            .primary_key("id"),
    )
    .unwrap();
    la.lazy_attributes(["name"]).unwrap();
    la
}

fn setup(rows: Vec<RawRow>) -> (Entity, Rc<RecordingExecutor>, Session) {
    let executor = RecordingExecutor::new(rows);
    let session = Session::new(Rc::clone(&executor));
    (la(), executor, session)
}

fn single_request(id: i64) -> SelectRequest {
    SelectRequest::new("la")
        .columns(["name"])
        .filter(KeyFilter::Eq("id".into(), Value::from(id)))
        .limit(1)
}

fn batch_request(ids: &[i64]) -> SelectRequest {
    SelectRequest::new("la")
        .columns(["id", "name"])
        .filter(KeyFilter::In(
            "id".into(),
            ids.iter().map(|i| Value::from(*i)).collect(),
        ))
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn test_lazy_columns_removed_from_default_select() {
    let la = la();
    assert_eq!(la.projection(), Projection::columns(["id"]));
    assert_eq!(la.default_request(), SelectRequest::new("la").columns(["id"]));
    assert!(!la.default_sql().contains("name"));
}

#[test]
fn test_additional_lazy_attributes_after_explicit_projection() {
    let la = la();
    la.set_projection(Projection::columns(["id", "blah"]));
    assert_eq!(la.default_request().columns, vec!["id", "blah"]);

    la.lazy_attributes(["blah"]).unwrap();
    assert_eq!(la.projection(), Projection::columns(["id"]));
    assert_eq!(la.registered_lazy_attributes(), vec!["name", "blah"]);
}

#[test]
fn test_unknown_lazy_column_is_a_configuration_error() {
    let err = la().lazy_attributes(["missing"]).unwrap_err();
    assert!(matches!(err, LazyError::Configuration(_)));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_setter_typecasts_on_lazy_column() {
    let (la, executor, _session) = setup(vec![]);
    let m = la.new_record();
    m.set("name", 1i32).unwrap();
    assert_eq!(m.get("name").unwrap(), Some(Value::from("1")));
    assert!(executor.requests().is_empty());
}

#[test]
fn test_single_record_loads_inside_identity_scope() {
    let (la, executor, session) = setup(vec![row(1, "1"), row(2, "2")]);
    session.with_identity_map(|| {
        let m = la.find().first(&session).unwrap().unwrap();
        assert_eq!(m.values(), values(&[("id", Value::from(1i64))]));
        assert_eq!(m.get("name").unwrap(), Some(Value::from("1")));
        assert_eq!(
            m.values(),
            values(&[("id", Value::from(1i64)), ("name", Value::from("1"))])
        );
    });
    assert_eq!(
        executor.requests(),
        vec![SelectRequest::new("la").columns(["id"]).limit(1), single_request(1)]
    );
}

#[test]
fn test_single_record_loads_without_identity_scope() {
    let (la, executor, session) = setup(vec![row(1, "1"), row(2, "2")]);
    let m = la.find().first(&session).unwrap().unwrap();
    assert_eq!(m.get("name").unwrap(), Some(Value::from("1")));
    assert_eq!(m.get("name").unwrap(), Some(Value::from("1")));
    assert_eq!(executor.requests().len(), 2);
    assert_eq!(executor.requests()[1], single_request(1));
}

#[test]
fn test_existing_value_is_not_reloaded() {
    let (la, executor, session) = setup(vec![row(1, "1")]);
    session.with_identity_map(|| {
        let m = la.find().first(&session).unwrap().unwrap();
        m.set("name", "1").unwrap();
        assert_eq!(m.get("name").unwrap(), Some(Value::from("1")));
    });
    assert_eq!(executor.requests().len(), 1);
}

#[test]
fn test_new_record_does_not_load() {
    let (la, executor, session) = setup(vec![row(1, "1")]);
    session.with_identity_map(|| {
        let m = la.new_record();
        assert!(m.values().is_empty());
        assert_eq!(m.get("name").unwrap(), None);
    });
    assert!(executor.requests().is_empty());
}

#[test]
fn test_batch_loads_every_record_retrieved_together() {
    let (la, executor, session) = setup(vec![row(1, "1"), row(2, "2")]);
    session.with_identity_map(|| {
        let ms = la.find().all(&session).unwrap();
        assert_eq!(
            ms.iter().map(|m| m.values()).collect::<Vec<_>>(),
            vec![
                values(&[("id", Value::from(1i64))]),
                values(&[("id", Value::from(2i64))]),
            ]
        );
        let names: Vec<_> = ms.iter().map(|m| m.get("name").unwrap()).collect();
        assert_eq!(names, vec![Some(Value::from("1")), Some(Value::from("2"))]);
        assert!(ms.iter().all(|m| m.has_value("name")));
    });
    assert_eq!(
        executor.requests(),
        vec![SelectRequest::new("la").columns(["id"]), batch_request(&[1, 2])]
    );
}

#[test]
fn test_identity_scope_links_separate_retrievals() {
    let (la, executor, session) = setup(vec![row(1, "1"), row(2, "2"), row(3, "3")]);
    session.with_identity_map(|| {
        let a = la.find().find_by_pk(1i64, &session).unwrap().unwrap();
        let b = la.find().find_by_pk(3i64, &session).unwrap().unwrap();
        executor.reset();

        assert_eq!(b.get("name").unwrap(), Some(Value::from("3")));
        assert_eq!(a.raw("name"), Some(Value::from("1")));
    });
    assert_eq!(executor.requests(), vec![batch_request(&[1, 3])]);
}

#[test]
fn test_identity_scope_returns_the_same_record() {
    let (la, _executor, session) = setup(vec![row(1, "1"), row(2, "2")]);
    session.with_identity_map(|| {
        let all = la.find().all(&session).unwrap();
        let again = la.find().find_by_pk(2i64, &session).unwrap().unwrap();
        assert!(all[1].ptr_eq(&again));
        assert_eq!(session.identity_map().unwrap().len(), 2);
    });
    assert!(!session.is_identity_scope_active());
}

#[test]
fn test_batch_context_ends_with_identity_scope() {
    let (la, executor, session) = setup(vec![row(1, "1"), row(2, "2")]);
    let ms = session.with_identity_map(|| la.find().all(&session).unwrap());
    executor.reset();

    assert_eq!(ms[0].get("name").unwrap(), Some(Value::from("1")));
    assert_eq!(executor.requests(), vec![single_request(1)]);
}

#[test]
fn test_nested_scope_joins_outer_scope() {
    let (la, _executor, session) = setup(vec![row(1, "1")]);
    let outer = session.identity_scope();
    {
        let _inner = session.identity_scope();
        la.find().all(&session).unwrap();
    }
    assert!(session.is_identity_scope_active());
    assert_eq!(outer.identity_map().unwrap().len(), 1);
    drop(outer);
    assert!(!session.is_identity_scope_active());
}

// ============================================================================
// Accessor overrides and transforms
// ============================================================================

#[test]
fn test_overridden_accessor_can_delegate_to_lazy_load() {
    let (la, executor, session) = setup(vec![row(1, "1"), row(2, "2")]);
    la.define_accessor("name", |_record, sup| {
        Ok(sup.call()?.map(|v| match v {
            Value::String(Some(s)) => Value::from(format!("{s}-blah")),
            other => other,
        }))
    });
    session.with_identity_map(|| {
        let ms = la.find().all(&session).unwrap();
        let names: Vec<_> = ms.iter().map(|m| m.get("name").unwrap()).collect();
        assert_eq!(
            names,
            vec![Some(Value::from("1-blah")), Some(Value::from("2-blah"))]
        );
        assert_eq!(ms[0].raw("name"), Some(Value::from("1")));
        assert_eq!(ms[1].raw("name"), Some(Value::from("2")));
    });
    assert_eq!(executor.requests().len(), 2);
    assert_eq!(executor.requests()[1], batch_request(&[1, 2]));
}

#[test]
fn test_json_transform_sees_lazily_loaded_values() {
    let (la, executor, session) = setup(vec![row(1, "3"), row(2, "6")]);
    la.serialize_column("name", JsonColumn).unwrap();

    session.with_identity_map(|| {
        let ms = la.find().all(&session).unwrap();
        let names: Vec<_> = ms.iter().map(|m| m.get("name").unwrap()).collect();
        assert_eq!(names, vec![Some(Value::from(3i64)), Some(Value::from(6i64))]);
        assert_eq!(ms[0].raw("name"), Some(Value::from("3")));
        assert_eq!(ms[1].decoded_values().get("name"), Some(&Value::from(6i64)));
        assert_eq!(ms[1].get("name").unwrap(), Some(Value::from(6i64)));
    });
    assert_eq!(executor.requests()[1], batch_request(&[1, 2]));

    executor.reset();
    session.with_identity_map(|| {
        let m = la.find().first(&session).unwrap().unwrap();
        assert_eq!(m.get("name").unwrap(), Some(Value::from(3i64)));
        assert_eq!(m.raw("name"), Some(Value::from("3")));
    });
    assert_eq!(executor.requests()[1], single_request(1));
}

#[test]
fn test_transform_runs_once_per_raw_value() {
    let (la, _executor, session) = setup(vec![row(1, "a")]);
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    la.serialize_column("name", move |_: &str, raw: &Value| -> Result<Value, LazyError> {
        seen.set(seen.get() + 1);
        Ok(raw.clone())
    })
    .unwrap();

    let m = la.find().first(&session).unwrap().unwrap();
    m.get("name").unwrap();
    m.get("name").unwrap();
    m.get("name").unwrap();
    assert_eq!(calls.get(), 1);
}
