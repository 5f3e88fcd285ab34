#![allow(missing_docs)]

use std::sync::Arc;

use embedgraph::engine::memory::{Fixture, MemoryEngine};
use embedgraph::engine::{RawInternalId, RawNode, RawRel, RawValue};
use embedgraph::{params, Config, Database, Error, Value};

const BY_AGE: &str = "MATCH (u:User) WHERE u.age > $min_age RETURN u.name, u.age";
const PATHS: &str = "MATCH p = (a:User)-[:Follows*1..2]->(b:User) RETURN p";

const USERS: &[(&str, i64)] = &[("Adam", 30), ("Karissa", 40), ("Zhang", 50), ("Noura", 25)];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn user(offset: u64, name: &str) -> RawValue {
    RawValue::Node(RawNode {
        id: RawInternalId { table_id: 0, offset },
        label: "User".to_string(),
        properties: vec![("name".to_string(), RawValue::String(name.to_string()))],
    })
}

fn follows(src: u64, dst: u64, since: i64) -> RawValue {
    RawValue::Rel(RawRel {
        src_id: RawInternalId { table_id: 0, offset: src },
        dst_id: RawInternalId { table_id: 0, offset: dst },
        label: "Follows".to_string(),
        properties: vec![("since".to_string(), RawValue::Int64(since))],
    })
}

fn graph_engine() -> Arc<MemoryEngine> {
    let engine = Arc::new(MemoryEngine::new());
    engine.respond(BY_AGE, |bindings| {
        let min_age = match bindings.get("min_age") {
            Some(RawValue::Int64(v)) => *v,
            _ => i64::MAX,
        };
        USERS
            .iter()
            .filter(|(_, age)| *age > min_age)
            .fold(Fixture::new(["u.name", "u.age"]), |fixture, (name, age)| {
                fixture.row(vec![RawValue::String(name.to_string()), RawValue::Int64(*age)])
            })
    });
    engine.respond(PATHS, |_| {
        Fixture::new(["p"])
            .row(vec![RawValue::RecursiveRel {
                nodes: vec![user(0, "Adam"), user(1, "Karissa")],
                rels: vec![follows(0, 1, 2020)],
            }])
            .row(vec![RawValue::RecursiveRel {
                nodes: vec![user(1, "Karissa"), user(2, "Zhang")],
                rels: vec![follows(1, 2, 2022)],
            }])
    });
    engine
}

#[test]
fn one_statement_serves_many_executions() {
    init_tracing();
    let db = Database::open_with_engine(graph_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let mut stmt = conn.prepare(BY_AGE).expect("prepare");
    assert!(stmt.is_success());
    assert_eq!(stmt.query(), BY_AGE);

    let older = stmt.execute(params!["min_age" => 30]).expect("execute");
    let names: Vec<String> = older
        .tuples()
        .unwrap()
        .iter()
        .filter_map(|t| t.get("u.name").and_then(Value::as_str).map(str::to_string))
        .collect();
    assert_eq!(names, ["Karissa", "Zhang"]);

    let younger = stmt.execute(params!["min_age" => 20]).expect("execute");
    assert_eq!(younger.tuples().unwrap().len(), 4);
    assert_eq!(older.tuples().unwrap().len(), 2);
    assert_eq!(stmt.bindings().get("min_age"), Some(&Value::Int(20)));
}

#[test]
fn unbound_parameters_yield_no_rows() {
    let db = Database::open_with_engine(graph_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let mut stmt = conn.prepare(BY_AGE).expect("prepare");
    let result = stmt.execute(params![]).expect("execute");
    assert!(result.is_success());
    assert_eq!(result.column_names().unwrap(), ["u.name", "u.age"]);
    assert!(result.tuples().unwrap().is_empty());

    let direct = conn.query(BY_AGE).expect("query");
    assert!(!direct.is_success());
    assert_eq!(
        direct.error_message(),
        Some("Binder exception: Parameter min_age not found.")
    );
}

#[test]
fn connection_execute_binds_then_runs() {
    let db = Database::open_with_engine(graph_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let mut stmt = conn.prepare(BY_AGE).expect("prepare");
    let rows = conn
        .execute(&mut stmt, params!["min_age" => 45])
        .expect("execute")
        .scoped(|result| Ok(result.tuples()?.len()))
        .expect("rows");
    assert_eq!(rows, 1);
}

#[test]
fn variable_length_paths_become_recursive_rels() {
    let db = Database::open_with_engine(graph_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn.query(PATHS).expect("query");
    let tuples = result.tuples().expect("tuples");
    assert_eq!(tuples.len(), 2);

    let path = tuples[1]
        .get("p")
        .and_then(Value::as_recursive_rel)
        .expect("path");
    assert_eq!(path.nodes().len(), 2);
    assert_eq!(path.rels().len(), 1);
    assert_eq!(path.len(), 1);
    assert_eq!(path.rels()[0].property("since"), Some(&Value::Int(2022)));
    assert_eq!(path.nodes()[1].property("name"), Some(&Value::from("Zhang")));
    assert_eq!(path.rels()[0].src_id(), path.nodes()[0].id());
    assert_eq!(path.rels()[0].dst_id().to_string(), "0:2");
}

#[test]
fn parameters_of_every_host_shape_bind() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let mut stmt = conn
        .prepare("RETURN $flag AS flag, $ratio AS ratio, $tags AS tags, $none AS none")
        .expect("prepare");
    let tags = Value::List(vec![Value::from("a"), Value::from("b")]);
    let result = stmt
        .execute(params![
            "flag" => true,
            "ratio" => 0.5,
            "tags" => tags.clone(),
            "none" => Value::Null,
        ])
        .expect("execute");
    let tuple = result.next_tuple().unwrap().expect("row");
    assert_eq!(tuple.get("flag"), Some(&Value::Bool(true)));
    assert_eq!(tuple.get("ratio"), Some(&Value::Float(0.5)));
    assert_eq!(tuple.get("tags"), Some(&tags));
    assert_eq!(tuple.get("none"), Some(&Value::Null));
}

#[test]
fn mixed_lists_are_rejected_at_bind_time() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let mut stmt = conn.prepare("RETURN $xs").expect("prepare");
    let mixed = Value::List(vec![Value::Int(1), Value::from("two")]);
    let err = stmt.bind(params!["xs" => mixed]).unwrap_err();
    assert!(matches!(err, Error::ParameterType { ref name, .. } if name == "xs"));
    assert!(stmt.bindings().is_empty());
}

#[test]
fn multi_statement_prepare_is_a_failed_statement() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let mut stmt = conn.prepare("RETURN 1; RETURN 2").expect("prepare");
    assert!(!stmt.is_success());
    assert_eq!(
        stmt.error_message(),
        Some("Connection Exception: We do not support prepare multiple statements.")
    );
    let result = stmt.execute(params![]).expect("execute");
    assert!(!result.is_success());
}
