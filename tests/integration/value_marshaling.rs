#![allow(missing_docs)]

use std::sync::Arc;

use embedgraph::engine::memory::{Fixture, MemoryEngine};
use embedgraph::engine::{LogicalKind, RawInternalId, RawNode, RawValue};
use embedgraph::{params, Config, Database, Error, Value};
use serde_json::json;
use time::macros::{date, datetime};

const TYPED_ROW: &str = "MATCH (n) RETURN n.price, n.span, n.uid, n.seen, n.tags";
const UNION_ROW: &str = "MATCH (n) RETURN n.shape";
const NODE_ROW: &str = "MATCH (n:User) RETURN n";

fn typed_engine() -> Arc<MemoryEngine> {
    let engine = Arc::new(MemoryEngine::new());
    engine.respond(TYPED_ROW, |_| {
        Fixture::new(["n.price", "n.span", "n.uid", "n.seen", "n.tags"]).row(vec![
            RawValue::Decimal("12.50".to_string()),
            RawValue::Interval {
                months: 1,
                days: 2,
                micros: 3_000_000,
            },
            RawValue::Uuid("A0EEBC99-9C0B-4EF8-BB6D-6BB9BD380A11".to_string()),
            RawValue::TimestampMs(1_500),
            RawValue::Array(vec![RawValue::UInt8(1), RawValue::Null]),
        ])
    });
    engine.respond(UNION_ROW, |_| {
        Fixture::new(["n.shape"]).row(vec![RawValue::Union {
            tag: "circle".to_string(),
            value: Box::new(RawValue::Double(1.0)),
        }])
    });
    engine.respond(NODE_ROW, |_| {
        Fixture::new(["n"]).row(vec![RawValue::Node(RawNode {
            id: RawInternalId {
                table_id: 0,
                offset: 7,
            },
            label: "User".to_string(),
            properties: vec![
                ("name".to_string(), RawValue::String("Adam".to_string())),
                ("photo".to_string(), RawValue::Blob(vec![0xde, 0xad])),
            ],
        })])
    });
    engine
}

#[test]
fn engine_kinds_become_host_values() {
    let db = Database::open_with_engine(typed_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn.query(TYPED_ROW).expect("query");
    let tuple = result.next_tuple().unwrap().expect("row");

    assert_eq!(tuple.get("n.price"), Some(&Value::Float(12.5)));
    let span = 30.0 * 86_400.0 + 2.0 * 86_400.0 + 3.0;
    assert_eq!(tuple.get("n.span"), Some(&Value::Interval(span)));
    assert_eq!(
        tuple.get("n.uid"),
        Some(&Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"))
    );
    assert_eq!(
        tuple.get("n.seen"),
        Some(&Value::Timestamp(datetime!(1970-01-01 0:00:01.5 UTC)))
    );
    assert_eq!(
        tuple.get("n.tags"),
        Some(&Value::List(vec![Value::Int(1), Value::Null]))
    );
}

#[test]
fn unions_are_reported_as_unsupported() {
    let db = Database::open_with_engine(typed_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn.query(UNION_ROW).expect("query");
    assert!(result.is_success());
    let err = result.next_tuple().unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(LogicalKind::Union)));
    assert_eq!(err.to_string(), "unhandled value type: UNION");
}

#[test]
fn nodes_serialize_with_tagged_values() {
    let db = Database::open_with_engine(typed_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn.query(NODE_ROW).expect("query");
    let tuple = result.next_tuple().unwrap().expect("row");
    let node = tuple.get("n").and_then(Value::as_node).expect("node");
    assert_eq!(node.label(), "User");
    assert_eq!(node.id().to_string(), "0:7");
    assert_eq!(node.property("missing"), None);

    let encoded = serde_json::to_value(&tuple).expect("serialize");
    assert_eq!(
        encoded["n"]["v"]["properties"]["photo"],
        json!({"t": "Blob", "v": "3q0="})
    );
    assert_eq!(
        encoded["n"]["v"]["properties"]["name"],
        json!({"t": "String", "v": "Adam"})
    );
}

#[test]
fn temporal_literals_and_parameters_round_trip() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn
        .query("RETURN date('2022-06-06') AS d, timestamp('1970-01-01 00:00:01.5') AS ts")
        .expect("query");
    let tuple = result.next_tuple().unwrap().expect("row");
    assert_eq!(tuple.get("d"), Some(&Value::Date(date!(2022 - 06 - 06))));
    assert_eq!(
        tuple.get("ts"),
        Some(&Value::Timestamp(datetime!(1970-01-01 0:00:01.5 UTC)))
    );

    let mut stmt = conn
        .prepare("RETURN $day AS day, $at AS at, $bytes AS bytes, $big AS big")
        .expect("prepare");
    let echoed = stmt
        .execute(params![
            "day" => date!(1969 - 12 - 31),
            "at" => datetime!(2000-01-01 12:00 +2),
            "bytes" => vec![1u8, 2, 3],
            "big" => u64::MAX,
        ])
        .expect("execute");
    let tuple = echoed.next_tuple().unwrap().expect("row");
    assert_eq!(tuple.get("day"), Some(&Value::Date(date!(1969 - 12 - 31))));
    assert_eq!(
        tuple.get("at"),
        Some(&Value::Timestamp(datetime!(2000-01-01 10:00 UTC)))
    );
    assert_eq!(tuple.get("bytes"), Some(&Value::Blob(vec![1, 2, 3])));
    assert_eq!(tuple.get("big"), Some(&Value::Int(i128::from(u64::MAX))));
}

#[test]
fn graph_values_cannot_be_parameters() {
    let db = Database::open_with_engine(typed_engine(), None, Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let node = conn
        .query_with(NODE_ROW, |r| Ok(r.tuples()?[0].get("n").cloned().expect("node")))
        .expect("query");
    let mut stmt = conn.prepare("RETURN $n").expect("prepare");
    let err = stmt.execute(params!["n" => node]).unwrap_err();
    assert!(matches!(err, Error::ParameterType { .. }));
}
