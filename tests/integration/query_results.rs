#![allow(missing_docs)]

use embedgraph::{database, Config, Database, Error, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const SCHEMA: &str = "CREATE NODE TABLE User(name STRING, age INT64, PRIMARY KEY (name));
CREATE REL TABLE Follows(FROM User TO User, since INT64);";

fn single_value(result: &embedgraph::QueryResult) -> (String, Value) {
    let tuples = result.tuples().expect("tuples");
    assert_eq!(tuples.len(), 1);
    let tuple = &tuples[0];
    assert_eq!(tuple.len(), 1);
    let (name, value) = tuple.iter().next().expect("one column");
    (name.to_string(), value.clone())
}

#[test]
fn script_sets_arrive_in_statement_order() {
    init_tracing();
    let db = database(":memory:").expect("open");
    let conn = db.connect().expect("connect");
    conn.run(SCHEMA).expect("schema");

    let first = conn.query("RETURN 1; RETURN 2; RETURN 3;").expect("query");
    assert!(first.has_next_set().unwrap());
    let second = first.next_set().unwrap().expect("second");
    let third = second.next_set().unwrap().expect("third");
    assert!(!third.has_next_set().unwrap());
    assert!(third.next_set().unwrap().is_none());

    assert_eq!(single_value(&first), ("1".to_string(), Value::Int(1)));
    assert_eq!(single_value(&second), ("2".to_string(), Value::Int(2)));
    assert_eq!(single_value(&third), ("3".to_string(), Value::Int(3)));
    first.finish();
}

#[test]
fn finishing_the_root_finishes_every_fetched_set() {
    init_tracing();
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let root = conn.query("RETURN 1; RETURN 2").expect("query");
    let second = root.next_set().unwrap().expect("second");

    root.finish();
    root.finish();
    assert!(second.is_finished());
    assert!(matches!(second.next_tuple(), Err(Error::Finished)));
    assert!(matches!(root.column_names(), Err(Error::Finished)));
    assert!(matches!(root.each(), Err(Error::Finished)));
    assert!(root.is_success());
}

#[test]
fn tuples_repeat_while_each_drains_once() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");

    let memo = conn.query("RETURN 'a' AS x").expect("query");
    let once = memo.tuples().unwrap().to_vec();
    assert_eq!(memo.tuples().unwrap(), &once[..]);
    assert_eq!(memo.get(0).unwrap().and_then(|t| t.get("x")), Some(&Value::from("a")));

    let stream = conn.query("RETURN 'a' AS x").expect("query");
    let rows: Vec<_> = stream.each().unwrap().collect::<embedgraph::Result<_>>().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(stream.each().unwrap().count(), 0);
}

#[test]
fn failed_statements_degrade_in_query_and_raise_in_run() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    conn.run(SCHEMA).expect("schema");

    let result = conn
        .query("CREATE NODE TABLE User(name STRING, PRIMARY KEY (name))")
        .expect("query");
    assert!(!result.is_success());
    assert_eq!(
        result.error_message(),
        Some("Binder exception: User already exists in catalog.")
    );
    assert!(matches!(result.ensure_success(), Err(Error::Query { .. })));

    let empty = conn.query("  ").expect("query");
    assert!(!empty.is_success());

    let err = conn.run("DROP TABLE Missing").unwrap_err();
    assert_eq!(err.to_string(), "Binder exception: Table Missing does not exist.");
}

#[test]
fn schema_statements_acknowledge_with_a_message() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn
        .query("CREATE NODE TABLE City(name STRING, PRIMARY KEY (name))")
        .expect("query");
    assert_eq!(result.column_names().unwrap(), ["result".to_string()]);
    let tuple = result.next_tuple().unwrap().expect("row");
    assert_eq!(tuple.get("result"), Some(&Value::from("Table City has been created.")));
}

#[test]
fn struct_literals_keep_field_order() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let value = conn
        .query_with("RETURN {name: 'Alice', age: 30} AS s", |result| {
            let tuple = result.next_tuple()?.expect("row");
            Ok(tuple.get("s").cloned().expect("column"))
        })
        .expect("query");
    let fields = value.as_struct().expect("struct");
    assert_eq!(fields.keys().collect::<Vec<_>>(), ["name", "age"]);
    assert_eq!(fields.get("age"), Some(&Value::Int(30)));
    assert_eq!(value.to_string(), "{name: Alice, age: 30}");
}

#[test]
fn summary_is_available_until_finish() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let result = conn.query("RETURN [1, 2, 3] AS xs").expect("query");
    let summary = result.query_summary().expect("summary");
    assert!(summary.compiling_time() >= 0.0);
    assert!(summary.execution_time() >= 0.0);
    assert_eq!(summary.total_time(), summary.compiling_time() + summary.execution_time());
    assert_eq!(result.num_tuples().unwrap(), 1);
    assert_eq!(result.render().unwrap(), "xs\n[1,2,3]\n");
    result.finish();
    assert!(matches!(result.query_summary(), Err(Error::Finished)));
}

#[test]
fn scoped_results_finish_after_a_panic() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    let root = conn.query("RETURN 1; RETURN 2").expect("query");
    let second = root.next_set().unwrap().expect("second");

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: embedgraph::Result<()> = root.scoped(|_| panic!("caller failed"));
    }));
    assert!(outcome.is_err());
    assert!(second.is_finished());
}
