#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use embedgraph::{database, is_database, Config, Database, Error, Value};
use serde_json::json;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup_dir(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn on_disk_store_is_created_then_recognized() {
    init_tracing();
    let (_dir, path) = setup_dir("social");
    assert!(!is_database(&path));

    let db = database(&path).expect("create");
    assert!(!db.is_in_memory());
    assert_eq!(db.path(), Some(path.as_path()));
    db.connect()
        .expect("connect")
        .run("CREATE NODE TABLE User(name STRING, PRIMARY KEY (name))")
        .expect("schema");
    db.close();
    assert!(is_database(&path));

    let reopened = database(&path).expect("reopen");
    let err = reopened
        .connect()
        .expect("connect")
        .run("CREATE NODE TABLE User(name STRING, PRIMARY KEY (name))")
        .unwrap_err();
    assert!(matches!(err, Error::Query { .. }));
}

#[test]
fn read_only_open_of_missing_store_fails() {
    let (_dir, path) = setup_dir("absent");
    let config = Config::from_options([("read_only", json!(true))]).expect("config");
    let err = Database::open(&path, config).unwrap_err();
    assert!(matches!(err, Error::EngineOpen(ref message) if message.contains("READ ONLY")));
    assert!(!path.exists());
}

#[test]
fn truthy_read_only_blocks_writes_on_disk() {
    let (_dir, path) = setup_dir("frozen");
    {
        let db = database(&path).expect("create");
        db.connect()
            .expect("connect")
            .run("CREATE NODE TABLE City(name STRING, PRIMARY KEY (name))")
            .expect("schema");
    }

    let config = Config::from_options([("read_only", json!("yes"))]).expect("config");
    let db = Database::open(&path, config).expect("open read-only");
    assert!(db.is_read_only());
    let conn = db.connect().expect("connect");
    let result = conn.query("CREATE NODE TABLE Town(name STRING, PRIMARY KEY (name))").expect("query");
    assert!(!result.is_success());
    assert_eq!(
        result.error_message(),
        Some("Connection exception: Cannot execute write operations in a read-only database!")
    );
    conn.run("RETURN 1").expect("reads still work");
}

#[test]
fn second_open_of_the_same_store_is_refused() {
    let (_dir, path) = setup_dir("locked");
    let first = database(&path).expect("open");
    let err = database(&path).unwrap_err();
    assert!(err.to_string().contains("Could not set lock"), "{err}");
    drop(first);
    database(&path).expect("open after release");
}

#[test]
fn closed_database_refuses_its_connections() {
    let db = database("").expect("open");
    assert!(db.is_in_memory());
    let conn = db.connect().expect("connect");
    db.close();
    assert!(matches!(db.connect(), Err(Error::UseAfterClose("database"))));
    assert!(matches!(conn.query("RETURN 1"), Err(Error::UseAfterClose(_))));
    db.close();
}

#[test]
fn config_flags_reach_the_database() {
    let base = Config::new().with_compression(false);
    let config = base
        .with([
            ("auto_checkpoint", json!(false)),
            ("max_num_threads", json!("2")),
            ("buffer_pool_size", json!(64 * 1024 * 1024)),
        ])
        .expect("config");
    assert_eq!(base.max_num_threads, None);

    let db = Database::in_memory(config).expect("open");
    assert!(!db.is_compression_enabled());
    assert!(!db.is_auto_checkpointing());
    assert_eq!(db.system_config().buffer_pool_size, 64 * 1024 * 1024);
    assert_eq!(db.connect().unwrap().max_threads_for_exec().unwrap(), 2);

    assert!(matches!(
        Config::from_options([("buffer_pool_size", json!(-1))]),
        Err(Error::InvalidOption { .. })
    ));
    assert!(matches!(
        Config::from_options([("page_size", json!(4096))]),
        Err(Error::InvalidOption { .. })
    ));
}

#[test]
fn config_file_round_trips_through_toml() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("embedgraph.toml");
    fs::write(
        &path,
        "[database]\nmax_num_threads = 3\nread_only = false\ncheckpoint_threshold = 1048576\n",
    )
    .expect("write");
    let config = Config::load(&path).expect("load");
    assert_eq!(config.max_num_threads, Some(3));
    assert_eq!(config.checkpoint_threshold, Some(1_048_576));

    let missing = Config::load(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(missing, Error::ConfigFile { .. }));
}

#[test]
fn versions_are_reported_without_a_store() {
    assert_eq!(embedgraph::engine_version(), embedgraph::VERSION);
    assert!(embedgraph::storage_version() >= 1);
    let db = Database::in_memory(Config::default()).expect("open");
    assert_eq!(db.engine_version(), embedgraph::engine_version());
    let one = db
        .connect()
        .unwrap()
        .query_with("RETURN 1 AS one", |r| Ok(r.next_tuple()?.expect("row")))
        .unwrap();
    assert_eq!(one.get("one"), Some(&Value::Int(1)));
}

#[test]
fn query_timeout_and_threads_are_per_connection() {
    let db = Database::in_memory(Config::default()).expect("open");
    let conn = db.connect().expect("connect");
    conn.set_query_timeout(std::time::Duration::from_secs(5))
        .expect("timeout");
    conn.set_max_threads_for_exec(1).expect("threads");
    assert_eq!(conn.max_threads_for_exec().unwrap(), 1);
    assert!(matches!(conn.set_max_threads_for_exec(0), Err(Error::Engine(_))));
    conn.run("RETURN 1").expect("run");

    conn.set_query_timeout(std::time::Duration::MAX).expect("unbounded");
    conn.run("CREATE NODE TABLE Tag(name STRING, PRIMARY KEY (name))")
        .expect("run");
}

#[test]
fn results_escaping_a_closed_database_are_finished() {
    let escaped = {
        let db = database(":memory:").expect("open");
        let conn = db.connect().expect("connect");
        let result = conn.query("RETURN 1 AS one; RETURN 2 AS two").expect("query");
        db.close();
        result
    };
    assert!(escaped.is_finished());
    assert!(escaped.is_success());
    assert!(matches!(escaped.tuples(), Err(Error::Finished)));
    assert!(matches!(escaped.next_set(), Err(Error::Finished)));
}

#[test]
fn dropped_connection_finishes_its_results() {
    let db = Database::in_memory(Config::default()).expect("open");
    let result = {
        let conn = db.connect().expect("connect");
        conn.query("RETURN 1 AS one").expect("query")
    };
    assert!(result.is_finished());
    assert!(matches!(result.next_tuple(), Err(Error::Finished)));
    db.connect().expect("connect").run("RETURN 1").expect("database still open");
}

#[test]
fn directory_with_foreign_files_is_not_a_store() {
    let (_dir, path) = setup_dir("cluttered");
    fs::create_dir_all(&path).expect("mkdir");
    fs::write(path.join("notes.txt"), "not a graph").expect("write");
    assert!(!is_database(&path));

    let err = database(&path).unwrap_err();
    assert!(
        matches!(err, Error::EngineOpen(ref message) if message.contains("not a valid database directory")),
        "{err}"
    );
    assert!(path.join("notes.txt").is_file());
    assert!(!path.join("catalog.kz").exists());
}

#[test]
fn store_from_another_storage_version_is_refused() {
    let (_dir, path) = setup_dir("legacy");
    fs::create_dir_all(&path).expect("mkdir");
    fs::write(
        path.join("catalog.kz"),
        json!({"storage_version": 99, "tables": []}).to_string(),
    )
    .expect("write");
    assert!(is_database(&path));

    let err = database(&path).unwrap_err();
    assert!(
        matches!(err, Error::EngineOpen(ref message) if message.contains("different version")),
        "{err}"
    );
    database(&path).unwrap_err();
}
