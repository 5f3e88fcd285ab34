//! Client bindings for an embedded graph-query engine.
//!
//! A [`Database`] owns an open store. [`Connection`]s run query text and
//! compile [`PreparedStatement`]s; both produce [`QueryResult`]s whose rows
//! come back as [`Tuple`]s of native [`Value`]s. The crate ships with an
//! in-process engine; other engines plug in through [`engine::Engine`].
//!
//! ```
//! use embedgraph::{Config, Database};
//!
//! let db = Database::in_memory(Config::default())?;
//! let conn = db.connect()?;
//! let result = conn.query("RETURN 1 AS one, 'two' AS two")?;
//! let row = result.next_tuple()?.expect("one row");
//! assert_eq!(row.get("one").and_then(|v| v.as_i64()), Some(1));
//! result.finish();
//! # Ok::<(), embedgraph::Error>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod database;
pub mod engine;
pub mod error;
pub mod result;
pub mod statement;
pub mod summary;
pub mod value;

use std::path::Path;

pub use config::Config;
pub use connection::Connection;
pub use database::Database;
pub use error::{Error, Result};
pub use result::{QueryResult, ResultSets, Tuples};
pub use statement::PreparedStatement;
pub use summary::QuerySummary;
pub use value::{Fields, InternalId, Node, RecursiveRel, Rel, Tuple, Value};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Opens `path` with default options. `""` and `":memory:"` open an
/// in-memory store.
pub fn database(path: impl AsRef<Path>) -> Result<Database> {
    Database::open(path, Config::default())
}

/// Whether `path` holds a store of the bundled engine.
pub fn is_database(path: impl AsRef<Path>) -> bool {
    Database::is_database(path)
}

/// Version string reported by the bundled engine.
pub fn engine_version() -> String {
    engine::default_engine().version()
}

/// Storage format version of the bundled engine.
pub fn storage_version() -> u64 {
    engine::default_engine().storage_version()
}
