//! In-process engine bundled with the crate.
//!
//! The memory engine keeps a table catalog, evaluates literal `RETURN`
//! projections and acknowledges schema and write statements. Statements that
//! need graph data are answered by responders registered with
//! [`MemoryEngine::respond`]. On-disk stores are directories holding a JSON
//! catalog file.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{
    Engine, EngineConnection, EngineCursor, EngineDatabase, EnginePlan, EngineResult,
    EngineSummary, RawValue, SystemConfig,
};

mod cursor;
mod literal;
mod script;

use cursor::{MemoryCursor, MemoryPlan, MemorySet};
use script::{Statement, TableKind};

/// File that marks a directory as a memory engine store.
pub const CATALOG_FILE: &str = "catalog.kz";

/// On-disk format version written into the catalog.
pub const STORAGE_VERSION: u64 = 1;

/// Parameters bound to a statement, by name.
pub type Bindings = BTreeMap<String, RawValue>;

const READ_ONLY_WRITE: &str =
    "Connection exception: Cannot execute write operations in a read-only database!";

const INTERRUPTED: &str = "Interrupted.";

/// Rows handed back by a responder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fixture {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl Fixture {
    /// Empty answer with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Rows shorter or longer than the column list are padded
    /// with nulls or truncated.
    pub fn row(mut self, mut values: Vec<RawValue>) -> Self {
        values.resize(self.columns.len(), RawValue::Null);
        self.rows.push(values);
        self
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }
}

type Responder = Arc<dyn Fn(&Bindings) -> Fixture + Send + Sync>;
type Responders = Arc<RwLock<HashMap<String, Responder>>>;

/// The bundled engine. Cheap to construct; each instance has its own
/// responders and its own registry of locked store paths.
#[derive(Default)]
pub struct MemoryEngine {
    responders: Responders,
    locks: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MemoryEngine {
    /// Engine with no responders and no open stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `responder` as the answer to `statement`. Matching ignores
    /// whitespace layout and a trailing semicolon. Re-registering replaces the
    /// previous responder.
    pub fn respond<F>(&self, statement: &str, responder: F)
    where
        F: Fn(&Bindings) -> Fixture + Send + Sync + 'static,
    {
        self.responders
            .write()
            .insert(script::normalize(statement), Arc::new(responder));
    }

    fn open_dir(&self, path: &Path, config: &SystemConfig) -> EngineResult<Catalog> {
        if path.exists() {
            if self.is_valid_store(path) {
                let catalog = Catalog::load(path)?;
                if catalog.storage_version != STORAGE_VERSION {
                    return Err(
                        "Runtime exception: Trying to read a database file with a different version."
                            .to_string(),
                    );
                }
                return Ok(catalog);
            }
            let empty_dir = fs::read_dir(path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty_dir {
                return Err(format!(
                    "Runtime exception: {} is not a valid database directory.",
                    path.display()
                ));
            }
            if config.read_only {
                return Err(
                    "Runtime exception: Cannot create an empty database under READ ONLY mode."
                        .to_string(),
                );
            }
        } else if config.read_only {
            return Err(
                "Runtime exception: Cannot create an empty database under READ ONLY mode."
                    .to_string(),
            );
        }
        fs::create_dir_all(path).map_err(|err| format!("IO exception: {err}"))?;
        let catalog = Catalog::default();
        catalog.persist(path)?;
        Ok(catalog)
    }
}

impl Engine for MemoryEngine {
    fn open(
        &self,
        path: Option<&Path>,
        config: &SystemConfig,
    ) -> EngineResult<Box<dyn EngineDatabase>> {
        let Some(path) = path else {
            if config.read_only {
                return Err(
                    "Runtime exception: Cannot open an in-memory database under READ ONLY mode."
                        .to_string(),
                );
            }
            debug!("memory_engine.open_in_memory");
            return Ok(Box::new(MemoryDatabase {
                store: Arc::new(Store::new(None, config.clone(), Catalog::default(), self)),
                locks: self.locks.clone(),
                lock_key: None,
            }));
        };

        let catalog = self.open_dir(path, config)?;
        let lock_key = fs::canonicalize(path).map_err(|err| format!("IO exception: {err}"))?;
        if !self.locks.lock().insert(lock_key.clone()) {
            return Err(format!(
                "IO exception: Could not set lock on file : {}",
                path.display()
            ));
        }
        debug!(path = %path.display(), tables = catalog.tables.len(), "memory_engine.open");
        Ok(Box::new(MemoryDatabase {
            store: Arc::new(Store::new(
                Some(path.to_path_buf()),
                config.clone(),
                catalog,
                self,
            )),
            locks: self.locks.clone(),
            lock_key: Some(lock_key),
        }))
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn storage_version(&self) -> u64 {
        STORAGE_VERSION
    }

    fn is_valid_store(&self, path: &Path) -> bool {
        path.join(CATALOG_FILE).is_file()
    }

    fn default_system_config(&self) -> SystemConfig {
        SystemConfig {
            buffer_pool_size: 0,
            max_num_threads: 0,
            enable_compression: true,
            read_only: false,
            max_db_size: 1 << 43,
            auto_checkpoint: true,
            checkpoint_threshold: 16 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TableEntry {
    name: String,
    kind: TableKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Catalog {
    storage_version: u64,
    tables: Vec<TableEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            storage_version: STORAGE_VERSION,
            tables: Vec::new(),
        }
    }
}

impl Catalog {
    fn load(dir: &Path) -> EngineResult<Self> {
        let bytes =
            fs::read(dir.join(CATALOG_FILE)).map_err(|err| format!("IO exception: {err}"))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| format!("Runtime exception: corrupt catalog: {err}"))
    }

    fn persist(&self, dir: &Path) -> EngineResult<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| format!("Runtime exception: {err}"))?;
        fs::write(dir.join(CATALOG_FILE), bytes).map_err(|err| format!("IO exception: {err}"))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// State shared by a database handle and its sessions.
struct Store {
    path: Option<PathBuf>,
    config: SystemConfig,
    catalog: Mutex<Catalog>,
    responders: Responders,
}

impl Store {
    fn new(
        path: Option<PathBuf>,
        config: SystemConfig,
        catalog: Catalog,
        engine: &MemoryEngine,
    ) -> Self {
        Self {
            path,
            config,
            catalog: Mutex::new(catalog),
            responders: engine.responders.clone(),
        }
    }

    fn responder(&self, statement: &str) -> Option<Responder> {
        self.responders
            .read()
            .get(&script::normalize(statement))
            .cloned()
    }

    fn update_catalog(
        &self,
        apply: impl FnOnce(&mut Catalog) -> EngineResult<String>,
    ) -> EngineResult<String> {
        let mut catalog = self.catalog.lock();
        let mut next = catalog.clone();
        let message = apply(&mut next)?;
        if let Some(dir) = &self.path {
            next.persist(dir)?;
        }
        *catalog = next;
        Ok(message)
    }

    /// Runs one statement. Unbound parameters in a prepared statement yield
    /// the statement's columns with no rows.
    ///
    /// Past `deadline` nothing is applied and the statement is interrupted. A
    /// write that starts in time is committed even if it ends late; only
    /// reads that overrun are reported as interrupted.
    fn run(
        &self,
        stmt: &str,
        bindings: &Bindings,
        prepared: bool,
        deadline: Option<Instant>,
    ) -> MemorySet {
        let expired = || deadline.is_some_and(|deadline| Instant::now() >= deadline);
        let compile_start = Instant::now();
        let parsed = script::parse(stmt);
        let writes = parsed.as_ref().is_ok_and(Statement::writes);
        let responder = self.responder(stmt);
        let referenced = script::parameters(stmt);
        let compiling_ms = elapsed_ms(compile_start);

        let exec_start = Instant::now();
        let outcome = if expired() {
            Err(INTERRUPTED.to_string())
        } else {
            match self.evaluate(stmt, parsed, responder, &referenced, bindings, prepared) {
                Ok(_) if !writes && expired() => Err(INTERRUPTED.to_string()),
                outcome => outcome,
            }
        };
        let summary = EngineSummary {
            compiling_ms,
            execution_ms: elapsed_ms(exec_start),
        };
        match outcome {
            Ok((columns, rows)) => MemorySet {
                error: None,
                columns,
                rows,
                summary,
            },
            Err(message) => MemorySet::failure(message, summary),
        }
    }

    fn evaluate(
        &self,
        stmt: &str,
        parsed: Result<Statement, String>,
        responder: Option<Responder>,
        referenced: &std::collections::BTreeSet<String>,
        bindings: &Bindings,
        prepared: bool,
    ) -> EngineResult<(Vec<String>, Vec<Vec<RawValue>>)> {
        let unbound = referenced.iter().find(|name| !bindings.contains_key(*name));
        if let (Some(name), false) = (unbound, prepared) {
            return Err(format!("Binder exception: Parameter {name} not found."));
        }
        let fully_bound = unbound.is_none();

        if let Some(responder) = responder {
            if self.config.read_only && parsed.as_ref().is_ok_and(Statement::writes) {
                return Err(READ_ONLY_WRITE.to_string());
            }
            let fixture = responder(bindings);
            let rows = if fully_bound { fixture.rows } else { Vec::new() };
            return Ok((fixture.columns, rows));
        }

        let statement = parsed?;
        if self.config.read_only && statement.writes() {
            return Err(READ_ONLY_WRITE.to_string());
        }
        match statement {
            Statement::Return(items) => {
                let columns = items.iter().map(|item| item.name.clone()).collect();
                if !fully_bound {
                    return Ok((columns, Vec::new()));
                }
                let row = items
                    .iter()
                    .map(|item| item.expr.eval(bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((columns, vec![row]))
            }
            Statement::CreateTable { kind, name } => self
                .update_catalog(|catalog| {
                    if catalog.position(&name).is_some() {
                        return Err(format!("Binder exception: {name} already exists in catalog."));
                    }
                    catalog.tables.push(TableEntry {
                        name: name.clone(),
                        kind,
                    });
                    Ok(format!("Table {name} has been created."))
                })
                .map(acknowledge),
            Statement::DropTable { name } => self
                .update_catalog(|catalog| {
                    let idx = catalog
                        .position(&name)
                        .ok_or_else(|| format!("Binder exception: Table {name} does not exist."))?;
                    catalog.tables.remove(idx);
                    Ok(format!("Table: {name} has been dropped."))
                })
                .map(acknowledge),
            Statement::Copy { name } => {
                if self.catalog.lock().position(&name).is_none() {
                    return Err(format!("Binder exception: Table {name} does not exist."));
                }
                Ok(acknowledge(format!(
                    "0 tuples have been copied to the {name} table."
                )))
            }
            Statement::Write | Statement::Transaction => Ok((Vec::new(), Vec::new())),
            Statement::Read { .. } => Err(format!(
                "Binder exception: No data is available to answer query: {stmt}"
            )),
        }
    }
}

fn acknowledge(message: String) -> (Vec<String>, Vec<Vec<RawValue>>) {
    (
        vec!["result".to_string()],
        vec![vec![RawValue::String(message)]],
    )
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

struct MemoryDatabase {
    store: Arc<Store>,
    locks: Arc<Mutex<HashSet<PathBuf>>>,
    lock_key: Option<PathBuf>,
}

impl EngineDatabase for MemoryDatabase {
    fn connect(&self) -> EngineResult<Box<dyn EngineConnection>> {
        let max_threads = match self.store.config.max_num_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get() as u64)
                .unwrap_or(1),
            n => n,
        };
        Ok(Box::new(MemoryConnection {
            store: self.store.clone(),
            max_threads,
            timeout_ms: 0,
        }))
    }
}

impl Drop for MemoryDatabase {
    fn drop(&mut self) {
        if let Some(key) = self.lock_key.take() {
            self.locks.lock().remove(&key);
            debug!(path = %key.display(), "memory_engine.release");
        }
    }
}

struct MemoryConnection {
    store: Arc<Store>,
    max_threads: u64,
    timeout_ms: u64,
}

impl MemoryConnection {
    /// Zero timeout means no deadline, as does one too far out to represent.
    fn deadline(&self) -> Option<Instant> {
        match self.timeout_ms {
            0 => None,
            ms => Instant::now().checked_add(Duration::from_millis(ms)),
        }
    }
}

impl EngineConnection for MemoryConnection {
    fn query(&mut self, text: &str) -> Box<dyn EngineCursor> {
        let statements = script::split(text);
        if statements.is_empty() {
            return MemoryCursor::chain(VecDeque::from(vec![MemorySet::failure(
                "Connection Exception: Query is empty.".to_string(),
                EngineSummary::default(),
            )]));
        }
        let empty = Bindings::new();
        let deadline = self.deadline();
        let mut sets = VecDeque::with_capacity(statements.len());
        for stmt in statements {
            let set = self.store.run(stmt, &empty, false, deadline);
            let failed = set.error.is_some();
            sets.push_back(set);
            if failed {
                break;
            }
        }
        MemoryCursor::chain(sets)
    }

    fn prepare(&mut self, text: &str) -> Box<dyn EnginePlan> {
        let statements = script::split(text);
        let plan = match statements.as_slice() {
            [] => MemoryPlan::failed(
                String::new(),
                "Connection Exception: Query is empty.".to_string(),
            ),
            [stmt] => {
                let has_responder = self.store.responder(stmt).is_some();
                match script::parse(stmt) {
                    Err(message) if !has_responder => MemoryPlan::failed(stmt.to_string(), message),
                    _ => MemoryPlan {
                        statement: stmt.to_string(),
                        error: None,
                        parameters: script::parameters(stmt),
                        bindings: Bindings::new(),
                    },
                }
            }
            _ => MemoryPlan::failed(
                text.to_string(),
                "Connection Exception: We do not support prepare multiple statements.".to_string(),
            ),
        };
        Box::new(plan)
    }

    fn execute(&mut self, plan: &dyn EnginePlan) -> Box<dyn EngineCursor> {
        let set = match plan.as_any().downcast_ref::<MemoryPlan>() {
            Some(MemoryPlan {
                error: Some(message),
                ..
            }) => MemorySet::failure(message.clone(), EngineSummary::default()),
            Some(plan) => self
                .store
                .run(&plan.statement, &plan.bindings, true, self.deadline()),
            None => MemorySet::failure(
                "Runtime exception: plan was not prepared by this engine.".to_string(),
                EngineSummary::default(),
            ),
        };
        MemoryCursor::chain(VecDeque::from(vec![set]))
    }

    fn max_threads_for_exec(&self) -> u64 {
        self.max_threads
    }

    fn set_max_threads_for_exec(&mut self, threads: u64) -> EngineResult<()> {
        if threads == 0 {
            return Err(
                "Connection exception: Max number of threads must be greater than 0.".to_string(),
            );
        }
        self.max_threads = threads;
        Ok(())
    }

    fn set_query_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }
}
