//! Opening and closing stores.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::config::Config;
use crate::connection::Connection;
use crate::engine::{self, Engine, EngineConnection, EngineDatabase, SystemConfig};
use crate::error::{Error, Result};
use crate::result::{Issued, QueryResult};

/// Engine session shared between a [`Connection`] and the database that
/// made it, so closing the database can release it.
pub(crate) type Session = Arc<Mutex<Option<Box<dyn EngineConnection>>>>;

/// Path spelling that requests an in-memory store.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// An open store. Connections borrow it, so it outlives all of them.
///
/// The engine handle is released exactly once, by [`close`](Self::close) or
/// on drop. Closing first finishes every result and session made from the
/// database. After close, the database and every connection made from it
/// fail with [`Error::UseAfterClose`].
pub struct Database {
    engine: Arc<dyn Engine>,
    path: Option<PathBuf>,
    config: Config,
    system: SystemConfig,
    handle: RwLock<Option<Box<dyn EngineDatabase>>>,
    sessions: Mutex<Vec<Weak<Mutex<Option<Box<dyn EngineConnection>>>>>>,
    issued: Issued,
}

fn storage_path(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() || path == Path::new(IN_MEMORY_PATH) {
        None
    } else {
        Some(path.to_path_buf())
    }
}

impl Database {
    /// Opens or creates the store at `path` with the bundled engine. An empty
    /// path or `":memory:"` opens an in-memory store.
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        Self::open_with_engine(engine::default_engine(), storage_path(path.as_ref()), config)
    }

    /// Opens a fresh in-memory store with the bundled engine.
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::open_with_engine(engine::default_engine(), None, config)
    }

    /// Opens a store through an explicit engine. `None` requests an
    /// in-memory store.
    pub fn open_with_engine(
        engine: Arc<dyn Engine>,
        path: Option<PathBuf>,
        config: Config,
    ) -> Result<Self> {
        let system = config.resolve(&engine.default_system_config());
        let handle = engine
            .open(path.as_deref(), &system)
            .map_err(Error::EngineOpen)?;
        let shown = path.as_deref().unwrap_or(Path::new(IN_MEMORY_PATH));
        debug!(path = %shown.display(), read_only = system.read_only, "database.open");
        Ok(Self {
            engine,
            path,
            config,
            system,
            handle: RwLock::new(Some(handle)),
            sessions: Mutex::new(Vec::new()),
            issued: Issued::default(),
        })
    }

    /// Opens a new session. May be called any number of times.
    pub fn connect(&self) -> Result<Connection<'_>> {
        let session: Session = Arc::new(Mutex::new(Some(self.engine_connect()?)));
        {
            let mut sessions = self.sessions.lock();
            sessions.retain(|session| session.strong_count() > 0);
            sessions.push(Arc::downgrade(&session));
        }
        debug!("database.connect");
        Ok(Connection::new(self, session))
    }

    pub(crate) fn track(&self, result: &QueryResult) {
        self.issued.track(result);
    }

    fn engine_connect(&self) -> Result<Box<dyn EngineConnection>> {
        let handle = self.handle.read();
        let handle = handle.as_ref().ok_or(Error::UseAfterClose("database"))?;
        handle.connect().map_err(Error::Engine)
    }

    /// Finishes outstanding results, closes sessions, then releases the
    /// engine handle. Later calls are no-ops.
    pub fn close(&self) {
        let mut handle = self.handle.write();
        if handle.is_none() {
            return;
        }
        let released = self.issued.finish_all();
        let sessions = std::mem::take(&mut *self.sessions.lock());
        let closed = sessions
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|session| session.lock().take().is_some())
            .count();
        drop(handle.take());
        debug!(released, sessions = closed, "database.close");
    }

    /// Whether [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.handle.read().is_none()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::UseAfterClose("database"))
        } else {
            Ok(())
        }
    }

    /// Store location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the store lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Options as given by the caller.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Options in effect, with engine defaults filled in.
    pub fn system_config(&self) -> &SystemConfig {
        &self.system
    }

    /// Whether writes are refused.
    pub fn is_read_only(&self) -> bool {
        self.system.read_only
    }

    /// Whether the engine checkpoints on its own.
    pub fn is_auto_checkpointing(&self) -> bool {
        self.system.auto_checkpoint
    }

    /// Whether storage compression is on.
    pub fn is_compression_enabled(&self) -> bool {
        self.system.enable_compression
    }

    /// Version string of the engine behind this database.
    pub fn engine_version(&self) -> String {
        self.engine.version()
    }

    /// Storage format version the engine writes.
    pub fn storage_version(&self) -> u64 {
        self.engine.storage_version()
    }

    /// Whether `path` holds a store of the bundled engine. Opens nothing.
    pub fn is_database(path: impl AsRef<Path>) -> bool {
        engine::default_engine().is_valid_store(path.as_ref())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path().unwrap_or(Path::new(IN_MEMORY_PATH)))
            .field("read_only", &self.is_read_only())
            .field("closed", &self.is_closed())
            .finish()
    }
}
