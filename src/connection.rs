//! Sessions on an open database.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::database::{Database, Session};
use crate::engine::{EngineConnection, EnginePlan};
use crate::error::{Error, Result};
use crate::result::{Issued, QueryResult};
use crate::statement::PreparedStatement;
use crate::value::Value;

/// A session on one [`Database`].
///
/// Calls on one connection are serialized. Threads that query concurrently
/// open a connection each.
///
/// Closing the connection, or dropping it, finishes every result it produced
/// before the engine session is released.
pub struct Connection<'db> {
    database: &'db Database,
    session: Session,
    issued: Issued,
}

impl<'db> Connection<'db> {
    pub(crate) fn new(database: &'db Database, session: Session) -> Self {
        Self {
            database,
            session,
            issued: Issued::default(),
        }
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut dyn EngineConnection) -> T) -> Result<T> {
        self.database.ensure_open()?;
        let mut session = self.session.lock();
        let session = session
            .as_mut()
            .ok_or(Error::UseAfterClose("connection"))?;
        Ok(f(&mut **session))
    }

    fn issue(&self, result: QueryResult) -> QueryResult {
        self.issued.track(&result);
        self.database.track(&result);
        result
    }

    /// Database this connection was made from.
    pub fn database(&self) -> &'db Database {
        self.database
    }

    /// Runs a script of one or more statements. The result holds the first
    /// statement's set; later sets follow through [`QueryResult::next_set`].
    /// Engine failures come back as a result with `is_success() == false`.
    pub fn query(&self, text: &str) -> Result<QueryResult> {
        let cursor = self.with_session(|session| session.query(text))?;
        let result = self.issue(QueryResult::from_cursor(cursor));
        debug!(
            len = text.len(),
            success = result.is_success(),
            "connection.query"
        );
        Ok(result)
    }

    /// Runs `f` with the result of `text`, finishing it afterwards.
    pub fn query_with<T>(
        &self,
        text: &str,
        f: impl FnOnce(&QueryResult) -> Result<T>,
    ) -> Result<T> {
        self.query(text)?.scoped(f)
    }

    /// Runs a script for its side effects. Fails with [`Error::Query`] on the
    /// first statement that failed.
    pub fn run(&self, text: &str) -> Result<()> {
        self.query(text)?.scoped(|result| {
            for set in result.result_sets() {
                set?.ensure_success()?;
            }
            Ok(())
        })
    }

    /// Compiles a single statement. A statement that fails to compile is
    /// still returned, with `is_success() == false`.
    pub fn prepare(&self, text: &str) -> Result<PreparedStatement<'_>> {
        let plan = self.with_session(|session| session.prepare(text))?;
        debug!(success = plan.is_success(), "statement.prepare");
        Ok(PreparedStatement::new(self, text, plan))
    }

    /// Binds `params` onto `statement` and executes it.
    pub fn execute<I, K, V>(
        &self,
        statement: &mut PreparedStatement<'_>,
        params: I,
    ) -> Result<QueryResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        statement.execute(params)
    }

    pub(crate) fn execute_plan(&self, plan: &dyn EnginePlan) -> Result<QueryResult> {
        let cursor = self.with_session(|session| session.execute(plan))?;
        let result = self.issue(QueryResult::from_cursor(cursor));
        debug!(success = result.is_success(), "statement.execute");
        Ok(result)
    }

    /// Engine threads available to queries on this connection.
    pub fn max_threads_for_exec(&self) -> Result<u64> {
        self.with_session(|session| session.max_threads_for_exec())
    }

    /// Overrides the engine thread count for this connection only. Zero is
    /// rejected by the engine.
    pub fn set_max_threads_for_exec(&self, threads: u64) -> Result<()> {
        self.with_session(|session| session.set_max_threads_for_exec(threads))?
            .map_err(Error::Engine)
    }

    /// Bounds each later query or execute call. A statement reached after
    /// the deadline is interrupted without being applied; a read that
    /// overruns fails with `Interrupted.`. Zero disables the timeout.
    pub fn set_query_timeout(&self, timeout: Duration) -> Result<()> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.with_session(|session| session.set_query_timeout(millis))
    }

    /// Finishes every result of this connection, then releases the session.
    /// Later calls fail with [`Error::UseAfterClose`].
    pub fn close(&self) {
        let released = self.issued.finish_all();
        if self.session.lock().take().is_some() {
            debug!(released, "connection.close");
        }
    }

    /// Whether [`close`](Self::close) ran, here or through the database.
    pub fn is_closed(&self) -> bool {
        self.session.lock().is_none()
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Connection");
        if let Ok(threads) = self.max_threads_for_exec() {
            out.field("max_threads_for_exec", &threads);
        }
        out.field("closed", &self.is_closed()).finish()
    }
}
