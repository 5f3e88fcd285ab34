//! Query results and chained result sets.
//!
//! A script with several statements produces one result set per statement.
//! The sets share a single chain: set `k + 1` is detached from set `k`, so
//! finishing set `k` also finishes every successor already fetched. Cursors
//! are released successors first, each exactly once, either by
//! [`QueryResult::finish`] or when the last handle onto the chain is dropped.

use std::cell::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::engine::EngineCursor;
use crate::error::{Error, Result};
use crate::summary::QuerySummary;
use crate::value::{marshal, Tuple};

struct Slot {
    cursor: Option<Box<dyn EngineCursor>>,
    success: bool,
    error_message: Option<String>,
    columns: Option<Arc<[String]>>,
    tuples: Option<Arc<[Tuple]>>,
}

impl Slot {
    fn new(cursor: Box<dyn EngineCursor>) -> Self {
        let success = cursor.is_success();
        let error_message = if success {
            None
        } else {
            Some(
                cursor
                    .error_message()
                    .unwrap_or_else(|| "unknown engine error".to_string()),
            )
        };
        Self {
            cursor: Some(cursor),
            success,
            error_message,
            columns: None,
            tuples: None,
        }
    }
}

struct Chain {
    slots: Vec<Slot>,
}

impl Chain {
    /// Slot `index`, provided its cursor has not been released.
    fn open_slot(&mut self, index: usize) -> Result<&mut Slot> {
        self.slots
            .get_mut(index)
            .filter(|slot| slot.cursor.is_some())
            .ok_or(Error::Finished)
    }

    fn cursor(&mut self, index: usize) -> Result<&mut dyn EngineCursor> {
        match self.slots.get_mut(index).and_then(|slot| slot.cursor.as_mut()) {
            Some(cursor) => Ok(&mut **cursor),
            None => Err(Error::Finished),
        }
    }

    /// Releases `index` and every later set, last first. Returns how many
    /// cursors were still live.
    fn release_from(&mut self, index: usize) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut().skip(index).rev() {
            if let Some(cursor) = slot.cursor.take() {
                drop(cursor);
                released += 1;
            }
        }
        released
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        let released = self.release_from(0);
        if released > 0 {
            debug!(released, "result.release_on_drop");
        }
    }
}

/// One result set of a query or prepared-statement execution.
///
/// Data access is forward-only. [`next_tuple`](Self::next_tuple) and
/// [`each`](Self::each) consume rows from the engine cursor;
/// [`tuples`](Self::tuples) drains whatever remains and keeps it. After
/// [`finish`](Self::finish) every data access fails with [`Error::Finished`],
/// while [`is_success`](Self::is_success) and
/// [`error_message`](Self::error_message) stay available.
///
/// Every handle onto the same set shares its column names and its
/// materialized tuples.
///
/// A result is not safe for concurrent use.
pub struct QueryResult {
    chain: Arc<Mutex<Chain>>,
    index: usize,
    success: bool,
    error_message: Option<String>,
    columns: OnceCell<Arc<[String]>>,
    tuples: OnceCell<Arc<[Tuple]>>,
}

impl QueryResult {
    pub(crate) fn from_cursor(cursor: Box<dyn EngineCursor>) -> Self {
        let slot = Slot::new(cursor);
        let (success, error_message) = (slot.success, slot.error_message.clone());
        let chain = Chain { slots: vec![slot] };
        Self::handle(Arc::new(Mutex::new(chain)), 0, success, error_message)
    }

    fn handle(
        chain: Arc<Mutex<Chain>>,
        index: usize,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self {
            chain,
            index,
            success,
            error_message,
            columns: OnceCell::new(),
            tuples: OnceCell::new(),
        }
    }

    /// New handle onto the same set.
    fn share(&self) -> Self {
        Self::handle(
            self.chain.clone(),
            self.index,
            self.success,
            self.error_message.clone(),
        )
    }

    /// Position of this set within its script, starting at zero.
    pub fn set_index(&self) -> usize {
        self.index
    }

    /// Whether the statement behind this set ran. Available after finish.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Engine error text. `None` when the statement succeeded.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Turns a failed set into [`Error::Query`].
    pub fn ensure_success(&self) -> Result<()> {
        match &self.error_message {
            Some(message) if !self.success => Err(Error::query(message.clone())),
            _ => Ok(()),
        }
    }

    /// Whether this set's cursor has been released.
    pub fn is_finished(&self) -> bool {
        self.chain
            .lock()
            .slots
            .get(self.index)
            .map_or(true, |slot| slot.cursor.is_none())
    }

    fn with_cursor<T>(&self, f: impl FnOnce(&mut dyn EngineCursor) -> T) -> Result<T> {
        let mut chain = self.chain.lock();
        let cursor = chain.cursor(self.index)?;
        Ok(f(cursor))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_finished() {
            Err(Error::Finished)
        } else {
            Ok(())
        }
    }

    fn shared_columns(&self) -> Result<Arc<[String]>> {
        self.ensure_open()?;
        if let Some(columns) = self.columns.get() {
            return Ok(columns.clone());
        }
        let columns = {
            let mut chain = self.chain.lock();
            let slot = chain.open_slot(self.index)?;
            if let Some(columns) = slot.columns.clone() {
                columns
            } else {
                let names: Arc<[String]> = slot
                    .cursor
                    .as_ref()
                    .map(|cursor| cursor.column_names())
                    .unwrap_or_default()
                    .into();
                slot.columns = Some(names.clone());
                names
            }
        };
        Ok(self.columns.get_or_init(|| columns).clone())
    }

    /// Column names in tuple value order. Fetched once.
    pub fn column_names(&self) -> Result<&[String]> {
        self.shared_columns()?;
        Ok(self.columns.get().map_or(&[][..], |columns| &columns[..]))
    }

    /// Number of columns in this set.
    pub fn num_columns(&self) -> Result<usize> {
        Ok(self.column_names()?.len())
    }

    /// Total number of tuples in this set, consumed or not.
    pub fn num_tuples(&self) -> Result<u64> {
        self.with_cursor(|cursor| cursor.num_tuples())
    }

    /// Whether the cursor has rows left.
    pub fn has_next(&self) -> Result<bool> {
        self.with_cursor(|cursor| cursor.has_next())
    }

    /// Advances the cursor by one row. `Ok(None)` marks the end.
    pub fn next_tuple(&self) -> Result<Option<Tuple>> {
        let columns = self.shared_columns()?;
        let row = self
            .with_cursor(|cursor| cursor.next_row())?
            .map_err(Error::Engine)?;
        let Some(raw) = row else {
            return Ok(None);
        };
        let values = raw
            .iter()
            .map(marshal::to_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Tuple::new(columns, values)))
    }

    /// Single-pass iterator over the rows not yet consumed. Once the cursor is
    /// exhausted a new call yields nothing; the engine cursor does not rewind.
    pub fn each(&self) -> Result<Tuples<'_>> {
        self.ensure_open()?;
        Ok(Tuples {
            result: self,
            done: false,
        })
    }

    /// Drains the remaining rows on first call and keeps them for every
    /// handle onto this set. Rows consumed earlier through
    /// [`next_tuple`](Self::next_tuple) or [`each`](Self::each) are not
    /// included.
    pub fn tuples(&self) -> Result<&[Tuple]> {
        self.ensure_open()?;
        if let Some(tuples) = self.tuples.get() {
            return Ok(&tuples[..]);
        }
        let cached = self.chain.lock().open_slot(self.index)?.tuples.clone();
        let tuples = match cached {
            Some(tuples) => tuples,
            None => {
                let mut drained = Vec::new();
                while let Some(tuple) = self.next_tuple()? {
                    drained.push(tuple);
                }
                let drained: Arc<[Tuple]> = drained.into();
                let mut chain = self.chain.lock();
                let slot = chain.open_slot(self.index)?;
                slot.tuples.get_or_insert(drained).clone()
            }
        };
        Ok(&self.tuples.get_or_init(|| tuples)[..])
    }

    /// Random access into [`tuples`](Self::tuples).
    pub fn get(&self, index: usize) -> Result<Option<&Tuple>> {
        Ok(self.tuples()?.get(index))
    }

    /// Whether a later statement of the script has a set.
    pub fn has_next_set(&self) -> Result<bool> {
        let mut chain = self.chain.lock();
        let fetched = chain.slots.len() > self.index + 1;
        let cursor = chain.cursor(self.index)?;
        Ok(fetched || cursor.has_next_set())
    }

    /// Result of the following statement, or `None` after the last one.
    /// Fetching the same successor twice returns handles onto one set.
    pub fn next_set(&self) -> Result<Option<QueryResult>> {
        let mut chain = self.chain.lock();
        let next = self.index + 1;
        let fetched = chain.slots.len() > next;
        let cursor = chain.cursor(self.index)?;
        if !fetched {
            let Some(successor) = cursor.next_set() else {
                return Ok(None);
            };
            chain.slots.push(Slot::new(successor));
            debug!(set = next, "result.next_set");
        }
        let slot = &chain.slots[next];
        let (success, error_message) = (slot.success, slot.error_message.clone());
        drop(chain);
        Ok(Some(Self::handle(
            self.chain.clone(),
            next,
            success,
            error_message,
        )))
    }

    /// This set followed by every later set of the script.
    pub fn result_sets(&self) -> ResultSets {
        ResultSets {
            next: Some(Ok(self.share())),
        }
    }

    /// Timings of this set. Must be read before [`finish`](Self::finish).
    pub fn query_summary(&self) -> Result<QuerySummary> {
        self.with_cursor(|cursor| QuerySummary::from(cursor.summary()))
    }

    /// Releases this set and every successor already fetched. Idempotent.
    pub fn finish(&self) {
        let released = self.chain.lock().release_from(self.index);
        if released > 0 {
            debug!(set = self.index, released, "result.finish");
        }
    }

    /// Runs `f` with this result and finishes it on every exit path,
    /// including unwinding.
    pub fn scoped<T>(self, f: impl FnOnce(&QueryResult) -> Result<T>) -> Result<T> {
        let guard = FinishGuard(&self);
        f(guard.0)
    }

    /// Remaining rows as a `|`-separated table with a header line.
    pub fn render(&self) -> Result<String> {
        let mut out = self.column_names()?.join("|");
        out.push('\n');
        for tuple in self.tuples()? {
            let row: Vec<String> = tuple.values().iter().map(ToString::to_string).collect();
            out.push_str(&row.join("|"));
            out.push('\n');
        }
        Ok(out)
    }
}

/// Results handed out by a connection or database, finished together when
/// their owner closes.
#[derive(Default)]
pub(crate) struct Issued {
    chains: Mutex<Vec<Weak<Mutex<Chain>>>>,
}

impl Issued {
    pub(crate) fn track(&self, result: &QueryResult) {
        let mut chains = self.chains.lock();
        chains.retain(|chain| chain.strong_count() > 0);
        chains.push(Arc::downgrade(&result.chain));
    }

    /// Releases every live cursor of every tracked chain. Returns how many
    /// were released.
    pub(crate) fn finish_all(&self) -> usize {
        let chains = std::mem::take(&mut *self.chains.lock());
        chains
            .iter()
            .filter_map(Weak::upgrade)
            .map(|chain| {
                let released = chain.lock().release_from(0);
                released
            })
            .sum()
    }
}

struct FinishGuard<'a>(&'a QueryResult);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("QueryResult");
        out.field("set", &self.index);
        out.field("success", &self.success);
        if let Some(message) = &self.error_message {
            out.field("error_message", message);
        }
        if self.is_finished() {
            out.field("finished", &true);
        } else if let Ok(summary) = self.query_summary() {
            out.field("compiling_time", &summary.compiling_time());
            out.field("execution_time", &summary.execution_time());
        }
        out.finish()
    }
}

/// Forward-only iterator returned by [`QueryResult::each`].
pub struct Tuples<'a> {
    result: &'a QueryResult,
    done: bool,
}

impl Iterator for Tuples<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.result.next_tuple() {
            Ok(Some(tuple)) => Some(Ok(tuple)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for Tuples<'_> {}

/// Iterator over a set and its successors, from [`QueryResult::result_sets`].
pub struct ResultSets {
    next: Option<Result<QueryResult>>,
}

impl Iterator for ResultSets {
    type Item = Result<QueryResult>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next.take()?;
        if let Ok(result) = &item {
            self.next = result.next_set().transpose();
        }
        Some(item)
    }
}
