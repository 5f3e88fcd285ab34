//! Prepared statements and parameter binding.

use std::collections::BTreeMap;
use std::fmt;

use crate::connection::Connection;
use crate::engine::EnginePlan;
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::value::{marshal, Value};

/// Builds a parameter list for [`PreparedStatement::execute`].
///
/// ```
/// let params = embedgraph::params!["name" => "Adam", "age" => 30];
/// assert_eq!(params.len(), 2);
/// let none = embedgraph::params![];
/// assert!(none.is_empty());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Value)>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$((::std::string::String::from($name), $crate::Value::from($value))),+]
    };
}

/// A compiled statement that can be executed repeatedly with new bindings.
///
/// Bindings accumulate: binding a name again replaces its value, other names
/// keep theirs. Referenced parameters that were never bound make the
/// statement produce an empty result.
pub struct PreparedStatement<'conn> {
    connection: &'conn Connection<'conn>,
    query: String,
    plan: Box<dyn EnginePlan>,
    success: bool,
    error_message: Option<String>,
    bindings: BTreeMap<String, Value>,
}

impl<'conn> PreparedStatement<'conn> {
    pub(crate) fn new(
        connection: &'conn Connection<'conn>,
        query: &str,
        plan: Box<dyn EnginePlan>,
    ) -> Self {
        let success = plan.is_success();
        let error_message = if success { None } else { plan.error_message() };
        Self {
            connection,
            query: query.to_string(),
            plan,
            success,
            error_message,
            bindings: BTreeMap::new(),
        }
    }

    /// Connection the statement was prepared on.
    pub fn connection(&self) -> &'conn Connection<'conn> {
        self.connection
    }

    /// Text the statement was compiled from.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Whether the statement compiled.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Compile error text. `None` when the statement compiled.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Values bound so far, by parameter name.
    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.bindings
    }

    /// Attaches values to named parameters.
    pub fn bind<I, K, V>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in params {
            let name = name.into();
            let value = value.into();
            let raw = marshal::to_raw(&name, &value)?;
            self.plan
                .bind(&name, raw)
                .map_err(|reason| Error::parameter(name.as_str(), reason))?;
            self.bindings.insert(name, value);
        }
        Ok(())
    }

    /// Binds `params` on top of earlier bindings and runs the statement.
    /// Each call returns an independent result.
    pub fn execute<I, K, V>(&mut self, params: I) -> Result<QueryResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.bind(params)?;
        self.connection.execute_plan(self.plan.as_ref())
    }

    /// Executes and runs `f` with the result, finishing it afterwards.
    pub fn execute_with<I, K, V, T>(
        &mut self,
        params: I,
        f: impl FnOnce(&QueryResult) -> Result<T>,
    ) -> Result<T>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.execute(params)?.scoped(f)
    }

    /// Executes for side effects, failing with [`Error::Query`] when the
    /// statement did not compile or did not run.
    pub fn execute_checked<I, K, V>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.execute(params)?.scoped(QueryResult::ensure_success)
    }
}

impl fmt::Debug for PreparedStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("query", &self.query)
            .field("success", &self.success)
            .field("bindings", &self.bindings)
            .finish()
    }
}
