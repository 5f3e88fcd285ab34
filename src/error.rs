//! Error type shared by every binding operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::LogicalKind;

/// Result type for binding operations, using [`Error`] for error handling.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the binding layer.
///
/// Engine failures carry the engine's message text verbatim. Structural misuse
/// such as touching a finished result has its own variant.
#[derive(Debug, Error)]
pub enum Error {
    /// An unknown option name or a badly shaped option value.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption {
        /// Option name as supplied by the caller.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
    /// A configuration file could not be read or parsed.
    #[error("failed to load config {path}: {reason}")]
    ConfigFile {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying read or parse failure.
        reason: String,
    },
    /// The engine refused to open the requested store.
    #[error("{0}")]
    EngineOpen(String),
    /// A query or prepare step reported failure.
    #[error("{message}")]
    Query {
        /// Engine-provided error text.
        message: String,
    },
    /// A parameter value cannot be represented in the engine's encoding.
    #[error("cannot bind parameter '{name}': {reason}")]
    ParameterType {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// Data access on a result that has already been finished.
    #[error("result has already been finished")]
    Finished,
    /// Use of a database or connection after it was closed.
    #[error("{0} used after close")]
    UseAfterClose(&'static str),
    /// The engine produced a value kind this layer does not convert.
    #[error("unhandled value type: {0}")]
    UnsupportedType(LogicalKind),
    /// A value could not be converted to its host representation.
    #[error("conversion error: {0}")]
    Conversion(String),
    /// Any other engine-reported failure.
    #[error("{0}")]
    Engine(String),
}

impl Error {
    pub(crate) fn query(message: impl Into<String>) -> Self {
        Error::Query {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ParameterType {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn file_failures_name_the_config_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigFile { ref path, .. } if path == dir.path()));
        assert!(err.to_string().starts_with("failed to load config"));
    }
}
