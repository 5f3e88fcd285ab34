//! Database system options.
//!
//! Options left unset take the engine's defaults when a database is opened.
//! A `Config` can be built with typed setters, from loosely typed
//! `(name, value)` pairs, or from the `[database]` table of a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::SystemConfig;
use crate::error::{Error, Result};

/// Recognized option names.
pub const OPTION_NAMES: &[&str] = &[
    "buffer_pool_size",
    "max_num_threads",
    "enable_compression",
    "read_only",
    "max_db_size",
    "auto_checkpoint",
    "checkpoint_threshold",
];

/// Options for opening a [`Database`](crate::Database).
///
/// Unset fields fall back to the engine's defaults. Build one from option
/// pairs, from TOML, or with the `with_*` builders.
///
/// ```
/// use embedgraph::Config;
///
/// let config = Config::new().with_read_only(true).with_max_num_threads(2);
/// assert_eq!(config.read_only, Some(true));
/// assert_eq!(config.buffer_pool_size, None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Buffer pool size in bytes.
    pub buffer_pool_size: Option<u64>,
    /// Worker threads for query execution.
    pub max_num_threads: Option<u32>,
    /// Compress stored columns.
    pub enable_compression: Option<bool>,
    /// Open without write access.
    pub read_only: Option<bool>,
    /// Upper bound on the store size in bytes.
    pub max_db_size: Option<u64>,
    /// Let the engine checkpoint on its own.
    pub auto_checkpoint: Option<bool>,
    /// WAL size in bytes that triggers an automatic checkpoint.
    pub checkpoint_threshold: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    database: Config,
}

impl Config {
    /// Empty config. Every option takes the engine default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from `(name, value)` pairs. Integer options accept
    /// non-negative numbers or numeric strings. Boolean options treat `null`
    /// and `false` as false and every other value as true.
    pub fn from_options<I, K>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: AsRef<str>,
    {
        Config::default().with(options)
    }

    /// Copy of this config with the named options overridden.
    pub fn with<I, K>(&self, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: AsRef<str>,
    {
        let mut config = self.clone();
        for (name, value) in options {
            config.set(name.as_ref(), &value)?;
        }
        Ok(config)
    }

    /// Engine defaults that apply to unset options.
    pub fn engine_defaults() -> SystemConfig {
        crate::engine::default_engine().default_system_config()
    }

    /// Sets one option by name.
    pub fn set(&mut self, name: &str, value: &JsonValue) -> Result<()> {
        match name {
            "buffer_pool_size" => self.buffer_pool_size = Some(parse_u64(value, name)?),
            "max_num_threads" => {
                let threads = parse_u64(value, name)?;
                let threads = u32::try_from(threads)
                    .map_err(|_| Error::invalid_option(name, "exceeds the 32-bit thread limit"))?;
                self.max_num_threads = Some(threads);
            }
            "max_db_size" => self.max_db_size = Some(parse_u64(value, name)?),
            "checkpoint_threshold" => self.checkpoint_threshold = Some(parse_u64(value, name)?),
            "enable_compression" => self.enable_compression = Some(truthy(value)),
            "read_only" => self.read_only = Some(truthy(value)),
            "auto_checkpoint" => self.auto_checkpoint = Some(truthy(value)),
            _ => {
                return Err(Error::invalid_option(
                    name,
                    format!("unknown option, expected one of {}", OPTION_NAMES.join(", ")),
                ))
            }
        }
        Ok(())
    }

    /// Sets the buffer pool size in bytes.
    pub fn with_buffer_pool_size(mut self, bytes: u64) -> Self {
        self.buffer_pool_size = Some(bytes);
        self
    }

    /// Sets the execution thread count.
    pub fn with_max_num_threads(mut self, threads: u32) -> Self {
        self.max_num_threads = Some(threads);
        self
    }

    /// Turns storage compression on or off.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = Some(enabled);
        self
    }

    /// Opens the store read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    /// Caps the store size in bytes.
    pub fn with_max_db_size(mut self, bytes: u64) -> Self {
        self.max_db_size = Some(bytes);
        self
    }

    /// Turns automatic checkpoints on or off.
    pub fn with_auto_checkpoint(mut self, enabled: bool) -> Self {
        self.auto_checkpoint = Some(enabled);
        self
    }

    /// Sets the WAL size that triggers a checkpoint.
    pub fn with_checkpoint_threshold(mut self, bytes: u64) -> Self {
        self.checkpoint_threshold = Some(bytes);
        self
    }

    /// Parses the `[database]` table of a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        parse_toml(contents, Path::new("<string>"))
    }

    /// Reads the `[database]` table of a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| Error::ConfigFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        parse_toml(&contents, path)
    }

    /// Loads the per-user config file when it exists, otherwise an empty config.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Config::load(path),
            _ => Ok(Config::default()),
        }
    }

    /// Fills unset options from `defaults`.
    pub(crate) fn resolve(&self, defaults: &SystemConfig) -> SystemConfig {
        SystemConfig {
            buffer_pool_size: self.buffer_pool_size.unwrap_or(defaults.buffer_pool_size),
            max_num_threads: self
                .max_num_threads
                .map_or(defaults.max_num_threads, u64::from),
            enable_compression: self
                .enable_compression
                .unwrap_or(defaults.enable_compression),
            read_only: self.read_only.unwrap_or(defaults.read_only),
            max_db_size: self.max_db_size.unwrap_or(defaults.max_db_size),
            auto_checkpoint: self.auto_checkpoint.unwrap_or(defaults.auto_checkpoint),
            checkpoint_threshold: self
                .checkpoint_threshold
                .unwrap_or(defaults.checkpoint_threshold),
        }
    }
}

fn parse_toml(contents: &str, path: &Path) -> Result<Config> {
    toml::from_str::<ConfigFile>(contents)
        .map(|file| file.database)
        .map_err(|err| Error::ConfigFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}

/// `$XDG_CONFIG_HOME/embedgraph/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("embedgraph").join("config.toml"))
}

fn truthy(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Null | JsonValue::Bool(false))
}

fn parse_u64(value: &JsonValue, name: &str) -> Result<u64> {
    match value {
        JsonValue::Number(num) => num
            .as_u64()
            .ok_or_else(|| Error::invalid_option(name, "requires a non-negative integer")),
        JsonValue::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::invalid_option(name, "requires a non-negative integer")),
        _ => Err(Error::invalid_option(name, "requires a numeric value")),
    }
}
