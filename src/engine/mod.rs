//! Boundary between the binding layer and a graph query engine.
//!
//! The binding layer never evaluates queries itself. Everything it needs from
//! an engine is expressed by the object-safe traits in this module, and values
//! cross the boundary as [`RawValue`], the engine's own tagged encoding.
//! [`memory::MemoryEngine`] is the in-process implementation bundled with the
//! crate.

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub mod memory;

/// Failure text reported by an engine, passed through to callers unmodified.
pub type EngineResult<T> = std::result::Result<T, String>;

/// Logical type tags understood by the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogicalKind {
    /// Untyped. Also the kind reported for null.
    Any,
    /// Boolean.
    Bool,
    /// Auto-incrementing 64-bit integer.
    Serial,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Signed 128-bit integer.
    Int128,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Fixed-point decimal.
    Decimal,
    /// Calendar date.
    Date,
    /// Timestamp in microseconds.
    Timestamp,
    /// Timestamp in seconds.
    TimestampSec,
    /// Timestamp in milliseconds.
    TimestampMs,
    /// Timestamp in nanoseconds.
    TimestampNs,
    /// Timestamp with time zone, in microseconds.
    TimestampTz,
    /// Calendar interval.
    Interval,
    /// Record identifier.
    InternalId,
    /// UTF-8 text.
    String,
    /// UUID.
    Uuid,
    /// Raw bytes.
    Blob,
    /// Variable-length list.
    List,
    /// Fixed-length list.
    Array,
    /// Named fields.
    Struct,
    /// Key/value pairs.
    Map,
    /// Tagged union.
    Union,
    /// Graph node.
    Node,
    /// Graph relationship.
    Rel,
    /// Path of nodes and relationships.
    RecursiveRel,
    /// Opaque engine pointer.
    Pointer,
}

impl LogicalKind {
    /// Upper-case type name as the engine spells it in messages.
    pub fn name(self) -> &'static str {
        match self {
            LogicalKind::Any => "ANY",
            LogicalKind::Bool => "BOOL",
            LogicalKind::Serial => "SERIAL",
            LogicalKind::Int8 => "INT8",
            LogicalKind::Int16 => "INT16",
            LogicalKind::Int32 => "INT32",
            LogicalKind::Int64 => "INT64",
            LogicalKind::Int128 => "INT128",
            LogicalKind::UInt8 => "UINT8",
            LogicalKind::UInt16 => "UINT16",
            LogicalKind::UInt32 => "UINT32",
            LogicalKind::UInt64 => "UINT64",
            LogicalKind::Float => "FLOAT",
            LogicalKind::Double => "DOUBLE",
            LogicalKind::Decimal => "DECIMAL",
            LogicalKind::Date => "DATE",
            LogicalKind::Timestamp => "TIMESTAMP",
            LogicalKind::TimestampSec => "TIMESTAMP_SEC",
            LogicalKind::TimestampMs => "TIMESTAMP_MS",
            LogicalKind::TimestampNs => "TIMESTAMP_NS",
            LogicalKind::TimestampTz => "TIMESTAMP_TZ",
            LogicalKind::Interval => "INTERVAL",
            LogicalKind::InternalId => "INTERNAL_ID",
            LogicalKind::String => "STRING",
            LogicalKind::Uuid => "UUID",
            LogicalKind::Blob => "BLOB",
            LogicalKind::List => "LIST",
            LogicalKind::Array => "ARRAY",
            LogicalKind::Struct => "STRUCT",
            LogicalKind::Map => "MAP",
            LogicalKind::Union => "UNION",
            LogicalKind::Node => "NODE",
            LogicalKind::Rel => "REL",
            LogicalKind::RecursiveRel => "RECURSIVE_REL",
            LogicalKind::Pointer => "POINTER",
        }
    }
}

impl fmt::Display for LogicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine-side record identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RawInternalId {
    /// Table the record lives in.
    pub table_id: u64,
    /// Position within the table.
    pub offset: u64,
}

/// A node as the engine hands it over.
#[derive(Clone, Debug, PartialEq)]
pub struct RawNode {
    /// Record identifier.
    pub id: RawInternalId,
    /// Table name.
    pub label: String,
    /// Properties in schema order.
    pub properties: Vec<(String, RawValue)>,
}

/// A relationship as the engine hands it over.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRel {
    /// Source node.
    pub src_id: RawInternalId,
    /// Destination node.
    pub dst_id: RawInternalId,
    /// Table name.
    pub label: String,
    /// Properties in schema order.
    pub properties: Vec<(String, RawValue)>,
}

/// Engine value encoding.
///
/// Temporal variants carry engine units: days since the Unix epoch for dates
/// and the unit named by the variant for timestamps (`Timestamp` and
/// `TimestampTz` are microseconds).
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Serial counter.
    Serial(i64),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Signed 128-bit integer.
    Int128(i128),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Decimal rendered as text by the engine.
    Decimal(String),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since the epoch.
    Timestamp(i64),
    /// Seconds since the epoch.
    TimestampSec(i64),
    /// Milliseconds since the epoch.
    TimestampMs(i64),
    /// Nanoseconds since the epoch.
    TimestampNs(i64),
    /// Microseconds since the epoch, UTC.
    TimestampTz(i64),
    /// Calendar interval split the way the engine stores it.
    Interval {
        /// Whole months.
        months: i32,
        /// Whole days.
        days: i32,
        /// Remaining microseconds.
        micros: i64,
    },
    /// Record identifier.
    InternalId(RawInternalId),
    /// UTF-8 text.
    String(String),
    /// UUID in its textual form.
    Uuid(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Variable-length list.
    List(Vec<RawValue>),
    /// Fixed-size list.
    Array(Vec<RawValue>),
    /// Named fields in declaration order.
    Struct(Vec<(String, RawValue)>),
    /// Key/value pairs.
    Map(Vec<(RawValue, RawValue)>),
    /// Tagged union member.
    Union {
        /// Name of the active member.
        tag: String,
        /// Value of the active member.
        value: Box<RawValue>,
    },
    /// Graph node.
    Node(RawNode),
    /// Graph relationship.
    Rel(RawRel),
    /// Path as alternating node and relationship lists.
    RecursiveRel {
        /// Nodes along the path.
        nodes: Vec<RawValue>,
        /// Relationships along the path.
        rels: Vec<RawValue>,
    },
    /// Opaque engine pointer.
    Pointer(u64),
}

impl RawValue {
    /// Logical type tag of this value. `Null` reports [`LogicalKind::Any`].
    pub fn kind(&self) -> LogicalKind {
        match self {
            RawValue::Null => LogicalKind::Any,
            RawValue::Bool(_) => LogicalKind::Bool,
            RawValue::Serial(_) => LogicalKind::Serial,
            RawValue::Int8(_) => LogicalKind::Int8,
            RawValue::Int16(_) => LogicalKind::Int16,
            RawValue::Int32(_) => LogicalKind::Int32,
            RawValue::Int64(_) => LogicalKind::Int64,
            RawValue::Int128(_) => LogicalKind::Int128,
            RawValue::UInt8(_) => LogicalKind::UInt8,
            RawValue::UInt16(_) => LogicalKind::UInt16,
            RawValue::UInt32(_) => LogicalKind::UInt32,
            RawValue::UInt64(_) => LogicalKind::UInt64,
            RawValue::Float(_) => LogicalKind::Float,
            RawValue::Double(_) => LogicalKind::Double,
            RawValue::Decimal(_) => LogicalKind::Decimal,
            RawValue::Date(_) => LogicalKind::Date,
            RawValue::Timestamp(_) => LogicalKind::Timestamp,
            RawValue::TimestampSec(_) => LogicalKind::TimestampSec,
            RawValue::TimestampMs(_) => LogicalKind::TimestampMs,
            RawValue::TimestampNs(_) => LogicalKind::TimestampNs,
            RawValue::TimestampTz(_) => LogicalKind::TimestampTz,
            RawValue::Interval { .. } => LogicalKind::Interval,
            RawValue::InternalId(_) => LogicalKind::InternalId,
            RawValue::String(_) => LogicalKind::String,
            RawValue::Uuid(_) => LogicalKind::Uuid,
            RawValue::Blob(_) => LogicalKind::Blob,
            RawValue::List(_) => LogicalKind::List,
            RawValue::Array(_) => LogicalKind::Array,
            RawValue::Struct(_) => LogicalKind::Struct,
            RawValue::Map(_) => LogicalKind::Map,
            RawValue::Union { .. } => LogicalKind::Union,
            RawValue::Node(_) => LogicalKind::Node,
            RawValue::Rel(_) => LogicalKind::Rel,
            RawValue::RecursiveRel { .. } => LogicalKind::RecursiveRel,
            RawValue::Pointer(_) => LogicalKind::Pointer,
        }
    }
}

/// Engine-level system settings, derived from [`crate::Config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemConfig {
    /// Buffer pool bytes. Zero lets the engine pick.
    pub buffer_pool_size: u64,
    /// Zero lets the engine pick.
    pub max_num_threads: u64,
    /// Compress stored columns.
    pub enable_compression: bool,
    /// Refuse writes.
    pub read_only: bool,
    /// Upper bound on store size in bytes.
    pub max_db_size: u64,
    /// Checkpoint without being asked.
    pub auto_checkpoint: bool,
    /// WAL bytes that trigger an automatic checkpoint.
    pub checkpoint_threshold: u64,
}

/// Compile and execute timings in milliseconds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EngineSummary {
    /// Time spent compiling.
    pub compiling_ms: f64,
    /// Time spent executing.
    pub execution_ms: f64,
}

/// Entry point of an engine implementation.
pub trait Engine: Send + Sync {
    /// Opens a store. `None` requests an in-memory store.
    fn open(&self, path: Option<&Path>, config: &SystemConfig)
        -> EngineResult<Box<dyn EngineDatabase>>;

    /// Engine release version.
    fn version(&self) -> String;

    /// On-disk format version written by this engine.
    fn storage_version(&self) -> u64;

    /// Whether `path` holds a store this engine can open.
    fn is_valid_store(&self, path: &Path) -> bool;

    /// Defaults applied when the caller does not set an option.
    fn default_system_config(&self) -> SystemConfig;
}

/// An open store. Dropping it releases the store.
pub trait EngineDatabase: Send + Sync {
    /// Opens a session on this store.
    fn connect(&self) -> EngineResult<Box<dyn EngineConnection>>;
}

/// A session bound to one store.
pub trait EngineConnection: Send {
    /// Runs a script of one or more statements. Failures are reported through
    /// the returned cursor, never as a panic or an `Err`.
    fn query(&mut self, text: &str) -> Box<dyn EngineCursor>;

    /// Compiles one statement. Failures are reported through the plan.
    fn prepare(&mut self, text: &str) -> Box<dyn EnginePlan>;

    /// Executes a plan with whatever parameters are currently bound to it.
    fn execute(&mut self, plan: &dyn EnginePlan) -> Box<dyn EngineCursor>;

    /// Threads a query on this session may use.
    fn max_threads_for_exec(&self) -> u64;

    /// Sets the session thread count. Zero is an error.
    fn set_max_threads_for_exec(&mut self, threads: u64) -> EngineResult<()>;

    /// Zero disables the timeout.
    fn set_query_timeout(&mut self, timeout_ms: u64);
}

/// A compiled statement holding parameter bindings.
pub trait EnginePlan: Send {
    /// Whether compilation or execution succeeded.
    fn is_success(&self) -> bool;

    /// Failure text when not successful.
    fn error_message(&self) -> Option<String>;

    /// Binds one named parameter. Fails when the statement has no such name.
    fn bind(&mut self, name: &str, value: RawValue) -> EngineResult<()>;

    /// Lets an engine recover its own plan type.
    fn as_any(&self) -> &dyn Any;
}

/// Forward-only cursor over one result set.
pub trait EngineCursor: Send {
    /// Whether compilation or execution succeeded.
    fn is_success(&self) -> bool;

    /// Failure text when not successful.
    fn error_message(&self) -> Option<String>;

    /// Column names of the set.
    fn column_names(&self) -> Vec<String>;

    /// Total row count of the set, independent of the cursor position.
    fn num_tuples(&self) -> u64;

    /// Whether another row remains.
    fn has_next(&self) -> bool;

    /// Advances one row. `None` once exhausted.
    fn next_row(&mut self) -> EngineResult<Option<Vec<RawValue>>>;

    /// Whether the script has a following set.
    fn has_next_set(&self) -> bool;

    /// Detaches the following set of a multi-statement script.
    fn next_set(&mut self) -> Option<Box<dyn EngineCursor>>;

    /// Compile and execute timings.
    fn summary(&self) -> EngineSummary;
}

/// Process-wide engine used by [`crate::Database::open`].
pub fn default_engine() -> Arc<dyn Engine> {
    static ENGINE: OnceLock<Arc<memory::MemoryEngine>> = OnceLock::new();
    let engine = ENGINE.get_or_init(|| Arc::new(memory::MemoryEngine::new()));
    engine.clone()
}
