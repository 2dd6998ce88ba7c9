//! Request-scoped structured logging
//!
//! Handlers and the storage adapter log through the [`Logger`] trait rather
//! than through `tracing` directly: every event carries an open-ended field
//! set, and a logger built for a request merges in the fields of its
//! [`RequestContext`] (the correlation id) so that all lines written while
//! serving one request can be tied together.
//!
//! Two implementations exist:
//! - [`NoopLogger`] discards everything
//! - [`JsonLogger`] writes one timestamped JSON object per event to stdout

mod json;

#[cfg(test)]
pub(crate) mod capture;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub use json::JsonLogger;

/// Field set attached to a single log event
pub type Fields = BTreeMap<String, FieldValue>;

/// Destination shared by every logger built from the same factory
pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Builds a [`Fields`] map from `key => value` pairs.
///
/// Values go through `FieldValue::from`, so strings, integers and booleans
/// can be passed directly; use [`FieldValue::error`] or [`FieldValue::debug`]
/// for everything else.
macro_rules! fields {
    () => {
        $crate::logger::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::logger::Fields::new();
        $(
            fields.insert(
                ::std::string::String::from($key),
                $crate::logger::FieldValue::from($value),
            );
        )+
        fields
    }};
}

pub(crate) use fields;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Equivalent `tracing` filter directive. `tracing` has no fatal level.
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error | Level::Fatal => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// A single field value.
///
/// Strings, integers and booleans are encoded natively; errors are rendered
/// through their `Display` output and anything else through a string
/// conversion chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Error(String),
    Other(String),
}

impl FieldValue {
    pub fn error(err: &(dyn std::error::Error + '_)) -> Self {
        FieldValue::Error(err.to_string())
    }

    pub fn debug<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        FieldValue::Other(format!("{:?}", value))
    }

    pub fn display<T: fmt::Display + ?Sized>(value: &T) -> Self {
        FieldValue::Other(value.to_string())
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Str(s) | FieldValue::Error(s) | FieldValue::Other(s) => {
                serde_json::Value::String(s.clone())
            }
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(FieldValue::Int)
            .unwrap_or_else(|_| FieldValue::Other(value.to_string()))
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::from(value as u64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Leveled structured logger.
///
/// Implementations only provide [`Logger::log`]; the leveled calls forward
/// to it. `fatal` records the event but does not terminate the process.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, msg: &str, fields: Fields);

    fn debug(&self, msg: &str, fields: Fields) {
        self.log(Level::Debug, msg, fields)
    }

    fn info(&self, msg: &str, fields: Fields) {
        self.log(Level::Info, msg, fields)
    }

    fn warn(&self, msg: &str, fields: Fields) {
        self.log(Level::Warn, msg, fields)
    }

    fn error(&self, msg: &str, fields: Fields) {
        self.log(Level::Error, msg, fields)
    }

    fn fatal(&self, msg: &str, fields: Fields) {
        self.log(Level::Fatal, msg, fields)
    }
}

/// Logger that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _msg: &str, _fields: Fields) {}
}

/// Per-request values shared by every log line of that request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    correlation_id: String,
}

impl RequestContext {
    /// Create a context with a freshly generated correlation id
    pub fn new() -> Self {
        Self::with_correlation_id(Uuid::new_v4().to_string())
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Fields merged into every event logged under this context
    pub fn common_fields(&self) -> Fields {
        fields! { "correlation_id" => self.correlation_id.as_str() }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Logger implementation selected by `DEFAULT_LOGGER_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerKind {
    /// JSON lines on stdout
    #[default]
    #[serde(alias = "zerolog", alias = "structured")]
    Json,
    /// Discard everything
    #[serde(alias = "none", alias = "off")]
    Noop,
}

impl FromStr for LoggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "json" | "zerolog" | "structured" => Ok(LoggerKind::Json),
            "noop" | "none" | "off" => Ok(LoggerKind::Noop),
            _ => Err(format!("Unknown logger type: {}", s)),
        }
    }
}

/// Builds loggers that share one output sink
#[derive(Clone)]
pub struct LoggerFactory {
    kind: LoggerKind,
    min_level: Level,
    sink: SharedSink,
}

impl LoggerFactory {
    /// Factory writing to the process's standard output
    pub fn new(kind: LoggerKind, min_level: Level) -> Self {
        Self::with_sink(kind, min_level, std::io::stdout())
    }

    pub fn with_sink<W>(kind: LoggerKind, min_level: Level, sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let sink: Box<dyn Write + Send> = Box::new(sink);
        Self {
            kind,
            min_level,
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn kind(&self) -> LoggerKind {
        self.kind
    }

    /// Logger without request context, for process-wide events
    pub fn base(&self) -> Arc<dyn Logger> {
        match self.kind {
            LoggerKind::Noop => Arc::new(NoopLogger),
            LoggerKind::Json => Arc::new(JsonLogger::new(self.sink.clone(), self.min_level)),
        }
    }

    /// Logger whose events all carry the fields of `ctx`
    pub fn for_request(&self, ctx: &RequestContext) -> Arc<dyn Logger> {
        match self.kind {
            LoggerKind::Noop => Arc::new(NoopLogger),
            LoggerKind::Json => Arc::new(
                JsonLogger::new(self.sink.clone(), self.min_level).with_context(ctx),
            ),
        }
    }
}

impl fmt::Debug for LoggerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerFactory")
            .field("kind", &self.kind)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}
