//! Error types for snapshot editing and decoding.

use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur in bucketscope-core operations.
///
/// None of these describe a rejected user value: invalid values are coerced
/// or carried inside the snapshot. They describe callers breaking the edit
/// contract or handing over malformed snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The edited field is not declared by the snapshot's schema.
    UnknownField,
    /// The raw value cannot target a field of this kind.
    KindMismatch,
    /// A persisted snapshot could not be decoded.
    InvalidSnapshot,
    /// A field edit string could not be parsed.
    InvalidEdit,
    /// A prefix pattern or time range is unusable.
    InvalidPattern,
    /// Instance settings could not be turned into connection settings.
    InvalidConnection,
}

/// A structured error type for bucketscope-core operations.
#[derive(Debug, Error)]
#[error("{kind}{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Creates a new unknown field error.
    pub fn unknown_field(schema: &str, field: &str) -> Self {
        Self::new(ErrorKind::UnknownField)
            .with_message(format!("'{field}' is not a field of '{schema}'"))
    }

    /// Creates a new kind mismatch error.
    pub fn kind_mismatch(field: &str, expected: &str, actual: &str) -> Self {
        Self::new(ErrorKind::KindMismatch)
            .with_message(format!("field '{field}' expects {expected}, got {actual}"))
    }

    /// Creates a new invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSnapshot).with_message(message)
    }

    /// Creates a new invalid edit error.
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEdit).with_message(message)
    }

    /// Creates a new invalid pattern error.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPattern).with_message(message)
    }

    /// Creates a new invalid connection error.
    pub fn invalid_connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConnection).with_message(message)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_snapshot(format!("malformed JSON at line {}", err.line())).with_source(err)
    }
}
