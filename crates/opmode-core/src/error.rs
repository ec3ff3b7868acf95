//! Error types for the mode controller
//!
//! Only two failures belong to this subsystem:
//! - Settings validation (surfaced to the caller)
//! - Persistence (always recovered locally, logged and swallowed)
//!
//! Backend failures are inputs, see [`crate::ConnectionError`].

use std::fmt;
use std::path::PathBuf;

/// Why a single settings field was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Offending field name as supplied by the caller
    pub field: String,
    /// What was wrong with it
    pub reason: String,
}

impl FieldViolation {
    /// Create violation for field
    #[inline]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Settings update rejected one or more fields
///
/// The valid fields of the same update have already been applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid settings: {}", render_violations(.violations))]
pub struct ValidationError {
    /// Every rejected field, in input order
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Names of the rejected fields
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// Check if a field was rejected
    #[inline]
    #[must_use]
    pub fn names(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn render_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of a settings update
pub type SettingsResult<T> = Result<T, ValidationError>;

/// Durable storage unavailable or corrupt
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// IO failure on the backing file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value could not be decoded
    #[error("corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Stored mode is not a known mode
    #[error("unknown mode value: '{0}'")]
    UnknownMode(String),

    /// Value could not be encoded for storage
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corrupt-value error for key
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result of a storage operation
pub type PersistenceResult<T> = Result<T, PersistenceError>;
