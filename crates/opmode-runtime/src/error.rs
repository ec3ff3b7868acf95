//! Error types for the runtime collaborators

use opmode_core::ConnectionError;

/// A data source call failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SourceError {
    /// What went wrong
    pub message: String,
    /// HTTP status, if the source answered
    pub status: Option<u16>,
}

impl SourceError {
    /// Create error without status
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Create error from an HTTP response status
    #[inline]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Record handed to the controller's health tracker
    #[must_use]
    pub fn to_connection_error(&self) -> ConnectionError {
        let error = ConnectionError::new(self.message.clone());
        match self.status {
            Some(status) => error.with_status(status),
            None => error,
        }
    }
}

/// Errors surfaced by the runtime collaborators
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Live or demo source failed
    #[error("source failed: {0}")]
    Source(#[from] SourceError),

    /// Demo mode rolled a simulated failure
    #[error("simulated failure ({rate}% error rate)")]
    SimulatedFailure { rate: u32 },
}

impl RuntimeError {
    /// Check if the failure was simulated rather than real
    #[inline]
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::SimulatedFailure { .. })
    }
}

/// Result of a runtime operation
pub type RuntimeResult<T> = Result<T, RuntimeError>;
