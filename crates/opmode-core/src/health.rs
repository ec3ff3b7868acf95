//! Connection health tracking
//!
//! [`HealthTracker`] keeps the rolling outcome of backend interactions:
//! consecutive failures since the last success, the last error seen and the
//! time of the last success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A failed backend call, stored verbatim for diagnostic display
///
/// The controller never inspects or re-raises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionError {
    /// Human readable message
    pub message: String,
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,
    /// When the failure was observed
    pub occurred_at: DateTime<Utc>,
}

impl ConnectionError {
    /// Create error record stamped with the current time
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            occurred_at: Utc::now(),
        }
    }

    /// Capture any error's display text
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }

    /// With HTTP status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&str> for ConnectionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ConnectionError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Snapshot of connection health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHealth {
    /// Most recent failure
    pub last_error: Option<ConnectionError>,
    /// Most recent success
    pub last_success: Option<DateTime<Utc>>,
    /// Failures since the last success or reset
    pub consecutive_errors: u32,
    /// False once `consecutive_errors` reaches the threshold
    pub healthy_connection: bool,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self {
            last_error: None,
            last_success: None,
            consecutive_errors: 0,
            healthy_connection: true,
        }
    }
}

/// Tracks consecutive failures and health classification
#[derive(Debug, Default)]
pub struct HealthTracker {
    health: ConnectionHealth,
}

impl HealthTracker {
    /// Create tracker with a clean, healthy record
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; returns the updated consecutive count
    ///
    /// `threshold` is read by the caller at call time, so a settings change
    /// only affects failures reported after it.
    pub fn report_failure(&mut self, error: ConnectionError, threshold: u32) -> u32 {
        self.health.last_error = Some(error);
        self.health.consecutive_errors = self.health.consecutive_errors.saturating_add(1);
        if self.health.consecutive_errors >= threshold {
            self.health.healthy_connection = false;
        }
        tracing::debug!(
            consecutive_errors = self.health.consecutive_errors,
            threshold,
            "backend failure recorded"
        );
        self.health.consecutive_errors
    }

    /// Record a success
    pub fn report_success(&mut self) {
        self.health.last_success = Some(Utc::now());
        self.health.consecutive_errors = 0;
        self.health.healthy_connection = true;
    }

    /// Zero the counter and mark healthy, keeping the diagnostic history
    pub fn mark_trusted(&mut self) {
        self.health.consecutive_errors = 0;
        self.health.healthy_connection = true;
    }

    /// Clear everything
    pub fn reset(&mut self) {
        self.health = ConnectionHealth::default();
    }

    /// Current consecutive failure count
    #[inline]
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.health.consecutive_errors
    }

    /// Copy of the current health
    #[inline]
    #[must_use]
    pub fn health(&self) -> ConnectionHealth {
        self.health.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy() {
        let tracker = HealthTracker::new();
        let health = tracker.health();
        assert!(health.healthy_connection);
        assert_eq!(health.consecutive_errors, 0);
        assert!(health.last_error.is_none());
        assert!(health.last_success.is_none());
    }

    #[test]
    fn unhealthy_once_threshold_reached() {
        let mut tracker = HealthTracker::new();
        assert_eq!(tracker.report_failure("a".into(), 3), 1);
        assert_eq!(tracker.report_failure("b".into(), 3), 2);
        assert!(tracker.health().healthy_connection);
        assert_eq!(tracker.report_failure("c".into(), 3), 3);
        let health = tracker.health();
        assert!(!health.healthy_connection);
        assert_eq!(health.last_error.unwrap().message, "c");
    }

    #[test]
    fn threshold_is_not_retroactive() {
        let mut tracker = HealthTracker::new();
        tracker.report_failure("a".into(), 5);
        tracker.report_failure("b".into(), 5);
        assert!(tracker.health().healthy_connection);
        // Lowered threshold only applies to the next failure
        tracker.report_failure("c".into(), 2);
        assert!(!tracker.health().healthy_connection);
    }

    #[test]
    fn success_resets_counter() {
        let mut tracker = HealthTracker::new();
        for _ in 0..4 {
            tracker.report_failure("down".into(), 3);
        }
        tracker.report_success();
        let health = tracker.health();
        assert_eq!(health.consecutive_errors, 0);
        assert!(health.healthy_connection);
        assert!(health.last_success.is_some());
        assert!(health.last_error.is_some());
    }

    #[test]
    fn snapshot_is_detached() {
        let mut tracker = HealthTracker::new();
        let mut snapshot = tracker.health();
        snapshot.consecutive_errors = 99;
        tracker.report_failure("x".into(), 3);
        assert_eq!(tracker.consecutive_errors(), 1);
    }

    #[test]
    fn connection_error_display() {
        let err = ConnectionError::new("bad gateway").with_status(502);
        assert_eq!(err.to_string(), "bad gateway (status 502)");
    }
}
