//! Operation mode and transition records
//!
//! Provides [`Mode`], the immutable [`ModeChangeEvent`] broadcast on every
//! transition, and [`OverrideState`] for the single outstanding temporary
//! override.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PersistenceError;

/// Which data source the application is backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Live backend
    Real,
    /// Locally simulated data (the safe default)
    #[default]
    Demo,
}

impl Mode {
    /// The opposite mode
    #[inline]
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Mode::Real => Mode::Demo,
            Mode::Demo => Mode::Real,
        }
    }

    /// Stable storage value
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Real => "real",
            Mode::Demo => "demo",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Real => f.write_str("REAL"),
            Mode::Demo => f.write_str("DEMO"),
        }
    }
}

impl FromStr for Mode {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Mode::Real),
            "demo" => Ok(Mode::Demo),
            other => Err(PersistenceError::UnknownMode(other.to_string())),
        }
    }
}

/// A single mode transition, broadcast once to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeChangeEvent {
    /// Mode before the transition
    pub previous_mode: Mode,
    /// Mode after the transition
    pub current_mode: Mode,
    /// Why the transition happened
    pub reason: String,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

impl ModeChangeEvent {
    /// Create event stamped with the current time
    #[must_use]
    pub fn new(previous_mode: Mode, current_mode: Mode, reason: impl Into<String>) -> Self {
        Self {
            previous_mode,
            current_mode,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outstanding temporary override, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverrideState {
    saved_mode: Option<Mode>,
}

impl OverrideState {
    /// Whether an override is outstanding
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.saved_mode.is_some()
    }

    /// Mode current immediately before the override began
    #[inline]
    #[must_use]
    pub fn saved_mode(&self) -> Option<Mode> {
        self.saved_mode
    }

    /// Start an override remembering `mode`; returns false if one is already active
    pub(crate) fn begin(&mut self, mode: Mode) -> bool {
        if self.is_active() {
            return false;
        }
        self.saved_mode = Some(mode);
        true
    }

    /// Consume the saved mode, clearing the override
    pub(crate) fn take(&mut self) -> Option<Mode> {
        self.saved_mode.take()
    }
}
