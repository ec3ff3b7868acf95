//! Validated controller configuration
//!
//! [`Settings`] is owned by [`SettingsStore`] and only changes through a
//! validated update. Numeric fields are clamped into range instead of being
//! rejected; wrongly typed or unknown fields are rejected by name while the
//! rest of the update still applies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldViolation, SettingsResult, ValidationError};

/// Allowed range for `max_consecutive_failures`
pub const MAX_CONSECUTIVE_FAILURES_RANGE: (i64, i64) = (1, 10);
/// Allowed range for `error_simulation_rate` (percent)
pub const ERROR_SIMULATION_RATE_RANGE: (i64, i64) = (0, 100);
/// Allowed range for `simulated_network_delay` (milliseconds)
pub const SIMULATED_NETWORK_DELAY_RANGE: (i64, i64) = (0, 5000);

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Switch REAL → DEMO automatically after repeated failures
    pub auto_switch_on_failure: bool,
    /// Consecutive failures before the connection is unhealthy, in [1, 10]
    pub max_consecutive_failures: u32,
    /// Persist mode and settings across runs
    pub persistent_mode_storage: bool,
    /// Surface mode changes to the user
    pub show_notifications: bool,
    /// Let the response cache stay active in REAL mode
    pub use_cache_in_real_mode: bool,
    /// Percentage of simulated calls that fail in DEMO mode, in [0, 100]
    pub error_simulation_rate: u32,
    /// Simulated latency in milliseconds, in [0, 5000]
    pub simulated_network_delay: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_switch_on_failure: true,
            max_consecutive_failures: 3,
            persistent_mode_storage: true,
            show_notifications: true,
            use_cache_in_real_mode: true,
            error_simulation_rate: 10,
            simulated_network_delay: 500,
        }
    }
}

impl Settings {
    /// Clamp every numeric field into its allowed range
    ///
    /// Used on values read back from storage, which may predate the ranges.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let patch = SettingsPatch {
            max_consecutive_failures: Some(i64::from(self.max_consecutive_failures)),
            error_simulation_rate: Some(i64::from(self.error_simulation_rate)),
            simulated_network_delay: Some(i64::try_from(self.simulated_network_delay).unwrap_or(i64::MAX)),
            ..SettingsPatch::default()
        };
        let mut settings = self;
        patch.apply_to(&mut settings);
        settings
    }
}

/// Partial settings update; `None` leaves a field unchanged
///
/// Numeric fields are signed so that out-of-range input (e.g. from a UI
/// slider) can be clamped rather than rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    /// See [`Settings::auto_switch_on_failure`]
    pub auto_switch_on_failure: Option<bool>,
    /// See [`Settings::max_consecutive_failures`]
    pub max_consecutive_failures: Option<i64>,
    /// See [`Settings::persistent_mode_storage`]
    pub persistent_mode_storage: Option<bool>,
    /// See [`Settings::show_notifications`]
    pub show_notifications: Option<bool>,
    /// See [`Settings::use_cache_in_real_mode`]
    pub use_cache_in_real_mode: Option<bool>,
    /// See [`Settings::error_simulation_rate`]
    pub error_simulation_rate: Option<i64>,
    /// See [`Settings::simulated_network_delay`]
    pub simulated_network_delay: Option<i64>,
}

impl SettingsPatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With auto-switch toggle
    #[inline]
    #[must_use]
    pub fn auto_switch_on_failure(mut self, enabled: bool) -> Self {
        self.auto_switch_on_failure = Some(enabled);
        self
    }

    /// With failure threshold
    #[inline]
    #[must_use]
    pub fn max_consecutive_failures(mut self, max: i64) -> Self {
        self.max_consecutive_failures = Some(max);
        self
    }

    /// With persistence toggle
    #[inline]
    #[must_use]
    pub fn persistent_mode_storage(mut self, enabled: bool) -> Self {
        self.persistent_mode_storage = Some(enabled);
        self
    }

    /// With notification toggle
    #[inline]
    #[must_use]
    pub fn show_notifications(mut self, enabled: bool) -> Self {
        self.show_notifications = Some(enabled);
        self
    }

    /// With REAL-mode cache toggle
    #[inline]
    #[must_use]
    pub fn use_cache_in_real_mode(mut self, enabled: bool) -> Self {
        self.use_cache_in_real_mode = Some(enabled);
        self
    }

    /// With simulated error rate
    #[inline]
    #[must_use]
    pub fn error_simulation_rate(mut self, rate: i64) -> Self {
        self.error_simulation_rate = Some(rate);
        self
    }

    /// With simulated delay in milliseconds
    #[inline]
    #[must_use]
    pub fn simulated_network_delay(mut self, delay_ms: i64) -> Self {
        self.simulated_network_delay = Some(delay_ms);
        self
    }

    /// Build patch from an untyped map, collecting rejected fields
    ///
    /// Field names are accepted in camelCase (the persisted layout) or
    /// snake_case. Numbers may be fractional; they are rounded.
    pub fn from_value(value: &Value) -> (Self, Vec<FieldViolation>) {
        let mut patch = Self::default();
        let mut violations = Vec::new();

        let Some(map) = value.as_object() else {
            violations.push(FieldViolation::new("<root>", "expected an object of settings"));
            return (patch, violations);
        };

        for (name, raw) in map {
            let Some(field) = SettingsField::from_name(name) else {
                violations.push(FieldViolation::new(name, "unknown field"));
                continue;
            };
            let result = match field {
                SettingsField::AutoSwitchOnFailure => {
                    expect_bool(raw).map(|b| patch.auto_switch_on_failure = Some(b))
                }
                SettingsField::PersistentModeStorage => {
                    expect_bool(raw).map(|b| patch.persistent_mode_storage = Some(b))
                }
                SettingsField::ShowNotifications => {
                    expect_bool(raw).map(|b| patch.show_notifications = Some(b))
                }
                SettingsField::UseCacheInRealMode => {
                    expect_bool(raw).map(|b| patch.use_cache_in_real_mode = Some(b))
                }
                SettingsField::MaxConsecutiveFailures => {
                    expect_number(raw).map(|n| patch.max_consecutive_failures = Some(n))
                }
                SettingsField::ErrorSimulationRate => {
                    expect_number(raw).map(|n| patch.error_simulation_rate = Some(n))
                }
                SettingsField::SimulatedNetworkDelay => {
                    expect_number(raw).map(|n| patch.simulated_network_delay = Some(n))
                }
            };
            if let Err(reason) = result {
                violations.push(FieldViolation::new(name, reason));
            }
        }

        (patch, violations)
    }

    /// Merge into `settings`, clamping numeric fields
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(v) = self.auto_switch_on_failure {
            settings.auto_switch_on_failure = v;
        }
        if let Some(v) = self.persistent_mode_storage {
            settings.persistent_mode_storage = v;
        }
        if let Some(v) = self.show_notifications {
            settings.show_notifications = v;
        }
        if let Some(v) = self.use_cache_in_real_mode {
            settings.use_cache_in_real_mode = v;
        }
        if let Some(v) = self.max_consecutive_failures {
            settings.max_consecutive_failures = clamp_u32(v, MAX_CONSECUTIVE_FAILURES_RANGE);
        }
        if let Some(v) = self.error_simulation_rate {
            settings.error_simulation_rate = clamp_u32(v, ERROR_SIMULATION_RATE_RANGE);
        }
        if let Some(v) = self.simulated_network_delay {
            settings.simulated_network_delay = u64::from(clamp_u32(v, SIMULATED_NETWORK_DELAY_RANGE));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsField {
    AutoSwitchOnFailure,
    MaxConsecutiveFailures,
    PersistentModeStorage,
    ShowNotifications,
    UseCacheInRealMode,
    ErrorSimulationRate,
    SimulatedNetworkDelay,
}

impl SettingsField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "autoSwitchOnFailure" | "auto_switch_on_failure" => Some(Self::AutoSwitchOnFailure),
            "maxConsecutiveFailures" | "max_consecutive_failures" => Some(Self::MaxConsecutiveFailures),
            "persistentModeStorage" | "persistent_mode_storage" => Some(Self::PersistentModeStorage),
            "showNotifications" | "show_notifications" => Some(Self::ShowNotifications),
            "useCacheInRealMode" | "use_cache_in_real_mode" => Some(Self::UseCacheInRealMode),
            "errorSimulationRate" | "error_simulation_rate" => Some(Self::ErrorSimulationRate),
            "simulatedNetworkDelay" | "simulated_network_delay" => Some(Self::SimulatedNetworkDelay),
            _ => None,
        }
    }
}

fn expect_bool(raw: &Value) -> Result<bool, &'static str> {
    raw.as_bool().ok_or("expected a boolean")
}

#[allow(clippy::cast_possible_truncation)]
fn expect_number(raw: &Value) -> Result<i64, &'static str> {
    if let Some(n) = raw.as_i64() {
        return Ok(n);
    }
    if raw.is_u64() {
        return Ok(i64::MAX);
    }
    match raw.as_f64() {
        // `as` saturates at the i64 bounds; clamping happens afterwards
        Some(f) if f.is_finite() => Ok(f.round() as i64),
        Some(_) => Err("expected a finite number"),
        None => Err("expected a number"),
    }
}

fn clamp_u32(value: i64, (lo, hi): (i64, i64)) -> u32 {
    u32::try_from(value.clamp(lo, hi)).unwrap_or(0)
}

/// Holds the current settings and applies updates atomically
#[derive(Debug, Default, Clone)]
pub struct SettingsStore {
    current: Settings,
}

impl SettingsStore {
    /// Create store from initial settings (clamped)
    #[inline]
    #[must_use]
    pub fn new(initial: Settings) -> Self {
        Self {
            current: initial.sanitized(),
        }
    }

    /// Copy of the current settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.current.clone()
    }

    /// Borrow the current settings
    #[inline]
    #[must_use]
    pub fn current(&self) -> &Settings {
        &self.current
    }

    /// Apply typed patch; never fails
    pub fn update(&mut self, patch: &SettingsPatch) -> Settings {
        patch.apply_to(&mut self.current);
        self.settings()
    }

    /// Apply untyped map
    ///
    /// Valid fields are applied even when others are rejected; the returned
    /// error lists every rejected field.
    pub fn update_from_value(&mut self, value: &Value) -> (Settings, SettingsResult<()>) {
        let (patch, violations) = SettingsPatch::from_value(value);
        let merged = self.update(&patch);
        if violations.is_empty() {
            (merged, Ok(()))
        } else {
            (merged, Err(ValidationError { violations }))
        }
    }
}
