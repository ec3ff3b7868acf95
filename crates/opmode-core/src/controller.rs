//! The mode controller
//!
//! [`ModeController`] is the single source of truth for the active mode and
//! the only component that mutates it. All state lives behind one mutex;
//! persistence happens while the lock is held so durable writes follow the
//! in-memory order, and subscribers/notifiers run after it is released so
//! they may call back into the controller.
//!
//! Because delivery happens outside the lock, concurrent transitions can
//! reach subscribers out of order. Read [`ModeController::mode`] for the
//! current mode instead of folding over received events.
//!
//! # Auto-switch
//!
//! After every reported failure the controller switches REAL → DEMO iff
//! auto-switch is enabled, the consecutive failure count has reached the
//! threshold, the mode is REAL, no temporary override is active and the
//! failure's context is not a critical operation.
//!
//! # Explicit calls during an override
//!
//! [`ModeController::enable_demo_mode`], [`ModeController::enable_real_mode`]
//! and [`ModeController::toggle`] cancel an outstanding temporary override;
//! a later [`ModeController::restore_mode`] is then a no-op.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::critical::CriticalOperationGuard;
use crate::error::SettingsResult;
use crate::health::{ConnectionError, ConnectionHealth, HealthTracker};
use crate::mode::{Mode, ModeChangeEvent, OverrideState};
use crate::notify::{Notifier, TracingNotifier};
use crate::persistence::PersistenceGateway;
use crate::settings::{Settings, SettingsPatch, SettingsStore};
use crate::subscription::{panic_message, Subscription, SubscriptionBus};

/// Reason used by [`ModeController::toggle`]
pub const REASON_MANUAL_TOGGLE: &str = "manual toggle";
/// Reason broadcast when a temporary override begins
pub const REASON_TEMPORARILY_FORCED: &str = "temporarily forced";
/// Reason broadcast when a temporary override ends
pub const REASON_RESTORED: &str = "restored after temporary override";
/// Reason broadcast by [`ModeController::enable_real_mode`]
pub const REASON_REAL_ENABLED: &str = "real mode enabled";

#[derive(Debug)]
struct ControllerState {
    mode: Mode,
    previous_mode: Option<Mode>,
    switch_reason: Option<String>,
    override_state: OverrideState,
    health: HealthTracker,
    critical: CriticalOperationGuard,
    settings: SettingsStore,
}

impl ControllerState {
    fn new(mode: Mode, settings: Settings, switch_reason: Option<String>) -> Self {
        Self {
            mode,
            previous_mode: None,
            switch_reason,
            override_state: OverrideState::default(),
            health: HealthTracker::new(),
            critical: CriticalOperationGuard::new(),
            settings: SettingsStore::new(settings),
        }
    }

    fn persistent(&self) -> bool {
        self.settings.current().persistent_mode_storage
    }

    fn show_notifications(&self) -> bool {
        self.settings.current().show_notifications
    }

    fn set_mode(&mut self, to: Mode, reason: &str) -> ModeChangeEvent {
        let from = self.mode;
        self.previous_mode = Some(from);
        self.mode = to;
        tracing::info!(from = %from, to = %to, reason, "operation mode changed");
        ModeChangeEvent::new(from, to, reason)
    }
}

/// A transition waiting to be broadcast once the lock is released
struct Pending {
    event: ModeChangeEvent,
    show_notifications: bool,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeStatus {
    /// Active mode
    pub mode: Mode,
    /// Mode before the last transition
    pub previous_mode: Option<Mode>,
    /// Why the controller is in DEMO mode, if it is
    pub switch_reason: Option<String>,
    /// Whether a temporary override is outstanding
    pub override_active: bool,
    /// Mode to return to when the override ends
    pub saved_mode: Option<Mode>,
    /// Connection health
    pub health: ConnectionHealth,
    /// Critical operation ids, sorted
    pub critical_operations: Vec<String>,
    /// Current settings
    pub settings: Settings,
}

/// Decides between the live backend and simulated data
pub struct ModeController {
    state: Mutex<ControllerState>,
    gateway: PersistenceGateway,
    bus: SubscriptionBus,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for ModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("state", &*self.state.lock())
            .field("subscribers", &self.bus.len())
            .finish_non_exhaustive()
    }
}

impl ModeController {
    /// Create controller in DEMO mode with the given settings
    ///
    /// Nothing is read from storage; see [`ModeController::restore`].
    #[must_use]
    pub fn new(gateway: PersistenceGateway, settings: Settings) -> Self {
        Self::from_state(gateway, ControllerState::new(Mode::Demo, settings, None))
    }

    /// Create controller seeded from storage
    ///
    /// Settings fall back to defaults. The stored mode and switch reason are
    /// only honoured when the stored settings have persistence enabled;
    /// otherwise the controller starts in DEMO.
    #[must_use]
    pub fn restore(gateway: PersistenceGateway) -> Self {
        let settings = gateway.load_settings().unwrap_or_default();
        let (mode, reason) = if settings.persistent_mode_storage {
            let mode = gateway.load_mode().unwrap_or_default();
            let reason = match mode {
                Mode::Demo => gateway.load_switch_reason(),
                Mode::Real => None,
            };
            (mode, reason)
        } else {
            (Mode::Demo, None)
        };
        tracing::info!(mode = %mode, "mode controller restored");
        Self::from_state(gateway, ControllerState::new(mode, settings, reason))
    }

    fn from_state(gateway: PersistenceGateway, state: ControllerState) -> Self {
        Self {
            state: Mutex::new(state),
            gateway,
            bus: SubscriptionBus::new(),
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// With a custom user notification surface
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ----- Mode queries -----

    /// Active mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    /// Check if simulated data is in use
    #[inline]
    #[must_use]
    pub fn is_demo_mode(&self) -> bool {
        self.mode() == Mode::Demo
    }

    /// Check if the live backend is in use
    #[inline]
    #[must_use]
    pub fn is_real_mode(&self) -> bool {
        self.mode() == Mode::Real
    }

    /// Mode before the last transition
    #[must_use]
    pub fn previous_mode(&self) -> Option<Mode> {
        self.state.lock().previous_mode
    }

    /// Why the controller last switched to DEMO
    #[must_use]
    pub fn switch_reason(&self) -> Option<String> {
        self.state.lock().switch_reason.clone()
    }

    /// Check if a temporary override is outstanding
    #[must_use]
    pub fn is_override_active(&self) -> bool {
        self.state.lock().override_state.is_active()
    }

    /// Full snapshot
    #[must_use]
    pub fn status(&self) -> ModeStatus {
        let state = self.state.lock();
        ModeStatus {
            mode: state.mode,
            previous_mode: state.previous_mode,
            switch_reason: state.switch_reason.clone(),
            override_active: state.override_state.is_active(),
            saved_mode: state.override_state.saved_mode(),
            health: state.health.health(),
            critical_operations: state.critical.ids(),
            settings: state.settings.settings(),
        }
    }

    // ----- Explicit transitions -----

    /// Switch to DEMO, recording `reason`; no-op if already DEMO
    ///
    /// Returns whether the mode changed.
    pub fn enable_demo_mode(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let pending = {
            let mut state = self.state.lock();
            self.enable_demo_locked(&mut state, reason)
        };
        self.publish(pending)
    }

    /// Switch to REAL with a fresh health record; no-op if already REAL
    ///
    /// Called during a temporary override, the override is cancelled and the
    /// forced REAL mode becomes permanent without a new broadcast.
    pub fn enable_real_mode(&self) -> bool {
        let pending = {
            let mut state = self.state.lock();
            self.enable_real_locked(&mut state, REASON_REAL_ENABLED)
        };
        self.publish(pending)
    }

    /// Switch to the opposite mode
    pub fn toggle(&self) -> bool {
        let pending = {
            let mut state = self.state.lock();
            match state.mode {
                Mode::Real => self.enable_demo_locked(&mut state, REASON_MANUAL_TOGGLE.to_string()),
                Mode::Demo => self.enable_real_locked(&mut state, REASON_MANUAL_TOGGLE),
            }
        };
        self.publish(pending)
    }

    fn enable_demo_locked(&self, state: &mut ControllerState, reason: String) -> Option<Pending> {
        if state.override_state.take().is_some() {
            tracing::debug!("explicit demo switch cancels temporary override");
        }
        if state.mode == Mode::Demo {
            return None;
        }
        let event = state.set_mode(Mode::Demo, &reason);
        if state.persistent() {
            self.gateway.save_mode(Mode::Demo);
            self.gateway.save_switch_reason(&reason);
        }
        state.switch_reason = Some(reason);
        Some(Pending {
            event,
            show_notifications: state.show_notifications(),
        })
    }

    fn enable_real_locked(&self, state: &mut ControllerState, reason: &str) -> Option<Pending> {
        if state.override_state.take().is_some() {
            tracing::debug!("explicit real switch makes temporary override permanent");
            if state.persistent() {
                self.gateway.save_mode(Mode::Real);
                self.gateway.clear_switch_reason();
            }
            state.switch_reason = None;
        }
        if state.mode == Mode::Real {
            return None;
        }
        let event = state.set_mode(Mode::Real, reason);
        state.switch_reason = None;
        state.health.mark_trusted();
        if state.persistent() {
            self.gateway.save_mode(Mode::Real);
            self.gateway.clear_switch_reason();
        }
        Some(Pending {
            event,
            show_notifications: state.show_notifications(),
        })
    }

    // ----- Temporary override -----

    /// Force REAL until [`ModeController::restore_mode`]
    ///
    /// No-op when an override is already active or the mode is already
    /// REAL. The forced mode is never written to storage.
    pub fn temporarily_force_real(&self) -> bool {
        let pending = {
            let mut state = self.state.lock();
            if state.override_state.is_active() || state.mode == Mode::Real {
                None
            } else {
                let saved = state.mode;
                state.override_state.begin(saved);
                let event = state.set_mode(Mode::Real, REASON_TEMPORARILY_FORCED);
                Some(Pending {
                    event,
                    show_notifications: state.show_notifications(),
                })
            }
        };
        self.publish(pending)
    }

    /// End the temporary override, returning to the saved mode
    pub fn restore_mode(&self) -> bool {
        let pending = {
            let mut state = self.state.lock();
            match state.override_state.take() {
                Some(saved) if saved != state.mode => {
                    let event = state.set_mode(saved, REASON_RESTORED);
                    if state.persistent() {
                        self.gateway.save_mode(saved);
                    }
                    Some(Pending {
                        event,
                        show_notifications: state.show_notifications(),
                    })
                }
                _ => None,
            }
        };
        self.publish(pending)
    }

    // ----- Critical operations -----

    /// Exempt failures reported under `id` from auto-switch
    pub fn mark_operation_as_critical(&self, id: &str) -> bool {
        let inserted = self.state.lock().critical.mark(id);
        if inserted {
            tracing::debug!(operation = id, "operation marked critical");
        }
        inserted
    }

    /// Remove the exemption for `id`
    pub fn unmark_operation_as_critical(&self, id: &str) -> bool {
        let removed = self.state.lock().critical.unmark(id);
        if removed {
            tracing::debug!(operation = id, "operation no longer critical");
        }
        removed
    }

    /// Check if `id` is exempt from auto-switch
    #[must_use]
    pub fn is_operation_critical(&self, id: &str) -> bool {
        self.state.lock().critical.contains(id)
    }

    /// Mark `id` critical for the lifetime of the returned guard
    ///
    /// If `id` was already critical the guard leaves it marked on drop.
    pub fn critical_section(&self, id: impl Into<String>) -> CriticalSection<'_> {
        let id = id.into();
        let owned = self.mark_operation_as_critical(&id);
        CriticalSection {
            controller: self,
            id,
            owned,
        }
    }

    // ----- Outcome reporting -----

    /// Record a failed backend call and apply the auto-switch policy
    ///
    /// Returns whether this failure switched the controller to DEMO.
    pub fn report_failure(&self, error: impl Into<ConnectionError>, context: &str) -> bool {
        let error = error.into();
        let pending = {
            let mut state = self.state.lock();
            let settings = state.settings.settings();
            let count = state
                .health
                .report_failure(error, settings.max_consecutive_failures);

            let over_threshold = count >= settings.max_consecutive_failures;
            if !settings.auto_switch_on_failure || !over_threshold || state.mode != Mode::Real {
                None
            } else if state.override_state.is_active() {
                tracing::debug!(context, count, "auto-switch suppressed by temporary override");
                None
            } else if state.critical.contains(context) {
                tracing::debug!(context, count, "auto-switch suppressed for critical operation");
                None
            } else {
                tracing::warn!(context, count, "backend unhealthy, switching to demo data");
                self.enable_demo_locked(&mut state, format!("{count} consecutive connection failures"))
            }
        };
        self.publish(pending)
    }

    /// Record a successful backend call; never changes the mode
    pub fn report_success(&self) {
        self.state.lock().health.report_success();
    }

    /// Copy of the connection health
    #[must_use]
    pub fn health(&self) -> ConnectionHealth {
        self.state.lock().health.health()
    }

    /// Clear health counters and the switch reason, keeping the mode
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.health.reset();
        state.switch_reason = None;
        if state.persistent() {
            self.gateway.clear_switch_reason();
        }
        tracing::debug!(mode = %state.mode, "controller health reset");
    }

    // ----- Settings -----

    /// Copy of the current settings
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.state.lock().settings.settings()
    }

    /// Apply a typed partial update, clamping numeric fields
    pub fn update_settings(&self, patch: &SettingsPatch) -> Settings {
        let mut state = self.state.lock();
        let before = state.settings.settings();
        let after = state.settings.update(patch);
        self.persist_settings(&before, &after);
        after
    }

    /// Apply an untyped partial update (e.g. from a form or the CLI)
    ///
    /// Valid fields are applied and persisted even when the result is an
    /// error naming the rejected ones.
    pub fn update_settings_from_value(&self, value: &Value) -> SettingsResult<Settings> {
        let mut state = self.state.lock();
        let before = state.settings.settings();
        let (after, result) = state.settings.update_from_value(value);
        self.persist_settings(&before, &after);
        result.map(|()| after)
    }

    /// Persist when persistence is on before or after the update, so that
    /// switching it off is itself recorded once
    fn persist_settings(&self, before: &Settings, after: &Settings) {
        if before == after {
            return;
        }
        if before.persistent_mode_storage || after.persistent_mode_storage {
            self.gateway.save_settings(after);
        }
    }

    // ----- Subscriptions -----

    /// Register a listener for every mode change
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ModeChangeEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// The underlying subscription bus
    #[inline]
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionBus {
        &self.bus
    }

    fn publish(&self, pending: Option<Pending>) -> bool {
        let Some(Pending {
            event,
            show_notifications,
        }) = pending
        else {
            return false;
        };
        self.bus.notify(&event);
        if show_notifications {
            let notifier = self.notifier.clone();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| notifier.notify(&event))) {
                tracing::warn!(panic = panic_message(panic.as_ref()), "mode change notifier panicked");
            }
        }
        true
    }
}

/// Keeps an operation critical until dropped
#[derive(Debug)]
pub struct CriticalSection<'a> {
    controller: &'a ModeController,
    id: String,
    owned: bool,
}

impl CriticalSection<'_> {
    /// Operation identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.controller.unmark_operation_as_critical(&self.id);
        }
    }
}
