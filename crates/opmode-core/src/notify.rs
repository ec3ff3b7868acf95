//! User-visible mode change notifications
//!
//! Distinct from subscriptions: a [`Notifier`] is only called when
//! `Settings::show_notifications` is on.

use crate::mode::{Mode, ModeChangeEvent};

/// Surface that tells the user about a mode change
pub trait Notifier: Send + Sync {
    /// Show the event; the payload is exactly the transition record
    fn notify(&self, event: &ModeChangeEvent);
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &ModeChangeEvent) {
        match event.current_mode {
            Mode::Demo => tracing::warn!(
                from = %event.previous_mode,
                reason = %event.reason,
                "now using demo data"
            ),
            Mode::Real => tracing::info!(
                from = %event.previous_mode,
                reason = %event.reason,
                "now connected to live backend"
            ),
        }
    }
}

impl<F> Notifier for F
where
    F: Fn(&ModeChangeEvent) + Send + Sync,
{
    fn notify(&self, event: &ModeChangeEvent) {
        self(event);
    }
}
