//! Scoped temporary REAL override
//!
//! For one-off operations that must reach the live backend whatever the
//! current mode. The override ends when the guard drops, including when the
//! surrounding future is cancelled.

use opmode_core::ModeController;
use std::future::Future;

/// Holds a temporary REAL override until dropped
#[derive(Debug)]
pub struct ForcedReal<'a> {
    controller: &'a ModeController,
    started: bool,
}

impl<'a> ForcedReal<'a> {
    /// Start an override
    ///
    /// Only the guard that actually started the override restores on drop;
    /// if the mode was already REAL or another override is outstanding the
    /// guard does nothing.
    pub fn begin(controller: &'a ModeController) -> Self {
        let started = controller.temporarily_force_real();
        Self { controller, started }
    }

    /// Check if this guard owns the override
    #[inline]
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }
}

impl Drop for ForcedReal<'_> {
    fn drop(&mut self) {
        if self.started {
            self.controller.restore_mode();
        }
    }
}

/// Run `fut` with the controller forced to REAL
pub async fn with_forced_real<F, T>(controller: &ModeController, fut: F) -> T
where
    F: Future<Output = T>,
{
    let _guard = ForcedReal::begin(controller);
    fut.await
}
