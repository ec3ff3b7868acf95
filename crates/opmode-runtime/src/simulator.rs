//! Demo-data simulation
//!
//! [`DemoSimulator`] makes DEMO mode behave like a real network: it waits
//! `simulated_network_delay` milliseconds and fails `error_simulation_rate`
//! percent of calls. Both values are read from the controller's settings on
//! every call. Simulated failures are never reported back to the controller.

use opmode_core::ModeController;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RuntimeError, RuntimeResult, SourceError};

/// Simulated latency and failures for demo data
#[derive(Debug)]
pub struct DemoSimulator {
    controller: Arc<ModeController>,
    rng: Mutex<StdRng>,
}

impl DemoSimulator {
    /// Create simulator with an OS-seeded generator
    #[must_use]
    pub fn new(controller: Arc<ModeController>) -> Self {
        Self {
            controller,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create simulator with a fixed seed for reproducible runs
    #[must_use]
    pub fn with_seed(controller: Arc<ModeController>, seed: u64) -> Self {
        Self {
            controller,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Roll whether the next simulated call fails at `rate` percent
    pub fn roll_failure(&self, rate: u32) -> bool {
        match rate {
            0 => false,
            r if r >= 100 => true,
            r => self.rng.lock().random_range(0..100) < r,
        }
    }

    /// Run `produce` after the simulated delay, unless a failure is rolled
    pub async fn simulate<T, Fut>(&self, produce: Fut) -> RuntimeResult<T>
    where
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let settings = self.controller.settings();
        let delay = Duration::from_millis(settings.simulated_network_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.roll_failure(settings.error_simulation_rate) {
            tracing::debug!(rate = settings.error_simulation_rate, "simulated demo failure");
            return Err(RuntimeError::SimulatedFailure {
                rate: settings.error_simulation_rate,
            });
        }
        Ok(produce.await?)
    }
}
