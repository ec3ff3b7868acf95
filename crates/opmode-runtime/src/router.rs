//! Per-call choice between the live backend and demo data
//!
//! ```text
//! fetch(key) ─┬─ cache hit ───────────────────────────▶ value
//!             ├─ REAL: live source ── report outcome ─▶ value / error
//!             └─ DEMO: simulator ── fixture source ───▶ value / error
//! ```

use futures::future::join_all;
use opmode_core::{Mode, ModeController};
use serde_json::Value;
use std::sync::Arc;

use crate::cache::ModeAwareCache;
use crate::client::{CallOutcome, ReportingClient};
use crate::error::RuntimeResult;
use crate::forced::ForcedReal;
use crate::simulator::DemoSimulator;
use crate::source::DataSource;

/// Default number of cached documents
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Routes queries to the live or demo source according to the mode
pub struct DataRouter {
    client: ReportingClient,
    live: Arc<dyn DataSource>,
    demo: Arc<dyn DataSource>,
    simulator: DemoSimulator,
    cache: ModeAwareCache<Value>,
}

impl std::fmt::Debug for DataRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRouter")
            .field("mode", &self.controller().mode())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl DataRouter {
    /// Create router with default cache and an OS-seeded simulator
    #[must_use]
    pub fn new(controller: Arc<ModeController>, live: Arc<dyn DataSource>, demo: Arc<dyn DataSource>) -> Self {
        let simulator = DemoSimulator::new(controller.clone());
        Self::with_simulator(controller, live, demo, simulator)
    }

    /// Create router with a specific simulator (e.g. seeded for tests)
    #[must_use]
    pub fn with_simulator(
        controller: Arc<ModeController>,
        live: Arc<dyn DataSource>,
        demo: Arc<dyn DataSource>,
        simulator: DemoSimulator,
    ) -> Self {
        Self {
            cache: ModeAwareCache::new(controller.clone(), DEFAULT_CACHE_CAPACITY),
            client: ReportingClient::new(controller),
            live,
            demo,
            simulator,
        }
    }

    /// Controller driving the routing
    #[inline]
    #[must_use]
    pub fn controller(&self) -> &Arc<ModeController> {
        self.client.controller()
    }

    /// Response cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ModeAwareCache<Value> {
        &self.cache
    }

    /// Fetch `key`; `context` identifies the operation for critical marking
    pub async fn fetch(&self, key: &str, context: &str) -> RuntimeResult<Value> {
        if let Some(hit) = self.cache.get(key).await {
            return Ok(hit);
        }
        let outcome = self.client.call(context, || self.live.fetch(key)).await?;
        let (value, produced_under) = match outcome {
            CallOutcome::Live(value) => (value, Mode::Real),
            CallOutcome::Demo => {
                let value = self.simulator.simulate(self.demo.fetch(key)).await?;
                (value, Mode::Demo)
            }
        };
        self.cache.insert_for(produced_under, key, value.clone()).await;
        Ok(value)
    }

    /// Fetch several keys concurrently under one `context`
    ///
    /// Results keep the order of `keys`. Each key is routed on its own, so a
    /// batch that crosses the failure threshold finishes against demo data.
    pub async fn fetch_many(&self, keys: &[&str], context: &str) -> Vec<RuntimeResult<Value>> {
        join_all(keys.iter().map(|key| self.fetch(key, context))).await
    }

    /// Fetch `key` from the live source regardless of mode
    ///
    /// The result is not cached.
    pub async fn fetch_live(&self, key: &str, context: &str) -> RuntimeResult<Value> {
        let _forced = ForcedReal::begin(self.controller());
        match self.client.call(context, || self.live.fetch(key)).await? {
            CallOutcome::Live(value) => Ok(value),
            // An explicit DEMO switch landed between the override and the call
            CallOutcome::Demo => Ok(self.simulator.simulate(self.demo.fetch(key)).await?),
        }
    }
}
