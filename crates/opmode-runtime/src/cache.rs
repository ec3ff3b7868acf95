//! Response cache that follows the mode signal
//!
//! Active in DEMO mode always, and in REAL mode only while
//! `use_cache_in_real_mode` is on. Every mode change flushes the cache so
//! demo documents never answer live queries and vice versa.
//!
//! The flush runs after the switch becomes visible, and a slow fetch may
//! finish after the flush. Entries are therefore keyed by the mode they were
//! produced under: lookups only see the current mode's entries, and inserts
//! for a mode that is no longer current are dropped.

use moka::future::Cache;
use opmode_core::{Mode, ModeController, Subscription};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Keyed response cache gated by the controller
pub struct ModeAwareCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<(Mode, String), V>,
    controller: Arc<ModeController>,
    subscription: Subscription,
}

impl<V> std::fmt::Debug for ModeAwareCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeAwareCache")
            .field("entry_count", &self.inner.entry_count())
            .field("active", &self.is_active())
            .finish()
    }
}

impl<V> ModeAwareCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create cache with max capacity
    #[must_use]
    pub fn new(controller: Arc<ModeController>, max_capacity: u64) -> Self {
        Self::from_cache(controller, Cache::new(max_capacity))
    }

    /// Create cache with time-based expiration
    #[must_use]
    pub fn with_ttl(controller: Arc<ModeController>, max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self::from_cache(controller, inner)
    }

    fn from_cache(controller: Arc<ModeController>, inner: Cache<(Mode, String), V>) -> Self {
        let flush = inner.clone();
        let subscription = controller.subscribe(move |event| {
            tracing::debug!(to = %event.current_mode, "flushing response cache on mode change");
            flush.invalidate_all();
        });
        Self {
            inner,
            controller,
            subscription,
        }
    }

    /// Check if lookups and inserts currently take effect
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_in(self.controller.mode())
    }

    fn is_active_in(&self, mode: Mode) -> bool {
        mode == Mode::Demo || self.controller.settings().use_cache_in_real_mode
    }

    /// Cached value for the current mode, if active and present
    pub async fn get(&self, key: &str) -> Option<V> {
        let mode = self.controller.mode();
        if !self.is_active_in(mode) {
            return None;
        }
        self.inner.get(&(mode, key.to_string())).await
    }

    /// Store value produced under the current mode
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_for(self.controller.mode(), key, value).await;
    }

    /// Store value produced under `mode`
    ///
    /// Dropped when the controller has since left `mode`.
    pub async fn insert_for(&self, mode: Mode, key: impl Into<String>, value: V) {
        if mode != self.controller.mode() {
            tracing::debug!(produced_under = %mode, "discarding cache insert from previous mode");
            return;
        }
        if self.is_active_in(mode) {
            self.inner.insert((mode, key.into()), value).await;
        }
    }

    /// Get or compute value; errors are not cached
    pub async fn try_get_or_insert_with<E, F, Fut>(&self, key: &str, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mode = self.controller.mode();
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }
        let value = f().await?;
        self.insert_for(mode, key, value.clone()).await;
        Ok(value)
    }

    /// Drop one key in every mode
    pub async fn invalidate(&self, key: &str) {
        for mode in [Mode::Real, Mode::Demo] {
            self.inner.invalidate(&(mode, key.to_string())).await;
        }
    }

    /// Drop everything
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate entry count
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl<V> Drop for ModeAwareCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opmode_core::{PersistenceGateway, Settings, SettingsPatch};

    fn controller() -> Arc<ModeController> {
        Arc::new(ModeController::new(PersistenceGateway::in_memory(), Settings::default()))
    }

    #[tokio::test]
    async fn caches_in_demo_mode() {
        let cache = ModeAwareCache::new(controller(), 100);
        cache.insert("audits", 3u32).await;
        assert_eq!(cache.get("audits").await, Some(3));
    }

    #[tokio::test]
    async fn real_mode_respects_setting() {
        let controller = controller();
        controller.enable_real_mode();
        let cache = ModeAwareCache::new(controller.clone(), 100);
        assert!(cache.is_active());

        controller.update_settings(&SettingsPatch::new().use_cache_in_real_mode(false));
        assert!(!cache.is_active());
        cache.insert("audits", 1u32).await;
        assert_eq!(cache.get("audits").await, None);
    }

    #[tokio::test]
    async fn mode_change_flushes() {
        let controller = controller();
        let cache = ModeAwareCache::new(controller.clone(), 100);
        cache.insert("audits", 1u32).await;
        controller.enable_real_mode();
        assert_eq!(cache.get("audits").await, None);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = ModeAwareCache::new(controller(), 100);
        let first: Result<u32, &str> = cache.try_get_or_insert_with("k", || async { Err("down") }).await;
        assert!(first.is_err());
        let second: Result<u32, &str> = cache.try_get_or_insert_with("k", || async { Ok(5) }).await;
        assert_eq!(second, Ok(5));
        let third: Result<u32, &str> = cache.try_get_or_insert_with("k", || async { Ok(9) }).await;
        assert_eq!(third, Ok(5));
    }

    #[tokio::test]
    async fn insert_from_left_mode_is_dropped() {
        let controller = controller();
        let cache = ModeAwareCache::new(controller.clone(), 100);
        controller.enable_real_mode();
        cache.insert_for(Mode::Demo, "audits", 1u32).await;
        assert_eq!(cache.get("audits").await, None);

        cache.insert_for(Mode::Real, "audits", 2u32).await;
        assert_eq!(cache.get("audits").await, Some(2));
    }

    #[tokio::test]
    async fn entries_are_scoped_to_their_mode() {
        let controller = controller();
        let cache = ModeAwareCache::new(controller.clone(), 100);
        cache.insert("audits", 1u32).await;
        // Detach the flush so only mode scoping protects REAL lookups
        assert!(cache.subscription.unsubscribe());
        controller.enable_real_mode();
        assert_eq!(cache.get("audits").await, None);
        controller.enable_demo_mode("back");
        assert_eq!(cache.get("audits").await, Some(1));
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let controller = controller();
        let cache: ModeAwareCache<u32> = ModeAwareCache::new(controller.clone(), 10);
        assert_eq!(controller.subscriptions().len(), 1);
        drop(cache);
        assert!(controller.subscriptions().is_empty());
    }
}
