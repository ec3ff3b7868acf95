//! Operation-mode resilience controller (opmode-core)
//!
//! Decides, at any instant, whether the application talks to the live
//! backend ([`Mode::Real`]) or falls back to simulated data ([`Mode::Demo`]):
//! - Health tracking from reported call outcomes
//! - Automatic REAL → DEMO switch after consecutive failures
//! - Critical operations exempt from the automatic switch
//! - Temporary REAL override with restore
//! - Best-effort persistence and synchronous change subscriptions
//!
//! # Example
//!
//! ```rust
//! use opmode_core::{MemoryStore, Mode, ModeController, PersistenceGateway, Settings};
//! use std::sync::Arc;
//!
//! let gateway = PersistenceGateway::new(Arc::new(MemoryStore::new()));
//! let controller = ModeController::new(gateway, Settings::default());
//! assert_eq!(controller.mode(), Mode::Demo);
//!
//! controller.enable_real_mode();
//! for _ in 0..3 {
//!     controller.report_failure("timeout", "fetch-audits");
//! }
//! assert!(controller.is_demo_mode());
//! ```

// Core modules
pub mod controller;
pub mod critical;
pub mod error;
pub mod health;
pub mod logging;
pub mod mode;
pub mod notify;
pub mod persistence;
pub mod settings;
pub mod subscription;

// Re-exports for convenience
pub use controller::{CriticalSection, ModeController, ModeStatus};
pub use critical::CriticalOperationGuard;
pub use error::{FieldViolation, PersistenceError, PersistenceResult, SettingsResult, ValidationError};
pub use health::{ConnectionError, ConnectionHealth, HealthTracker};
pub use mode::{Mode, ModeChangeEvent, OverrideState};
pub use notify::{Notifier, TracingNotifier};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore, PersistenceGateway, StorageKey};
pub use settings::{Settings, SettingsPatch, SettingsStore};
pub use subscription::{SubscriptionBus, Subscription, SubscriptionId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the mode controller
    pub use crate::{
        ConnectionError, ConnectionHealth, Mode, ModeChangeEvent, ModeController, PersistenceGateway,
        Settings, SettingsPatch,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
