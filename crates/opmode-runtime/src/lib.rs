//! Collaborators driven by the mode controller (opmode-runtime)
//!
//! - [`ReportingClient`]: wraps live backend calls and feeds every outcome
//!   back into the controller
//! - [`DemoSimulator`]: simulated latency and failures for DEMO mode
//! - [`ModeAwareCache`]: response cache that follows the mode signal
//! - [`DataRouter`]: picks the live or demo source per call
//! - [`ForcedReal`]: scoped temporary REAL override
//!
//! # Example
//!
//! ```rust,ignore
//! use opmode_runtime::{DataRouter, FixtureSource};
//!
//! let router = DataRouter::new(controller.clone(), live_source, Arc::new(FixtureSource::new()));
//! let audits = router.fetch("audits", "list-audits").await?;
//! ```

#![allow(missing_docs)]

pub mod cache;
pub mod client;
pub mod error;
pub mod forced;
pub mod router;
pub mod simulator;
pub mod source;

pub use cache::ModeAwareCache;
pub use client::{CallOutcome, ReportingClient};
pub use error::{RuntimeError, RuntimeResult, SourceError};
pub use forced::{with_forced_real, ForcedReal};
pub use router::DataRouter;
pub use simulator::DemoSimulator;
pub use source::{DataSource, FixtureSource};
