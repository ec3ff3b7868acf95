//! Outcome-reporting wrapper for live backend calls
//!
//! Every call made through [`ReportingClient`] is reported to the
//! controller: success resets the failure counter, failure feeds the
//! auto-switch policy under the call's context id.

use opmode_core::ModeController;
use std::future::Future;
use std::sync::Arc;

use crate::error::SourceError;

/// What a call through the client produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The live backend answered
    Live(T),
    /// The controller is in DEMO mode; the backend was not called
    Demo,
}

impl<T> CallOutcome<T> {
    /// Live value, if any
    #[inline]
    pub fn live(self) -> Option<T> {
        match self {
            CallOutcome::Live(value) => Some(value),
            CallOutcome::Demo => None,
        }
    }

    /// Check if the call was skipped for DEMO mode
    #[inline]
    #[must_use]
    pub fn is_demo(&self) -> bool {
        matches!(self, CallOutcome::Demo)
    }
}

/// Wraps live backend calls and reports their outcome
#[derive(Debug, Clone)]
pub struct ReportingClient {
    controller: Arc<ModeController>,
}

impl ReportingClient {
    /// Create client reporting to `controller`
    #[inline]
    #[must_use]
    pub fn new(controller: Arc<ModeController>) -> Self {
        Self { controller }
    }

    /// Controller this client reports to
    #[inline]
    #[must_use]
    pub fn controller(&self) -> &Arc<ModeController> {
        &self.controller
    }

    /// Run `call` against the live backend unless the controller is in DEMO
    ///
    /// The error is returned unchanged after being reported.
    pub async fn call<T, F, Fut>(&self, context: &str, call: F) -> Result<CallOutcome<T>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        if self.controller.is_demo_mode() {
            return Ok(CallOutcome::Demo);
        }
        match call().await {
            Ok(value) => {
                self.controller.report_success();
                Ok(CallOutcome::Live(value))
            }
            Err(err) => {
                tracing::debug!(context, error = %err, "live call failed");
                self.controller.report_failure(err.to_connection_error(), context);
                Err(err)
            }
        }
    }

    /// Like [`ReportingClient::call`], with `context` marked critical for the
    /// whole call so failures cannot switch the mode mid-flight
    pub async fn call_critical<T, F, Fut>(
        &self,
        context: &str,
        call: F,
    ) -> Result<CallOutcome<T>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let _section = self.controller.critical_section(context);
        self.call(context, call).await
    }
}
