//! Testing utilities for the opmode workspace
//!
//! Shared stores, event recorders and pre-configured controllers.

#![allow(missing_docs)]

use opmode_core::{
    KeyValueStore, MemoryStore, ModeChangeEvent, ModeController, PersistenceError, PersistenceGateway,
    PersistenceResult, Settings, Subscription,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One call observed by [`RecordingStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Set { key: String, value: String },
    Remove { key: String },
}

/// Memory store that records every write and can be switched to fail
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    failing: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent operation fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Values written under `key`, in order
    pub fn writes_to(&self, key: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StoreCall::Set { key: k, value } if k == key => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn check(&self) -> PersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable("recording store set to fail".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.calls.lock().push(StoreCall::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        self.calls.lock().push(StoreCall::Remove { key: key.to_string() });
        self.check()?;
        self.inner.remove(key)
    }
}

/// Collects every broadcast event
#[derive(Debug, Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<ModeChangeEvent>>>,
    subscription: Subscription,
}

impl EventRecorder {
    pub fn attach(controller: &ModeController) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = controller.subscribe(move |event| sink.lock().push(event.clone()));
        Self { events, subscription }
    }

    pub fn events(&self) -> Vec<ModeChangeEvent> {
        self.events.lock().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.reason.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn detach(&self) -> bool {
        self.subscription.unsubscribe()
    }
}

/// Controller over a fresh memory store with default settings
pub fn demo_controller() -> ModeController {
    ModeController::new(PersistenceGateway::in_memory(), Settings::default())
}

/// Controller already switched to REAL
pub fn real_controller() -> ModeController {
    let controller = demo_controller();
    controller.enable_real_mode();
    controller
}

/// Controller wired to a [`RecordingStore`]
pub fn recorded_controller(settings: Settings) -> (ModeController, Arc<RecordingStore>) {
    let store = RecordingStore::new();
    let controller = ModeController::new(PersistenceGateway::new(store.clone()), settings);
    (controller, store)
}

/// Report `count` failures under `context`
pub fn fail_times(controller: &ModeController, count: u32, context: &str) {
    for i in 0..count {
        controller.report_failure(format!("simulated failure #{}", i + 1), context);
    }
}
