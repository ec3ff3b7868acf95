//! DataRouter end-to-end flows
//!
//! A scripted live source fails on demand; the router must fall back to
//! demo fixtures once the controller auto-switches.

use async_trait::async_trait;
use opmode_core::{Mode, SettingsPatch};
use opmode_runtime::{DataRouter, DataSource, DemoSimulator, FixtureSource, SourceError};
use opmode_test_utils::{demo_controller, EventRecorder};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ScriptedLive {
    failing: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl DataSource for ScriptedLive {
    async fn fetch(&self, key: &str) -> Result<Value, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(SourceError::http(503, "notion unavailable"))
        } else {
            Ok(json!({ "source": "live", "key": key }))
        }
    }
}

fn setup() -> (DataRouter, Arc<ScriptedLive>, EventRecorder) {
    let controller = Arc::new(demo_controller());
    controller.update_settings(
        &SettingsPatch::new()
            .simulated_network_delay(0)
            .error_simulation_rate(0)
            .use_cache_in_real_mode(false),
    );
    let recorder = EventRecorder::attach(&controller);
    let live = Arc::new(ScriptedLive::default());
    let demo = Arc::new(FixtureSource::new().with_fixture("audits", json!({ "source": "demo" })));
    let simulator = DemoSimulator::with_seed(controller.clone(), 11);
    let router = DataRouter::with_simulator(controller, live.clone(), demo, simulator);
    (router, live, recorder)
}

#[tokio::test]
async fn test_demo_mode_serves_fixtures() {
    let (router, live, _) = setup();
    let value = router.fetch("audits", "list-audits").await.unwrap();
    assert_eq!(value["source"], "demo");
    assert_eq!(live.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_outage_falls_back_to_demo() {
    let (router, live, recorder) = setup();
    router.controller().enable_real_mode();

    let value = router.fetch("audits", "list-audits").await.unwrap();
    assert_eq!(value["source"], "live");

    live.failing.store(true, Ordering::SeqCst);
    for _ in 0..3 {
        let err = router.fetch("audits", "list-audits").await.unwrap_err();
        assert!(!err.is_simulated());
    }
    assert_eq!(router.controller().mode(), Mode::Demo);
    assert_eq!(recorder.reasons().last().map(String::as_str), Some("3 consecutive connection failures"));

    let value = router.fetch("audits", "list-audits").await.unwrap();
    assert_eq!(value["source"], "demo");
    assert_eq!(live.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_fetch_live_reaches_backend_from_demo() {
    let (router, live, recorder) = setup();
    let value = router.fetch_live("audits", "export").await.unwrap();
    assert_eq!(value["source"], "live");
    assert_eq!(live.calls.load(Ordering::SeqCst), 1);
    assert_eq!(router.controller().mode(), Mode::Demo);
    assert_eq!(
        recorder.reasons(),
        vec!["temporarily forced".to_string(), "restored after temporary override".to_string()]
    );
}

#[tokio::test]
async fn test_demo_cache_flushed_when_going_live() {
    let (router, _, _) = setup();
    router.controller().update_settings(&SettingsPatch::new().use_cache_in_real_mode(true));

    let demo = router.fetch("audits", "list-audits").await.unwrap();
    assert_eq!(demo["source"], "demo");

    router.controller().enable_real_mode();
    let live = router.fetch("audits", "list-audits").await.unwrap();
    assert_eq!(live["source"], "live");
}

#[tokio::test]
async fn test_fetch_many_keeps_order() {
    let (router, live, _) = setup();
    router.controller().enable_real_mode();
    let results = router.fetch_many(&["a", "b", "c"], "list-audits").await;
    let keys: Vec<Value> = results.into_iter().map(|r| r.unwrap()["key"].clone()).collect();
    assert_eq!(keys, vec![json!("a"), json!("b"), json!("c")]);
    assert_eq!(live.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_demo_fetch_does_not_leak_into_real_cache() {
    let (router, _, _) = setup();
    router.controller().update_settings(
        &SettingsPatch::new()
            .simulated_network_delay(500)
            .use_cache_in_real_mode(true),
    );
    let controller = router.controller().clone();

    let (demo, ()) = tokio::join!(router.fetch("audits", "list-audits"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.enable_real_mode();
    });
    assert_eq!(demo.unwrap()["source"], "demo");
    assert_eq!(router.controller().mode(), Mode::Real);

    let live = router.fetch("audits", "list-audits").await.unwrap();
    assert_eq!(live["source"], "live");
}
