//! Persistence and startup restore tests

use opmode_core::{
    JsonFileStore, KeyValueStore, Mode, ModeController, PersistenceGateway, Settings, SettingsPatch,
};
use opmode_test_utils::{recorded_controller, StoreCall};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn test_transitions_are_persisted() {
    let (controller, store) = recorded_controller(Settings::default());
    controller.enable_real_mode();
    controller.enable_demo_mode("backend maintenance");

    assert_eq!(store.writes_to("mode"), vec!["real".to_string(), "demo".to_string()]);
    assert_eq!(store.writes_to("lastSwitchReason"), vec!["backend maintenance".to_string()]);
}

#[test]
fn test_temporary_override_is_never_persisted() {
    let (controller, store) = recorded_controller(Settings::default());
    controller.temporarily_force_real();
    assert!(store.writes_to("mode").is_empty());

    controller.restore_mode();
    assert_eq!(store.writes_to("mode"), vec!["demo".to_string()]);
}

#[test]
fn test_failing_store_is_swallowed() {
    let (controller, store) = recorded_controller(Settings::default());
    store.set_failing(true);

    assert!(controller.enable_real_mode());
    assert!(controller.is_real_mode());
    assert!(controller.toggle());
    assert!(controller.is_demo_mode());
    // Writes were attempted, just not stored
    assert!(!store.writes_to("mode").is_empty());
}

#[test]
fn test_reset_clears_stored_reason() {
    let (controller, store) = recorded_controller(Settings::default());
    controller.enable_real_mode();
    controller.enable_demo_mode("outage");
    store.clear_calls();

    controller.reset();
    assert_eq!(
        store.calls(),
        vec![StoreCall::Remove {
            key: "lastSwitchReason".into()
        }]
    );
    assert!(controller.is_demo_mode());
}

#[test]
fn test_restore_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opmode.json");

    {
        let gateway = PersistenceGateway::new(Arc::new(JsonFileStore::new(&path)));
        let controller = ModeController::restore(gateway);
        assert!(controller.is_demo_mode());
        controller.update_settings(&SettingsPatch::new().max_consecutive_failures(6));
        controller.enable_real_mode();
    }

    let gateway = PersistenceGateway::new(Arc::new(JsonFileStore::new(&path)));
    let controller = ModeController::restore(gateway);
    assert_eq!(controller.mode(), Mode::Real);
    assert_eq!(controller.settings().max_consecutive_failures, 6);
    assert_eq!(controller.switch_reason(), None);
}

#[test]
fn test_restore_demo_keeps_reason() {
    let (controller, store) = recorded_controller(Settings::default());
    controller.enable_real_mode();
    controller.enable_demo_mode("3 consecutive connection failures");

    let restored = ModeController::restore(PersistenceGateway::new(store));
    assert_eq!(restored.mode(), Mode::Demo);
    assert_eq!(
        restored.switch_reason().as_deref(),
        Some("3 consecutive connection failures")
    );
}

#[test]
fn test_restore_ignores_mode_when_persistence_was_disabled() {
    let (controller, store) = recorded_controller(Settings::default());
    controller.enable_real_mode();
    controller.update_settings(&SettingsPatch::new().persistent_mode_storage(false));

    let restored = ModeController::restore(PersistenceGateway::new(store));
    assert_eq!(restored.mode(), Mode::Demo);
    assert!(!restored.settings().persistent_mode_storage);
}

#[test]
fn test_restore_from_corrupt_storage_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opmode.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = Arc::new(JsonFileStore::new(&path));
    let controller = ModeController::restore(PersistenceGateway::new(store.clone()));
    assert_eq!(controller.mode(), Mode::Demo);
    assert_eq!(controller.settings(), Settings::default());

    // First write replaces the corrupt file
    controller.enable_real_mode();
    assert_eq!(store.get("mode").unwrap().as_deref(), Some("real"));
}

#[test]
fn test_restore_from_unreadable_store_uses_defaults() {
    let (_, store) = recorded_controller(Settings::default());
    store.set_failing(true);
    let controller = ModeController::restore(PersistenceGateway::new(store));
    assert_eq!(controller.mode(), Mode::Demo);
    assert_eq!(controller.settings(), Settings::default());
}
