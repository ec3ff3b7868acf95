//! Mode controller behaviour tests
//!
//! Exercises the public controller API end to end: auto-switch, critical
//! exemptions, overrides, settings clamping and subscriptions.

use opmode_core::prelude::*;
use opmode_test_utils::{demo_controller, fail_times, real_controller, EventRecorder};
use proptest::prelude::*;

#[test]
fn test_default_scenario() {
    let controller = demo_controller();
    assert_eq!(controller.mode(), Mode::Demo);
    assert_eq!(controller.settings().max_consecutive_failures, 3);

    controller.enable_real_mode();
    assert_eq!(controller.mode(), Mode::Real);

    fail_times(&controller, 3, "x");
    assert_eq!(controller.mode(), Mode::Demo);
    assert!(controller.switch_reason().unwrap().contains('3'));

    controller.report_success();
    assert_eq!(controller.health().consecutive_errors, 0);
    assert_eq!(controller.mode(), Mode::Demo);

    controller.enable_real_mode();
    let health = controller.health();
    assert_eq!(controller.mode(), Mode::Real);
    assert_eq!(health.consecutive_errors, 0);
    assert!(health.healthy_connection);
}

#[test]
fn test_critical_sync_then_unmarked() {
    let controller = real_controller();
    let threshold = controller.settings().max_consecutive_failures;

    controller.mark_operation_as_critical("sync");
    fail_times(&controller, threshold + 2, "sync");
    assert_eq!(controller.mode(), Mode::Real);

    controller.unmark_operation_as_critical("sync");
    controller.report_success();
    fail_times(&controller, threshold + 2, "sync");
    assert_eq!(controller.mode(), Mode::Demo);
}

#[test]
fn test_settings_clamped() {
    let controller = demo_controller();
    controller.update_settings(&SettingsPatch::new().max_consecutive_failures(57));
    assert_eq!(controller.settings().max_consecutive_failures, 10);

    controller.update_settings(&SettingsPatch::new().error_simulation_rate(-5));
    assert_eq!(controller.settings().error_simulation_rate, 0);
}

#[test]
fn test_untyped_settings_report_invalid_fields() {
    let controller = demo_controller();
    let err = controller
        .update_settings_from_value(&serde_json::json!({
            "maxConsecutiveFailures": true,
            "simulatedNetworkDelay": 9000,
        }))
        .unwrap_err();
    assert_eq!(err.fields(), vec!["maxConsecutiveFailures"]);
    assert_eq!(controller.settings().simulated_network_delay, 5000);
    assert_eq!(controller.settings().max_consecutive_failures, 3);
}

#[test]
fn test_unsubscribed_callback_not_called() {
    let controller = demo_controller();
    let recorder = EventRecorder::attach(&controller);
    assert!(recorder.detach());
    controller.toggle();
    assert!(recorder.is_empty());
}

#[test]
fn test_events_carry_transition() {
    let controller = demo_controller();
    let recorder = EventRecorder::attach(&controller);
    controller.enable_real_mode();
    fail_times(&controller, 3, "fetch-checklists");

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].previous_mode, events[0].current_mode), (Mode::Demo, Mode::Real));
    assert_eq!((events[1].previous_mode, events[1].current_mode), (Mode::Real, Mode::Demo));
    assert_eq!(events[1].reason, "3 consecutive connection failures");
    assert!(events[0].timestamp <= events[1].timestamp);
}

#[test]
fn test_failures_in_demo_do_not_broadcast() {
    let controller = demo_controller();
    let recorder = EventRecorder::attach(&controller);
    fail_times(&controller, 10, "fetch");
    assert!(recorder.is_empty());
    assert_eq!(controller.health().consecutive_errors, 10);
}

fn arb_start() -> impl Strategy<Value = (bool, bool)> {
    // (start in REAL, mark "sync" critical)
    (any::<bool>(), any::<bool>())
}

proptest! {
    #[test]
    fn prop_switches_once_threshold_crossed(threshold in 1i64..=10, extra in 0u32..5) {
        let controller = real_controller();
        controller.update_settings(&SettingsPatch::new().max_consecutive_failures(threshold));
        let threshold = u32::try_from(threshold).unwrap();

        fail_times(&controller, threshold - 1, "fetch");
        prop_assert_eq!(controller.mode(), Mode::Real);

        fail_times(&controller, 1 + extra, "fetch");
        prop_assert_eq!(controller.mode(), Mode::Demo);
    }

    #[test]
    fn prop_success_resets_and_keeps_mode(failures in 0u32..20, start_real in any::<bool>()) {
        let controller = if start_real { real_controller() } else { demo_controller() };
        controller.update_settings(&SettingsPatch::new().auto_switch_on_failure(false));
        let before = controller.mode();
        fail_times(&controller, failures, "fetch");
        controller.report_success();
        prop_assert_eq!(controller.health().consecutive_errors, 0);
        prop_assert_eq!(controller.mode(), before);
    }

    #[test]
    fn prop_force_then_restore_is_identity((start_real, critical) in arb_start()) {
        let controller = if start_real { real_controller() } else { demo_controller() };
        if critical {
            controller.mark_operation_as_critical("sync");
        }
        let before = controller.mode();
        controller.temporarily_force_real();
        controller.restore_mode();
        prop_assert_eq!(controller.mode(), before);
        prop_assert!(!controller.is_override_active());
    }
}
