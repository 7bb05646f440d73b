//! Integration tests for timed output sequencing and input polling.
//!
//! All tests run on a paused tokio clock, so durations are asserted exactly.

mod common;

use common::{BOARD_SERIAL, LogCapture, fixture_registry, small_registry};
use lockbench_core::{DutModel, PinGenerator, ScriptedDigits};
use lockbench_hardware::{HardwareError, LastKnownState, Step};
use std::time::Duration;
use tokio::time::{Instant, sleep};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[tokio::test(start_paused = true)]
async fn test_hold_scenario() {
    let (mut registry, handle) = small_registry();
    let start = Instant::now();

    registry.hold("out1", ms(150)).await.unwrap();

    assert_eq!(
        handle.events_for(0),
        vec![(start, true), (start + ms(150), false)]
    );
    assert_eq!(handle.output(0), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_hold_release_failure_is_logged_not_raised() {
    let logs = LogCapture::install();
    let (mut registry, handle) = small_registry();
    handle.fail_set_state(0, false);

    registry.hold("out1", ms(150)).await.unwrap();

    logs.assert_logged("Error turning off 'out1' during hold:");
    assert_eq!(handle.events_for(0).len(), 1);

    // Shutdown still forces the output off once the board accepts it.
    handle.clear_failures();
    drop(registry);
    assert_eq!(handle.output(0), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_sequence_scenario_pauses_once() {
    let (mut registry, handle) = small_registry();
    let start = Instant::now();
    let steps = vec![Step::from("out1"), Step::from(["out1", "out2"])];

    registry.sequence(&steps, ms(50), ms(20)).await.unwrap();

    assert_eq!(
        handle.events_for(0),
        vec![
            (start, true),
            (start + ms(50), false),
            (start + ms(70), true),
            (start + ms(120), false),
        ]
    );
    assert_eq!(
        handle.events_for(1),
        vec![(start + ms(70), true), (start + ms(120), false)]
    );
    assert_eq!(start.elapsed(), ms(120));
}

#[tokio::test(start_paused = true)]
async fn test_pulse_releases_every_channel_despite_failures() {
    let logs = LogCapture::install();
    let (mut registry, handle) = small_registry();
    handle.fail_set_state(0, false);

    registry
        .pulse_simultaneous(&["out1", "out2"], ms(30))
        .await
        .unwrap();

    logs.assert_logged("Error turning off 'out1' during simultaneous pulse:");
    assert_eq!(handle.output(1), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_pulse_stops_activating_at_first_failure() {
    let logs = LogCapture::install();
    let (mut registry, handle) = small_registry();
    let start = Instant::now();

    let err = registry
        .pulse_simultaneous(&["out1", "ghost", "out2"], ms(500))
        .await
        .unwrap_err();

    assert!(matches!(err, HardwareError::UndefinedChannel { .. }));
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(handle.events_for(0), vec![(start, true), (start, false)]);
    assert_eq!(handle.events_for(1), vec![(start, false)]);
    logs.assert_logged(
        "Error turning off 'ghost' during simultaneous pulse: Channel 'ghost' not defined.",
    );
}

#[tokio::test(start_paused = true)]
async fn test_enter_generated_pin() {
    let (mut registry, handle) = fixture_registry();
    let dut = DutModel::new();
    let mut generator = PinGenerator::with_source(&dut, ScriptedDigits::new([4, 7, 1, 6]));
    let descriptor = generator.generate_valid(4).unwrap();
    assert_eq!(descriptor.string, "4716");

    let start = Instant::now();
    registry.enter_pin(&descriptor, ms(100), ms(100)).await.unwrap();
    assert_eq!(start.elapsed(), ms(900));

    for index in [4, 7, 1, 6, 11] {
        assert_eq!(handle.events_for(index).len(), 2, "channel {index}");
    }
    assert!(handle.events_for(0).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_input_logs_and_succeeds() {
    let logs = LogCapture::install();
    let (registry, handle) = small_registry();
    let driver = handle.clone();
    tokio::spawn(async move {
        sleep(ms(75)).await;
        driver.set_input(0, true);
    });

    let reached = registry
        .wait_for_input("sense", true, ms(500), ms(50))
        .await
        .unwrap();

    assert!(reached);
    logs.assert_logged("Waiting for input 'sense' to be HIGH (timeout: 0.5s)...");
    logs.assert_logged("Input 'sense' reached state HIGH.");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_input_retries_while_detached() {
    let logs = LogCapture::install();
    let (registry, handle) = small_registry();
    handle.detach();
    let driver = handle.clone();
    tokio::spawn(async move {
        sleep(ms(120)).await;
        driver.attach();
    });

    let reached = registry
        .wait_for_input("sense", false, ms(1000), ms(50))
        .await
        .unwrap();

    assert!(reached);
    assert_eq!(
        logs.count(&format!("Input 'sense' detached. Retrying. (S/N {BOARD_SERIAL})")),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_input_timeout_reports_last_state() {
    let logs = LogCapture::install();
    let (registry, _handle) = small_registry();

    let reached = registry
        .wait_for_input("sense", true, ms(200), ms(50))
        .await
        .unwrap();

    assert!(!reached);
    logs.assert_logged("Timeout waiting for 'sense' to be HIGH. Last state: LOW.");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_input_timeout_while_detached() {
    let logs = LogCapture::install();
    let (registry, handle) = small_registry();
    handle.detach();

    let reached = registry
        .wait_for_input("sense", true, ms(100), ms(50))
        .await
        .unwrap();

    assert!(!reached);
    assert_eq!(registry.last_known_state("sense"), LastKnownState::NotAttached);
    logs.assert_logged("Timeout waiting for 'sense' to be HIGH. Last state: NOT ATTACHED.");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_undeclared_input_fails_fast() {
    let logs = LogCapture::install();
    let (registry, _handle) = small_registry();

    let err = registry
        .wait_for_input("door", true, ms(1000), ms(50))
        .await
        .unwrap_err();

    assert!(matches!(err, HardwareError::UndefinedChannel { .. }));
    logs.assert_logged("Cannot wait for 'door': Channel 'door' not defined.");
    logs.assert_not_logged("Timeout waiting for 'door'");
}
