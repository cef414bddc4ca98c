//! Session lifecycle integration tests: connection, configuration, failure
//! fatality, and teardown.

mod common;

use cardlink_core::{BeepSetting, ConnectionState, DeviceId, ReadMode, SwiperError};
use cardlink_transport::{HostFrame, TransportError};
use common::*;
use std::time::Duration;

#[tokio::test]
async fn connect_runs_the_documented_state_sequence() {
    let (s, _id) = ready_session(ReadMode::SwipeAndDip).await;
    assert_eq!(s.controller.connection_state(), ConnectionState::Connected);
    assert_eq!(s.controller.current_read_mode(), ReadMode::SwipeAndDip);
}

#[tokio::test]
async fn configuration_applies_settings_then_arms_the_reader() {
    let (s, _id) = ready_session(ReadMode::SwipeAndDip).await;

    let frames = wait_for_frames(&s.reader, 4).await;
    assert_eq!(
        frames,
        vec![
            HostFrame::SetBeep {
                setting: BeepSetting::Long800ms,
            },
            HostFrame::SetReadTimeout { seconds: 60 },
            HostFrame::ShowAmount { minor_units: 100 },
            HostFrame::ArmRead {
                mode: ReadMode::SwipeAndDip,
            },
        ]
    );
}

#[tokio::test]
async fn configured_properties_reach_the_device() {
    let mut s = session();
    s.controller.set_beep_setting(BeepSetting::Double);
    s.controller.set_card_read_timeout_secs(30);

    s.controller
        .connect_to_device(DeviceId::random(), ReadMode::SwipeOnly)
        .unwrap();
    drive_to_ready(&mut s.events).await;

    let frames = wait_for_frames(&s.reader, 2).await;
    assert_eq!(
        frames[0],
        HostFrame::SetBeep {
            setting: BeepSetting::Double,
        }
    );
    assert_eq!(frames[1], HostFrame::SetReadTimeout { seconds: 30 });
}

#[tokio::test]
async fn timeout_writes_out_of_range_are_silently_ignored() {
    let (s, _id) = ready_session(ReadMode::SwipeAndDip).await;

    // 70000 exceeds even the swipe-and-dip ceiling of 65535.
    s.controller.set_card_read_timeout_secs(70000);
    assert_eq!(s.controller.card_read_timeout_secs(), 60);

    assert!(!s.controller.try_set_card_read_timeout_secs(0));
    assert!(s.controller.try_set_card_read_timeout_secs(65535));
    assert_eq!(s.controller.card_read_timeout_secs(), 65535);
}

#[tokio::test]
async fn connect_refusal_reports_connection_error_and_disconnects() {
    let mut s = session();
    s.reader
        .refuse_connect(TransportError::link_lost("pairing rejected"));

    s.controller
        .connect_to_device(DeviceId::random(), ReadMode::SwipeOnly)
        .unwrap();

    expect_state(&mut s.events, ConnectionState::Connecting).await;
    expect_state(&mut s.events, ConnectionState::Disconnected).await;
    let (error, completion) = expect_failure(&mut s.events).await;
    assert_eq!(error.code(), 105);
    assert!(!error.is_recoverable());
    completion.invoke();
}

#[tokio::test]
async fn dip_request_to_swipe_only_hardware_is_unsupported_mode() {
    let mut s = session();
    s.reader.set_supports_dip(false);

    s.controller
        .connect_to_device(DeviceId::random(), ReadMode::SwipeAndDip)
        .unwrap();

    expect_state(&mut s.events, ConnectionState::Connecting).await;
    expect_state(&mut s.events, ConnectionState::Disconnected).await;
    let (error, _completion) = expect_failure(&mut s.events).await;
    assert_eq!(
        error,
        SwiperError::UnsupportedMode {
            mode: ReadMode::SwipeAndDip,
        }
    );
}

#[tokio::test]
async fn configuration_failure_is_session_fatal() {
    let mut s = session();
    s.reader.fail_configuration();

    s.controller
        .connect_to_device(DeviceId::random(), ReadMode::SwipeOnly)
        .unwrap();

    expect_state(&mut s.events, ConnectionState::Connecting).await;
    expect_state(&mut s.events, ConnectionState::Connected).await;
    expect_state(&mut s.events, ConnectionState::Configuring).await;
    expect_state(&mut s.events, ConnectionState::Disconnected).await;

    let (error, _completion) = expect_failure(&mut s.events).await;
    assert_eq!(error.code(), 108);
    assert!(!s.reader.is_connected());

    // The session object is terminal; entry points reject further use.
    let err = s.controller.find_devices().unwrap_err();
    assert!(matches!(err, SwiperError::ConfigurationError { .. }));
}

#[tokio::test]
async fn link_loss_disconnects_before_the_failure_callback() {
    let (mut s, _id) = ready_session(ReadMode::SwipeOnly).await;

    s.reader.drop_link("reader powered off").await.unwrap();

    // State change first, then the failure belonging to the new state.
    expect_state(&mut s.events, ConnectionState::Disconnected).await;
    let (error, completion) = expect_failure(&mut s.events).await;
    assert_eq!(error.code(), 105);

    // The continuation cannot resurrect a dead session: no re-arm happens.
    let armed_before = arm_count(&s.reader.sent_frames());
    completion.invoke();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(arm_count(&s.reader.sent_frames()), armed_before);

    let err = s.controller.cancel_transaction().unwrap_err();
    assert!(matches!(err, SwiperError::ConfigurationError { .. }));
}

#[tokio::test]
async fn release_tears_down_the_transport() {
    let (s, _id) = ready_session(ReadMode::SwipeOnly).await;
    assert!(s.reader.is_connected());

    s.controller.release_device().unwrap();

    // The engine disconnects on its way out.
    for _ in 0..50 {
        if !s.reader.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!s.reader.is_connected());

    let err = s.controller.connect_to_device(DeviceId::random(), ReadMode::SwipeOnly);
    assert!(err.is_err());
}

#[tokio::test]
async fn dropping_the_controller_releases_the_transport() {
    let (s, _id) = ready_session(ReadMode::SwipeOnly).await;
    let reader = s.reader.clone();
    assert!(reader.is_connected());

    drop(s);

    for _ in 0..50 {
        if !reader.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!reader.is_connected());
}

#[tokio::test]
async fn battery_status_is_forwarded_while_connected() {
    use cardlink_core::BatteryStatus;

    let (mut s, _id) = ready_session(ReadMode::SwipeOnly).await;
    s.reader.set_battery(BatteryStatus::Low).await.unwrap();

    match next_event(&mut s.events).await {
        Obs::Battery(status) => assert_eq!(status, BatteryStatus::Low),
        other => panic!("expected a battery notification, got {other:?}"),
    }
}

fn arm_count(frames: &[HostFrame]) -> usize {
    frames
        .iter()
        .filter(|f| matches!(f, HostFrame::ArmRead { .. }))
        .count()
}
