//! Common test utilities for session integration tests.
//!
//! The harness registers a channel-backed observer so tests consume session
//! notifications as an ordered stream, and pairs every session with the
//! mock reader handle that scripts the device side.

#![allow(dead_code)]

use cardlink_core::{
    Account, BatteryStatus, ConnectionState, DeviceDescriptor, DeviceId, ReadMode, SwiperError,
};
use cardlink_session::{Continuation, SessionObserver, SwiperController};
use cardlink_transport::{AnyTransport, HostFrame, MockReaderHandle, MockTransport};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::mpsc;

/// Primary test card (Visa test number, Luhn-valid).
pub const VALID_PAN: &str = "4111111111111111";

/// Card number that fails the Luhn check.
pub const BAD_PAN: &str = "4111111111111112";

/// Expiry used on all test cards.
pub const EXPIRY: &str = "12/30";

/// Everything the session reported, in delivery order.
#[derive(Debug)]
pub enum Obs {
    State(ConnectionState),
    Devices(Vec<DeviceDescriptor>),
    Message(String, bool),
    Progress(f32),
    ReadStarted,
    Battery(BatteryStatus),
    Token(Account, Continuation),
    Failed(SwiperError, Continuation),
}

/// Observer that forwards every notification into an unbounded channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Obs>,
    amount: Option<Decimal>,
}

impl SessionObserver for ChannelObserver {
    fn token_generated(&mut self, account: Account, completion: Continuation) {
        let _ = self.tx.send(Obs::Token(account, completion));
    }

    fn read_failed(&mut self, error: SwiperError, completion: Continuation) {
        let _ = self.tx.send(Obs::Failed(error, completion));
    }

    fn display_message(&mut self, message: &str, cancelable: bool) {
        let _ = self.tx.send(Obs::Message(message.to_string(), cancelable));
    }

    fn devices_found(&mut self, devices: &[DeviceDescriptor]) {
        let _ = self.tx.send(Obs::Devices(devices.to_vec()));
    }

    fn connection_state_changed(&mut self, state: ConnectionState) {
        let _ = self.tx.send(Obs::State(state));
    }

    fn battery_status_changed(&mut self, status: BatteryStatus) {
        let _ = self.tx.send(Obs::Battery(status));
    }

    fn card_read_started(&mut self) {
        let _ = self.tx.send(Obs::ReadStarted);
    }

    fn configuration_progress(&mut self, progress: f32) {
        let _ = self.tx.send(Obs::Progress(progress));
    }

    fn display_amount(&mut self) -> Option<Decimal> {
        self.amount
    }
}

/// A session under test: the host-side controller, the device-side script
/// handle, and the stream of observer notifications.
pub struct Session {
    pub controller: SwiperController,
    pub reader: MockReaderHandle,
    pub events: mpsc::UnboundedReceiver<Obs>,
}

/// Build a session over a mock reader. `amount` feeds the display-amount
/// query; `None` exercises the $1.00 default.
pub fn session_with_amount(amount: Option<Decimal>) -> Session {
    let (transport, reader) = MockTransport::new();
    let (tx, events) = mpsc::unbounded_channel();
    let controller = SwiperController::builder()
        .transport(AnyTransport::Mock(transport))
        .observer(ChannelObserver { tx, amount })
        .build()
        .expect("session should build");

    Session {
        controller,
        reader,
        events,
    }
}

/// Build a session over a mock reader with the default display amount.
pub fn session() -> Session {
    session_with_amount(None)
}

/// Build a session and drive it to `Connected` (ready) in the given mode,
/// consuming the connection and configuration notifications on the way.
pub async fn ready_session(mode: ReadMode) -> (Session, DeviceId) {
    let mut s = session();
    let id = DeviceId::random();
    s.controller
        .connect_to_device(id, mode)
        .expect("connect should be accepted");
    drive_to_ready(&mut s.events).await;
    (s, id)
}

/// Consume the `Connecting, Connected, Configuring, Connected` sequence and
/// the configuration progress reports between them.
pub async fn drive_to_ready(events: &mut mpsc::UnboundedReceiver<Obs>) {
    expect_state(events, ConnectionState::Connecting).await;
    expect_state(events, ConnectionState::Connected).await;
    expect_state(events, ConnectionState::Configuring).await;
    assert_eq!(expect_progress(events).await, 0.5);
    assert_eq!(expect_progress(events).await, 1.0);
    expect_state(events, ConnectionState::Connected).await;
}

/// Receive the next notification, failing the test after two seconds.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Obs>) -> Obs {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a session notification")
        .expect("session notification channel closed")
}

/// Assert that no notification arrives within the window.
pub async fn expect_quiet(events: &mut mpsc::UnboundedReceiver<Obs>) {
    let result = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
    assert!(
        result.is_err(),
        "expected no notification, got {:?}",
        result.unwrap()
    );
}

pub async fn expect_state(events: &mut mpsc::UnboundedReceiver<Obs>, expected: ConnectionState) {
    match next_event(events).await {
        Obs::State(state) => assert_eq!(state, expected),
        other => panic!("expected state change to {expected}, got {other:?}"),
    }
}

pub async fn expect_devices(events: &mut mpsc::UnboundedReceiver<Obs>) -> Vec<DeviceDescriptor> {
    match next_event(events).await {
        Obs::Devices(devices) => devices,
        other => panic!("expected a devices-found notification, got {other:?}"),
    }
}

pub async fn expect_progress(events: &mut mpsc::UnboundedReceiver<Obs>) -> f32 {
    match next_event(events).await {
        Obs::Progress(progress) => {
            assert!((0.0..=1.0).contains(&progress));
            progress
        }
        other => panic!("expected configuration progress, got {other:?}"),
    }
}

pub async fn expect_read_started(events: &mut mpsc::UnboundedReceiver<Obs>) {
    match next_event(events).await {
        Obs::ReadStarted => {}
        other => panic!("expected a read-started notification, got {other:?}"),
    }
}

pub async fn expect_token(events: &mut mpsc::UnboundedReceiver<Obs>) -> (Account, Continuation) {
    match next_event(events).await {
        Obs::Token(account, completion) => (account, completion),
        other => panic!("expected a token outcome, got {other:?}"),
    }
}

pub async fn expect_failure(
    events: &mut mpsc::UnboundedReceiver<Obs>,
) -> (SwiperError, Continuation) {
    match next_event(events).await {
        Obs::Failed(error, completion) => (error, completion),
        other => panic!("expected a failure outcome, got {other:?}"),
    }
}

/// Poll the mock reader until it has received at least `count` host frames.
pub async fn wait_for_frames(reader: &MockReaderHandle, count: usize) -> Vec<HostFrame> {
    for _ in 0..50 {
        let frames = reader.sent_frames();
        if frames.len() >= count {
            return frames;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "reader never received {count} frames, got {:?}",
        reader.sent_frames()
    );
}
