//! Mock transport implementation for testing and development.
//!
//! This module provides an emulated reader that can be driven
//! programmatically, standing in for a physical BLE or audio-jack device.
//! The transport half is handed to the session engine; the handle half stays
//! with the test (or demo) and scripts what the reader does: advertise,
//! present cards, report battery, drop the link.
//!
//! The emulated reader acknowledges configuration frames on its own (or
//! rejects them when [`MockReaderHandle::fail_configuration`] is armed) and
//! honors [`HostFrame::CancelRead`] with a [`ReaderFrame::ReadCanceled`].

use crate::error::{Result, TransportError};
use crate::traits::{Advertisement, Transport, TransportEvent};
use crate::wire::{HostFrame, ReaderFrame};
use bytes::Bytes;
use cardlink_core::constants::MOCK_EVENT_CHANNEL_CAPACITY;
use cardlink_core::{BatteryStatus, CardData, DeviceId, ReadMode};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::trace;

/// Scripted events flowing from the handle (and the auto-responder) into
/// the transport.
#[derive(Debug)]
enum ScriptEvent {
    Advertise(Advertisement),
    Reader(ReaderFrame),
    DropLink(String),
}

/// State shared between the transport and its controlling handle.
#[derive(Debug)]
struct SharedState {
    scanning: bool,
    connected: bool,
    supports_dip: bool,
    refuse_connect: Option<TransportError>,
    fail_configuration: bool,
    sent: Vec<HostFrame>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            scanning: false,
            connected: false,
            supports_dip: true,
            refuse_connect: None,
            fail_configuration: false,
            sent: Vec::new(),
        }
    }
}

/// Emulated reader transport.
///
/// # Examples
///
/// ```
/// use cardlink_transport::{MockTransport, Transport, TransportEvent};
/// use cardlink_core::{CardData, DeviceId, ReadMode};
///
/// #[tokio::main]
/// async fn main() -> cardlink_transport::Result<()> {
///     let (mut transport, handle) = MockTransport::new();
///
///     transport.connect(DeviceId::random(), ReadMode::SwipeOnly).await?;
///     handle.present_swipe(CardData::swiped("4111111111111111", "12/30")).await?;
///
///     let event = transport.recv().await?;
///     assert!(matches!(event, TransportEvent::Frame(_)));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<SharedState>>,
    event_rx: mpsc::Receiver<ScriptEvent>,
    /// Sender used by the auto-responder in [`send`](Transport::send).
    /// Keeping it alive also keeps `recv` pending (instead of failing)
    /// after the handle is dropped.
    loopback_tx: mpsc::Sender<ScriptEvent>,
}

impl MockTransport {
    /// Create a new emulated reader.
    ///
    /// Returns the transport (for the session engine) and the handle that
    /// scripts the reader's behavior.
    pub fn new() -> (Self, MockReaderHandle) {
        let (event_tx, event_rx) = mpsc::channel(MOCK_EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Mutex::new(SharedState::new()));

        let transport = Self {
            shared: Arc::clone(&shared),
            event_rx,
            loopback_tx: event_tx.clone(),
        };

        let handle = MockReaderHandle { shared, event_tx };

        (transport, handle)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.shared.lock().expect("mock reader state poisoned")
    }

    /// The reader's unprompted reaction to a host frame, if any.
    fn auto_response(&self, frame: &HostFrame) -> Option<ReaderFrame> {
        match frame {
            HostFrame::SetBeep { .. } | HostFrame::SetReadTimeout { .. } | HostFrame::ArmRead { .. } => {
                if self.state().fail_configuration {
                    Some(ReaderFrame::Nak {
                        of: frame.kind(),
                        reason: "refused by reader".to_string(),
                    })
                } else {
                    Some(ReaderFrame::Ack { of: frame.kind() })
                }
            }
            HostFrame::CancelRead => Some(ReaderFrame::ReadCanceled),
            HostFrame::ShowAmount { .. } => None,
        }
    }
}

impl Transport for MockTransport {
    async fn start_scan(&mut self) -> Result<()> {
        self.state().scanning = true;
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        self.state().scanning = false;
        Ok(())
    }

    async fn connect(&mut self, id: DeviceId, mode: ReadMode) -> Result<()> {
        {
            let mut state = self.state();
            if let Some(err) = state.refuse_connect.take() {
                return Err(err);
            }
            if mode.supports_dip() && !state.supports_dip {
                return Err(TransportError::UnsupportedMode { mode });
            }
            state.scanning = false;
            state.connected = true;
        }
        trace!(%id, %mode, "mock reader connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.scanning = false;
        Ok(())
    }

    async fn send(&mut self, frame: Bytes) -> Result<()> {
        let frame = HostFrame::decode(&frame)?;
        if !self.state().connected {
            return Err(TransportError::NotConnected);
        }
        trace!(?frame, "mock reader received frame");

        let response = self.auto_response(&frame);
        self.state().sent.push(frame);

        if let Some(response) = response {
            self.loopback_tx
                .send(ScriptEvent::Reader(response))
                .await
                .map_err(|_| TransportError::ChannelClosed)?;
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<TransportEvent> {
        loop {
            let event = self
                .event_rx
                .recv()
                .await
                .ok_or(TransportError::ChannelClosed)?;

            match event {
                ScriptEvent::Advertise(adv) => {
                    if self.state().scanning {
                        return Ok(TransportEvent::Advertisement(adv));
                    }
                    trace!(id = %adv.id, "advertisement dropped, not scanning");
                }
                ScriptEvent::Reader(frame) => {
                    if self.state().connected {
                        return Ok(TransportEvent::Frame(frame.encode()?));
                    }
                    trace!(?frame, "reader frame dropped, not connected");
                }
                ScriptEvent::DropLink(message) => {
                    self.state().connected = false;
                    return Err(TransportError::LinkLost { message });
                }
            }
        }
    }
}

/// Handle for scripting an emulated reader.
///
/// Cheap to clone; all clones drive the same reader.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    shared: Arc<Mutex<SharedState>>,
    event_tx: mpsc::Sender<ScriptEvent>,
}

impl MockReaderHandle {
    fn state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.shared.lock().expect("mock reader state poisoned")
    }

    async fn push(&self, event: ScriptEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Broadcast an advertisement. Delivered only while the transport is
    /// scanning.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn advertise(&self, name: impl Into<String>, id: DeviceId) -> Result<()> {
        self.push(ScriptEvent::Advertise(Advertisement::new(name, id)))
            .await
    }

    /// Present a card swipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn present_swipe(&self, card: CardData) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::CardSwiped { card }))
            .await
    }

    /// Present a card insertion.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn present_insert(&self, card: CardData) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::CardInserted { card }))
            .await
    }

    /// Present a chip card swiped instead of inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn present_chip_swiped(&self) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::ChipCardSwiped)).await
    }

    /// Present a chip that could not be read during insertion.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn present_chip_fault(&self) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::ChipFault)).await
    }

    /// Present an unreadable stripe.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn present_bad_read(&self) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::BadRead)).await
    }

    /// Report a battery condition.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn set_battery(&self, status: BatteryStatus) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::Battery { status }))
            .await
    }

    /// Show a free-form device message.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn notice(&self, text: impl Into<String>) -> Result<()> {
        self.push(ScriptEvent::Reader(ReaderFrame::Notice { text: text.into() }))
            .await
    }

    /// Drop the link. The transport's next `recv` fails with `LinkLost`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub async fn drop_link(&self, reason: impl Into<String>) -> Result<()> {
        self.push(ScriptEvent::DropLink(reason.into())).await
    }

    /// Make the next connect attempt fail with the given error.
    pub fn refuse_connect(&self, error: TransportError) {
        self.state().refuse_connect = Some(error);
    }

    /// Make the reader reject configuration frames with a Nak.
    pub fn fail_configuration(&self) {
        self.state().fail_configuration = true;
    }

    /// Control whether the reader accepts swipe-and-dip connections.
    /// Defaults to `true`.
    pub fn set_supports_dip(&self, supported: bool) {
        self.state().supports_dip = supported;
    }

    /// Host frames the reader has received, in order.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<HostFrame> {
        self.state().sent.clone()
    }

    /// Whether the transport currently holds a link.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Whether the transport is currently scanning.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state().scanning
    }
}
