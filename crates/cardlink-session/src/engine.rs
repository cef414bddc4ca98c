//! The session engine task.
//!
//! One engine runs per session, owning the transport, the observer, and the
//! tokenizer. Commands arrive from the [`SwiperController`] handle over an
//! mpsc channel; transport events and timers are multiplexed into the same
//! loop, so every observer callback executes on this task in a single
//! sequence.
//!
//! Transaction outcomes are continuation-gated: once an outcome is
//! delivered, the engine refuses to arm or process another read until the
//! host signals through the outcome's [`Continuation`]. The gate is an
//! explicit flag checked before every card presentation, not an artifact of
//! callback scheduling.
//!
//! [`SwiperController`]: crate::controller::SwiperController

use crate::observer::{Continuation, SessionObserver};
use crate::registry::DeviceRegistry;
use crate::tokenizer::{AnyTokenizer, Tokenizer};
use cardlink_core::constants::{ACK_TIMEOUT, CONNECT_TIMEOUT, DEFAULT_DISPLAY_AMOUNT_MINOR};
use cardlink_core::{
    Account, CardTechnology, ConnectionState, DeviceConfig, DeviceId, ReadMode, SwiperError,
};
use cardlink_transport::{
    AnyTransport, FrameKind, HostFrame, ReaderFrame, Transport, TransportError, TransportEvent,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Commands from the controller handle (and from continuations) to the
/// engine task.
#[derive(Debug)]
pub(crate) enum Command {
    FindDevices,
    CancelFindDevices,
    Connect { id: DeviceId, mode: ReadMode },
    CancelTransaction,
    ContinuationInvoked,
    Release,
}

/// Whether the command loop keeps running.
enum Flow {
    Continue,
    Shutdown,
}

pub(crate) struct Engine {
    transport: AnyTransport,
    observer: Box<dyn SessionObserver + Send>,
    tokenizer: AnyTokenizer,
    config: Arc<Mutex<DeviceConfig>>,
    registry: DeviceRegistry,
    /// Cloned into every [`Continuation`] handed to the observer.
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    /// Fixed when a connect is accepted; meaningless before that.
    read_mode: ReadMode,
    /// The reader is armed and a card presentation is being awaited.
    armed: bool,
    /// A terminal outcome was delivered and its continuation has not fired.
    awaiting_continuation: bool,
    /// The session hit an unrecoverable error and only release remains.
    /// Shared with the controller so its entry points reject further use.
    fatal: Arc<AtomicBool>,
    /// When the current armed read times out.
    read_deadline: Option<Instant>,
}

impl Engine {
    pub(crate) fn new(
        transport: AnyTransport,
        observer: Box<dyn SessionObserver + Send>,
        tokenizer: AnyTokenizer,
        config: Arc<Mutex<DeviceConfig>>,
        cmd_tx: mpsc::UnboundedSender<Command>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
        fatal: Arc<AtomicBool>,
    ) -> Self {
        let read_mode = config.lock().expect("device config poisoned").read_mode();
        Self {
            transport,
            observer,
            tokenizer,
            config,
            registry: DeviceRegistry::new(),
            cmd_tx,
            cmd_rx,
            state_tx,
            read_mode,
            armed: false,
            awaiting_continuation: false,
            fatal,
            read_deadline: None,
        }
    }

    fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    pub(crate) async fn run(mut self) {
        loop {
            // Transport events are only meaningful while scanning or linked;
            // Connecting and Configuring drive the transport inline instead.
            let transport_live = matches!(
                self.state(),
                ConnectionState::Searching | ConnectionState::Connected
            );
            let deadline = self.read_deadline;

            tokio::select! {
                command = self.cmd_rx.recv() => {
                    let Some(command) = command else { break };
                    if matches!(self.handle_command(command).await, Flow::Shutdown) {
                        break;
                    }
                }
                event = self.transport.recv(), if transport_live => {
                    self.handle_transport_event(event).await;
                }
                () = sleep_until_deadline(deadline), if deadline.is_some() => {
                    self.handle_read_timeout();
                }
            }
        }

        if let Err(err) = self.transport.disconnect().await {
            debug!(error = %err, "transport disconnect during teardown failed");
        }
        let _ = self.state_tx.send(ConnectionState::Disconnected);
        info!("session released");
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&mut self, next: ConnectionState) {
        let prev = self.state();
        if prev == next {
            return;
        }
        debug_assert!(
            prev.can_transition_to(next),
            "illegal transition {prev} -> {next}"
        );
        self.state_tx.send_replace(next);
        info!(from = %prev, to = %next, "connection state changed");
        self.observer.connection_state_changed(next);
    }

    /// Whether `cancel_transaction` would reach an outstanding read.
    fn can_cancel(&self) -> bool {
        self.armed && !self.awaiting_continuation
    }

    fn device_config(&self) -> DeviceConfig {
        self.config.lock().expect("device config poisoned").clone()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::FindDevices => {
                self.find_devices().await;
                Flow::Continue
            }
            Command::CancelFindDevices => {
                self.cancel_find_devices().await;
                Flow::Continue
            }
            Command::Connect { id, mode } => {
                self.connect(id, mode).await;
                Flow::Continue
            }
            Command::CancelTransaction => {
                self.cancel_transaction().await;
                Flow::Continue
            }
            Command::ContinuationInvoked => {
                self.continuation_invoked().await;
                Flow::Continue
            }
            Command::Release => Flow::Shutdown,
        }
    }

    async fn find_devices(&mut self) {
        if self.is_fatal() || !self.state().is_disconnected() {
            warn!(state = %self.state(), "find_devices ignored");
            return;
        }
        self.registry.clear();
        match self.transport.start_scan().await {
            Ok(()) => self.set_state(ConnectionState::Searching),
            Err(err) => {
                let err = err.into_swiper_error();
                warn!(error = %err, "discovery failed to start");
                self.deliver_failure(err);
            }
        }
    }

    async fn cancel_find_devices(&mut self) {
        if !self.state().is_searching() {
            warn!(state = %self.state(), "cancel_find_devices ignored");
            return;
        }
        if let Err(err) = self.transport.stop_scan().await {
            debug!(error = %err, "stop_scan failed");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    async fn connect(&mut self, id: DeviceId, mode: ReadMode) {
        let state = self.state();
        if self.is_fatal()
            || !matches!(
                state,
                ConnectionState::Disconnected | ConnectionState::Searching
            )
        {
            warn!(%state, "connect_to_device ignored");
            return;
        }

        // Connecting from Searching implicitly cancels discovery.
        if state.is_searching()
            && let Err(err) = self.transport.stop_scan().await
        {
            debug!(error = %err, "stop_scan before connect failed");
        }

        self.set_state(ConnectionState::Connecting);
        info!(%id, %mode, "connecting to device");

        let connected = tokio::time::timeout(CONNECT_TIMEOUT, self.transport.connect(id, mode))
            .await
            .unwrap_or(Err(TransportError::ConnectTimeout));
        if let Err(err) = connected {
            let err = err.into_swiper_error();
            warn!(error = %err, "connection attempt failed");
            self.set_state(ConnectionState::Disconnected);
            self.deliver_failure(err);
            return;
        }

        self.read_mode = mode;
        self.set_state(ConnectionState::Connected);
        self.set_state(ConnectionState::Configuring);

        match self.apply_configuration().await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                self.arm_reader().await;
            }
            Err(err) => {
                // Any failure while configuring is session-fatal.
                error!(error = %err, "device configuration failed");
                self.fatal.store(true, Ordering::SeqCst);
                if let Err(err) = self.transport.disconnect().await {
                    debug!(error = %err, "disconnect after configuration failure failed");
                }
                self.set_state(ConnectionState::Disconnected);
                self.deliver_failure(err);
            }
        }
    }

    async fn cancel_transaction(&mut self) {
        if !self.can_cancel() {
            debug!("cancel_transaction ignored, no read outstanding");
            return;
        }
        // Best-effort: the outcome arrives later as a ReadCanceled frame,
        // if the hardware honors the request at all.
        match HostFrame::CancelRead.encode() {
            Ok(bytes) => {
                if let Err(err) = self.transport.send(bytes).await {
                    warn!(error = %err, "cancel request did not reach the reader");
                }
            }
            Err(err) => warn!(error = %err, "cancel request could not be encoded"),
        }
    }

    async fn continuation_invoked(&mut self) {
        if !self.awaiting_continuation {
            warn!("continuation invoked with no outcome pending");
            return;
        }
        self.awaiting_continuation = false;
        if self.state().is_connected() && !self.is_fatal() {
            self.arm_reader().await;
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Apply the device settings, reporting fractional progress after each
    /// acknowledgement.
    async fn apply_configuration(&mut self) -> cardlink_core::Result<()> {
        let config = self.device_config();
        let steps = [
            HostFrame::SetBeep {
                setting: config.beep(),
            },
            HostFrame::SetReadTimeout {
                seconds: config.card_read_timeout_secs(),
            },
        ];
        let total = steps.len();

        for (index, frame) in steps.into_iter().enumerate() {
            let kind = frame.kind();
            debug!(%kind, "applying configuration step");
            let bytes = frame
                .encode()
                .map_err(|e| SwiperError::configuration(e.to_string()))?;
            self.transport
                .send(bytes)
                .await
                .map_err(|e| SwiperError::configuration(e.to_string()))?;
            self.await_ack(kind).await?;

            let progress = (index + 1) as f32 / total as f32;
            self.observer.configuration_progress(progress);
        }
        Ok(())
    }

    /// Wait for the reader to acknowledge one configuration frame.
    async fn await_ack(&mut self, kind: FrameKind) -> cardlink_core::Result<()> {
        let deadline = Instant::now() + ACK_TIMEOUT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.transport.recv())
                .await
                .map_err(|_| SwiperError::configuration(format!("no acknowledgement for {kind}")))?
                .map_err(|e| SwiperError::configuration(e.to_string()))?;

            match event {
                TransportEvent::Frame(bytes) => match ReaderFrame::decode(&bytes) {
                    Ok(ReaderFrame::Ack { of }) if of == kind => return Ok(()),
                    Ok(ReaderFrame::Nak { of, reason }) => {
                        return Err(SwiperError::configuration(format!("{of} refused: {reason}")));
                    }
                    Ok(ReaderFrame::Battery { status }) => {
                        self.observer.battery_status_changed(status);
                    }
                    Ok(frame) => debug!(?frame, "frame dropped during configuration"),
                    Err(err) => warn!(error = %err, "undecodable frame dropped"),
                },
                TransportEvent::Advertisement(adv) => {
                    debug!(id = %adv.id, "advertisement dropped during configuration");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Arm the reader for one card presentation.
    async fn arm_reader(&mut self) {
        let timeout_secs = self.device_config().card_read_timeout_secs();
        let amount = self
            .observer
            .display_amount()
            .unwrap_or_else(default_display_amount);
        let frames = [
            HostFrame::ShowAmount {
                minor_units: to_minor_units(amount),
            },
            HostFrame::ArmRead {
                mode: self.read_mode,
            },
        ];

        for frame in frames {
            let bytes = match frame.encode() {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "frame could not be encoded, reader not armed");
                    return;
                }
            };
            if let Err(err) = self.transport.send(bytes).await {
                self.fatal_disconnect(err.into_swiper_error()).await;
                return;
            }
        }

        self.armed = true;
        self.read_deadline = Some(Instant::now() + Duration::from_secs(u64::from(timeout_secs)));
        debug!(mode = %self.read_mode, timeout_secs, "reader armed");
    }

    /// Clear the armed read and its timer.
    fn finish_attempt(&mut self) {
        self.armed = false;
        self.read_deadline = None;
    }

    fn handle_read_timeout(&mut self) {
        if !self.armed || self.awaiting_continuation {
            self.read_deadline = None;
            return;
        }
        info!("no card presented within the read timeout");
        self.finish_attempt();
        self.deliver_failure(SwiperError::Timeout);
    }

    async fn handle_transport_event(
        &mut self,
        event: cardlink_transport::Result<TransportEvent>,
    ) {
        match event {
            Ok(TransportEvent::Advertisement(adv)) => {
                if !self.state().is_searching() {
                    debug!(id = %adv.id, "advertisement dropped outside discovery");
                    return;
                }
                if self.registry.insert(adv).is_some() {
                    self.observer.devices_found(self.registry.devices());
                }
            }
            Ok(TransportEvent::Frame(bytes)) => match ReaderFrame::decode(&bytes) {
                Ok(frame) => self.handle_reader_frame(frame).await,
                Err(err) => warn!(error = %err, "undecodable frame dropped"),
            },
            Err(err) => {
                warn!(error = %err, "transport failed");
                self.fatal_disconnect(err.into_swiper_error()).await;
            }
        }
    }

    async fn handle_reader_frame(&mut self, frame: ReaderFrame) {
        match frame {
            ReaderFrame::Battery { status } => {
                info!(?status, "battery status changed");
                self.observer.battery_status_changed(status);
            }
            ReaderFrame::Notice { text } => {
                let cancelable = self.can_cancel();
                self.observer.display_message(&text, cancelable);
            }
            ReaderFrame::ReadCanceled => {
                if !self.can_cancel() {
                    debug!("cancel confirmation dropped, no read outstanding");
                    return;
                }
                self.finish_attempt();
                self.deliver_failure(SwiperError::CanceledTransaction);
            }
            frame @ (ReaderFrame::CardSwiped { .. }
            | ReaderFrame::CardInserted { .. }
            | ReaderFrame::ChipCardSwiped
            | ReaderFrame::ChipFault
            | ReaderFrame::BadRead) => {
                self.handle_card_presentation(frame).await;
            }
            ReaderFrame::Ack { of } => {
                debug!(%of, "acknowledgement outside configuration dropped");
            }
            ReaderFrame::Nak { of, reason } => {
                warn!(%of, %reason, "rejection outside configuration dropped");
            }
        }
    }

    async fn handle_card_presentation(&mut self, frame: ReaderFrame) {
        // The transport serializes reads, but a spurious frame can still
        // arrive while a prior outcome is pending; the gate holds either way.
        if self.awaiting_continuation || !self.armed {
            warn!("card presentation dropped while an outcome is pending");
            return;
        }
        self.finish_attempt();
        self.observer.card_read_started();

        let outcome = match frame {
            ReaderFrame::CardSwiped { card } => {
                if card.technology == CardTechnology::Chip && self.read_mode.supports_dip() {
                    // Chip-capable cards must be inserted when the reader
                    // supports dip.
                    Err(SwiperError::InsertCard)
                } else {
                    self.tokenizer.tokenize(&card).await
                }
            }
            ReaderFrame::CardInserted { card } => {
                if self.read_mode.supports_dip() {
                    self.tokenizer.tokenize(&card).await
                } else {
                    Err(SwiperError::SwipeCard)
                }
            }
            ReaderFrame::ChipCardSwiped => Err(SwiperError::InsertCard),
            ReaderFrame::ChipFault => Err(SwiperError::SwipeCard),
            ReaderFrame::BadRead => Err(SwiperError::BadCardRead),
            frame => {
                debug!(?frame, "not a card presentation");
                return;
            }
        };

        match outcome {
            Ok(account) => self.deliver_account(account),
            Err(err) => self.deliver_failure(err),
        }
    }

    // ------------------------------------------------------------------
    // Outcome delivery
    // ------------------------------------------------------------------

    fn deliver_account(&mut self, account: Account) {
        self.awaiting_continuation = true;
        info!(masked_pan = %account.masked_pan, "token generated");
        let continuation = Continuation::new(self.cmd_tx.clone());
        self.observer.token_generated(account, continuation);
    }

    fn deliver_failure(&mut self, err: SwiperError) {
        self.finish_attempt();
        self.awaiting_continuation = true;
        if err.is_recoverable() {
            info!(error = %err, code = err.code(), "attempt failed");
        } else {
            error!(error = %err, code = err.code(), "session failed");
        }
        let continuation = Continuation::new(self.cmd_tx.clone());
        self.observer.read_failed(err, continuation);
    }

    /// Tear the session down after an unrecoverable link failure.
    async fn fatal_disconnect(&mut self, err: SwiperError) {
        self.fatal.store(true, Ordering::SeqCst);
        self.finish_attempt();
        if let Err(err) = self.transport.disconnect().await {
            debug!(error = %err, "disconnect after link failure failed");
        }
        self.set_state(ConnectionState::Disconnected);
        self.deliver_failure(err);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn default_display_amount() -> Decimal {
    Decimal::new(DEFAULT_DISPLAY_AMOUNT_MINOR, 2)
}

fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or(DEFAULT_DISPLAY_AMOUNT_MINOR)
}
