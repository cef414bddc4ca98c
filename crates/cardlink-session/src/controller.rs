//! The host-facing session handle.
//!
//! A [`SwiperController`] is one connect-to-disconnect lifetime of a device
//! handle. It is constructed through [`SwiperController::builder`] with a
//! transport, an observer, and optionally a tokenizer; construction spawns
//! the engine task that owns all three.
//!
//! # Lifecycle
//!
//! 1. `find_devices()` to discover readers (or skip straight to connect with
//!    a known identifier)
//! 2. `connect_to_device(id, mode)` — the read mode is fixed here for the
//!    life of the session
//! 3. Card reads are driven by physical presentation; outcomes arrive at the
//!    observer
//! 4. `release_device()` when done
//!
//! Release is the sanctioned teardown: it stops the engine, drops the
//! observer, and disconnects the transport. Dropping the controller issues a
//! best-effort release so the transport is reclaimed on every exit path.

use crate::engine::{Command, Engine};
use crate::observer::SessionObserver;
use crate::tokenizer::{AnyTokenizer, MockTokenizer};
use cardlink_core::{
    BeepSetting, ConnectionState, DeviceConfig, DeviceId, ReadMode, Result, SwiperError,
};
use cardlink_transport::AnyTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Handle to one swiper session.
///
/// All entry points are non-blocking: they enqueue work for the engine task
/// and their effects are observed through the registered
/// [`SessionObserver`]. Misuse (an operation invalid in the current state,
/// or any operation after release) is reported as a configuration error
/// from the entry point itself.
pub struct SwiperController {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    config: Arc<Mutex<DeviceConfig>>,
    released: AtomicBool,
    fatal: Arc<AtomicBool>,
}

impl SwiperController {
    /// Start building a session.
    #[must_use]
    pub fn builder() -> SwiperControllerBuilder {
        SwiperControllerBuilder::default()
    }

    fn config(&self) -> std::sync::MutexGuard<'_, DeviceConfig> {
        self.config.lock().expect("device config poisoned")
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(SwiperError::configuration(
                "operation on a released session",
            ));
        }
        if self.fatal.load(Ordering::SeqCst) {
            return Err(SwiperError::configuration(
                "session failed and must be recreated",
            ));
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| SwiperError::configuration("session engine has stopped"))
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Begin an asynchronous, cancellable device scan.
    ///
    /// Discovered devices arrive incrementally at
    /// [`SessionObserver::devices_found`], deduplicated by identifier.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the session is not disconnected or
    /// has been released.
    pub fn find_devices(&self) -> Result<()> {
        self.ensure_live()?;
        let state = self.connection_state();
        if !state.is_disconnected() {
            return Err(SwiperError::configuration(format!(
                "find_devices is not valid while {state}"
            )));
        }
        self.send(Command::FindDevices)
    }

    /// Halt a running device scan.
    ///
    /// Best-effort and non-blocking; the effect is observed as a
    /// `Disconnected` state change.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no scan is running or the session
    /// has been released.
    pub fn cancel_find_devices(&self) -> Result<()> {
        self.ensure_live()?;
        let state = self.connection_state();
        if !state.is_searching() {
            return Err(SwiperError::configuration(format!(
                "cancel_find_devices is not valid while {state}"
            )));
        }
        self.send(Command::CancelFindDevices)
    }

    /// Connect to a discovered (or already known) device.
    ///
    /// Valid from `Disconnected` with a known identifier, or while
    /// `Searching` (which implicitly cancels discovery). The read mode is
    /// fixed here and immutable for the life of the session; if the current
    /// card read timeout exceeds the new mode's maximum it is clamped down.
    ///
    /// The host should treat interaction as disabled for the `Connecting`
    /// and `Configuring` states that follow.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the session is already connected or
    /// has been released.
    pub fn connect_to_device(&self, id: DeviceId, mode: ReadMode) -> Result<()> {
        self.ensure_live()?;
        let state = self.connection_state();
        if !matches!(
            state,
            ConnectionState::Disconnected | ConnectionState::Searching
        ) {
            return Err(SwiperError::configuration(format!(
                "connect_to_device is not valid while {state}"
            )));
        }
        self.config().set_read_mode(mode);
        self.send(Command::Connect { id, mode })
    }

    /// Request cancellation of an outstanding card read.
    ///
    /// Best-effort: hardware may not honor mid-read cancellation, and the
    /// only observable effect is a later `CanceledTransaction` outcome.
    /// Reserve this for recovering from an unresponsive reader (a card
    /// physically stuck, for instance) rather than routine flow control.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the session has been released.
    pub fn cancel_transaction(&self) -> Result<()> {
        self.ensure_live()?;
        self.send(Command::CancelTransaction)
    }

    /// Tear the session down.
    ///
    /// Stops the engine, unregisters the observer, and releases the
    /// transport. Must be called before the controller is discarded; after
    /// release every other operation is a programming error. Calling
    /// release again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the engine already stopped on its
    /// own.
    pub fn release_device(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.send(Command::Release)
    }

    // ------------------------------------------------------------------
    // Configuration properties
    // ------------------------------------------------------------------

    /// Configured beep setting.
    #[must_use]
    pub fn beep_setting(&self) -> BeepSetting {
        self.config().beep()
    }

    /// Set the beep setting applied at the next device configuration.
    pub fn set_beep_setting(&self, beep: BeepSetting) {
        self.config().set_beep(beep);
    }

    /// Configured card read timeout in seconds.
    #[must_use]
    pub fn card_read_timeout_secs(&self) -> u32 {
        self.config().card_read_timeout_secs()
    }

    /// Set the card read timeout.
    ///
    /// Out-of-bounds values (zero, or above the current read mode's
    /// maximum) are ignored and the previous value is kept; use
    /// [`try_set_card_read_timeout_secs`] to learn whether a write was
    /// accepted.
    ///
    /// [`try_set_card_read_timeout_secs`]: SwiperController::try_set_card_read_timeout_secs
    pub fn set_card_read_timeout_secs(&self, secs: u32) {
        if !self.config().try_set_card_read_timeout_secs(secs) {
            warn!(secs, "card read timeout out of range, keeping previous value");
        }
    }

    /// Set the card read timeout, reporting whether it was accepted.
    pub fn try_set_card_read_timeout_secs(&self, secs: u32) -> bool {
        self.config().try_set_card_read_timeout_secs(secs)
    }

    /// The read mode the session is (or will be) connected with.
    #[must_use]
    pub fn current_read_mode(&self) -> ReadMode {
        self.config().read_mode()
    }
}

impl Drop for SwiperController {
    fn drop(&mut self) {
        // Best-effort release so the transport is reclaimed even when the
        // host forgets (or panics before) release_device.
        if !self.released.swap(true, Ordering::SeqCst) {
            let _ = self.cmd_tx.send(Command::Release);
        }
    }
}

/// Builder for [`SwiperController`].
///
/// # Examples
///
/// ```no_run
/// use cardlink_session::SwiperController;
/// use cardlink_transport::{AnyTransport, MockTransport};
/// # struct HostObserver;
/// # impl cardlink_session::SessionObserver for HostObserver {
/// #     fn token_generated(&mut self, _: cardlink_core::Account, c: cardlink_session::Continuation) { c.invoke() }
/// #     fn read_failed(&mut self, _: cardlink_core::SwiperError, c: cardlink_session::Continuation) { c.invoke() }
/// #     fn display_message(&mut self, _: &str, _: bool) {}
/// #     fn devices_found(&mut self, _: &[cardlink_core::DeviceDescriptor]) {}
/// # }
///
/// # #[tokio::main]
/// # async fn main() -> cardlink_core::Result<()> {
/// let (transport, _reader) = MockTransport::new();
/// let controller = SwiperController::builder()
///     .transport(AnyTransport::Mock(transport))
///     .observer(HostObserver)
///     .build()?;
///
/// controller.find_devices()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SwiperControllerBuilder {
    transport: Option<AnyTransport>,
    observer: Option<Box<dyn SessionObserver + Send>>,
    tokenizer: Option<AnyTokenizer>,
    config: DeviceConfig,
}

impl SwiperControllerBuilder {
    /// Transport binding the session will exclusively own. Required.
    #[must_use]
    pub fn transport(mut self, transport: AnyTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Observer receiving all session notifications. Required.
    #[must_use]
    pub fn observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Tokenization backend. Defaults to the deterministic mock.
    #[must_use]
    pub fn tokenizer(mut self, tokenizer: AnyTokenizer) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Initial device configuration. Defaults to an 800 ms beep and a
    /// 60 second card read timeout.
    #[must_use]
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn the session engine and return its controller.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the transport or observer is
    /// missing.
    pub fn build(self) -> Result<SwiperController> {
        let transport = self
            .transport
            .ok_or_else(|| SwiperError::configuration("a transport is required"))?;
        let observer = self
            .observer
            .ok_or_else(|| SwiperError::configuration("an observer is required"))?;
        let tokenizer = self
            .tokenizer
            .unwrap_or_else(|| AnyTokenizer::Mock(MockTokenizer::new()));

        let config = Arc::new(Mutex::new(self.config));
        let fatal = Arc::new(AtomicBool::new(false));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let engine = Engine::new(
            transport,
            observer,
            tokenizer,
            Arc::clone(&config),
            cmd_tx.clone(),
            cmd_rx,
            state_tx,
            Arc::clone(&fatal),
        );
        tokio::spawn(engine.run());

        Ok(SwiperController {
            cmd_tx,
            state_rx,
            config,
            released: AtomicBool::new(false),
            fatal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_transport() {
        let result = SwiperController::builder().build();
        assert!(matches!(
            result,
            Err(SwiperError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_builder_requires_observer() {
        let (transport, _handle) = cardlink_transport::MockTransport::new();
        let result = SwiperController::builder()
            .transport(AnyTransport::Mock(transport))
            .build();
        assert!(matches!(
            result,
            Err(SwiperError::ConfigurationError { .. })
        ));
    }
}
