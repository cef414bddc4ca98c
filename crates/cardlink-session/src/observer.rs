//! The notification channel between a session and its host.
//!
//! One observer is registered per session, at construction time. The engine
//! owns it and invokes every callback from its own task, so there is no
//! concurrent re-entry for the same session. State changes are delivered in
//! transition order and strictly before any notification belonging to the
//! new state; a transaction's display messages precede its terminal outcome.

use crate::engine::Command;
use cardlink_core::{Account, BatteryStatus, ConnectionState, DeviceDescriptor, SwiperError};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::debug;

/// Host-invoked signal that re-arms the session for the next attempt.
///
/// Every terminal transaction outcome carries one. The session will not
/// accept or start another card read until it is invoked; if the host
/// presented a status indicator or disabled interaction when the read
/// started, it should clear that state here, right before invoking.
///
/// Dropping a continuation without invoking it parks the session for good:
/// no further reads happen, though cancellation and release still work.
#[derive(Debug)]
pub struct Continuation {
    tx: mpsc::UnboundedSender<Command>,
}

impl Continuation {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// Signal readiness for the next attempt, consuming the handle.
    pub fn invoke(self) {
        if self.tx.send(Command::ContinuationInvoked).is_err() {
            debug!("continuation invoked after session ended");
        }
    }
}

/// Callbacks a host registers to observe one session.
///
/// The first four methods are required: terminal transaction outcomes and
/// device messages must reach the user. The rest have no-op defaults and can
/// be ignored without affecting session correctness; the one exception is
/// [`display_amount`](SessionObserver::display_amount), whose default makes
/// screen-equipped readers show $1.00.
pub trait SessionObserver: Send {
    /// A token was generated for a card read.
    ///
    /// Invoke `completion` to start the next read.
    fn token_generated(&mut self, account: Account, completion: Continuation);

    /// A card read or session operation failed.
    ///
    /// `error.display_message()` is suitable for direct display. Recoverable
    /// errors leave the session connected; invoke `completion` to start the
    /// next read.
    fn read_failed(&mut self, error: SwiperError, completion: Continuation);

    /// The device produced a message that must be shown to the user.
    ///
    /// `cancelable` indicates whether `cancel_transaction` is currently
    /// valid.
    fn display_message(&mut self, message: &str, cancelable: bool);

    /// Devices found so far during discovery.
    ///
    /// Called once per newly discovered device with the full deduplicated
    /// snapshot; the set only grows within one scan.
    fn devices_found(&mut self, devices: &[DeviceDescriptor]);

    /// The connection state changed.
    fn connection_state_changed(&mut self, state: ConnectionState) {
        let _ = state;
    }

    /// The reader's battery is low or critical.
    fn battery_status_changed(&mut self, status: BatteryStatus) {
        let _ = status;
    }

    /// A card read started.
    ///
    /// A good moment to show a status indicator and disable interaction;
    /// clear both when the matching outcome's continuation is invoked.
    fn card_read_started(&mut self) {}

    /// Fractional configuration progress in `[0, 1]`.
    fn configuration_progress(&mut self, progress: f32) {
        let _ = progress;
    }

    /// Amount to show on screen-equipped readers while awaiting a card.
    ///
    /// Return `None` (the default) to show $1.00.
    fn display_amount(&mut self) -> Option<Decimal> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_signals_engine() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        Continuation::new(tx).invoke();
        assert!(matches!(rx.try_recv(), Ok(Command::ContinuationInvoked)));
    }

    #[test]
    fn test_continuation_tolerates_dead_engine() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        // Must not panic.
        Continuation::new(tx).invoke();
    }
}
