//! Frame vocabulary spoken between the session engine and a reader.
//!
//! These are typed, in-process frames; each reader model's real byte
//! protocol lives inside its transport binding, which translates to and
//! from this vocabulary. Frames cross the [`Transport`](crate::Transport)
//! boundary serialized as JSON in [`Bytes`] so the channel stays opaque.

use crate::error::{Result, TransportError};
use bytes::Bytes;
use cardlink_core::{BatteryStatus, BeepSetting, CardData, ReadMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a host frame, used in acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    SetBeep,
    SetReadTimeout,
    ArmRead,
    ShowAmount,
    CancelRead,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            FrameKind::SetBeep => "SetBeep",
            FrameKind::SetReadTimeout => "SetReadTimeout",
            FrameKind::ArmRead => "ArmRead",
            FrameKind::ShowAmount => "ShowAmount",
            FrameKind::CancelRead => "CancelRead",
        };
        write!(f, "{s}")
    }
}

/// Frames sent from the session engine to the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostFrame {
    /// Apply a beep setting.
    SetBeep { setting: BeepSetting },

    /// Apply a card read timeout in seconds.
    SetReadTimeout { seconds: u32 },

    /// Arm the reader for one card presentation in the given mode.
    ArmRead { mode: ReadMode },

    /// Show an amount on screen-equipped readers, in minor currency units.
    ShowAmount { minor_units: i64 },

    /// Request cancellation of an outstanding read. Best-effort; the reader
    /// answers with [`ReaderFrame::ReadCanceled`] when it honors it.
    CancelRead,
}

impl HostFrame {
    /// Discriminant for acknowledgement matching.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            HostFrame::SetBeep { .. } => FrameKind::SetBeep,
            HostFrame::SetReadTimeout { .. } => FrameKind::SetReadTimeout,
            HostFrame::ArmRead { .. } => FrameKind::ArmRead,
            HostFrame::ShowAmount { .. } => FrameKind::ShowAmount,
            HostFrame::CancelRead => FrameKind::CancelRead,
        }
    }

    /// Encode for the transport channel.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Codec` if serialization fails.
    pub fn encode(&self) -> Result<Bytes> {
        let encoded = serde_json::to_vec(self).map_err(|e| TransportError::codec(e.to_string()))?;
        Ok(Bytes::from(encoded))
    }

    /// Decode from the transport channel.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Codec` if the payload is not a valid frame.
    pub fn decode(bytes: &Bytes) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| TransportError::codec(e.to_string()))
    }
}

/// Frames sent from the reader to the session engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderFrame {
    /// The reader applied a host frame.
    Ack { of: FrameKind },

    /// The reader rejected a host frame.
    Nak { of: FrameKind, reason: String },

    /// A card was swiped and read.
    CardSwiped { card: CardData },

    /// A card was inserted and read.
    CardInserted { card: CardData },

    /// A chip card was swiped instead of inserted; no data was captured.
    ChipCardSwiped,

    /// The chip could not be read during an insertion.
    ChipFault,

    /// The stripe could not be read.
    BadRead,

    /// An outstanding read was canceled on the device.
    ReadCanceled,

    /// Battery condition changed.
    Battery { status: BatteryStatus },

    /// Free-form text the device wants shown to the user.
    Notice { text: String },
}

impl ReaderFrame {
    /// Encode for the transport channel.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Codec` if serialization fails.
    pub fn encode(&self) -> Result<Bytes> {
        let encoded = serde_json::to_vec(self).map_err(|e| TransportError::codec(e.to_string()))?;
        Ok(Bytes::from(encoded))
    }

    /// Decode from the transport channel.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Codec` if the payload is not a valid frame.
    pub fn decode(bytes: &Bytes) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| TransportError::codec(e.to_string()))
    }

    /// Returns `true` for frames produced by a physical card presentation.
    #[must_use]
    pub fn is_card_presentation(&self) -> bool {
        matches!(
            self,
            ReaderFrame::CardSwiped { .. }
                | ReaderFrame::CardInserted { .. }
                | ReaderFrame::ChipCardSwiped
                | ReaderFrame::ChipFault
                | ReaderFrame::BadRead
        )
    }
}
