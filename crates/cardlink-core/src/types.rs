use crate::{Result, error::SwiperError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a reader peripheral.
///
/// Produced by device discovery; unique within a discovery session and the
/// only value accepted by the connect operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Create a fresh random identifier.
    ///
    /// Real transports derive identifiers from the radio advertisement; this
    /// constructor exists for emulated readers and tests.
    #[must_use]
    pub fn random() -> Self {
        DeviceId(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        DeviceId(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = SwiperError;

    fn from_str(s: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(s).map_err(|_| SwiperError::ConfigurationError {
            message: format!("Invalid device identifier: {s}"),
        })?;
        Ok(DeviceId(uuid))
    }
}

/// A reader peripheral found during discovery.
///
/// Immutable once produced by a scan. The identifier is the handle for
/// connecting; the name is what the host shows in its device picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Advertised device name.
    pub name: String,

    /// Stable unique identifier within the discovery session.
    pub id: DeviceId,
}

impl DeviceDescriptor {
    /// Create a new descriptor.
    pub fn new(name: impl Into<String>, id: DeviceId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Connection state of a swiper session.
///
/// Exactly one value is live at any time; only the session engine mutates
/// it. Observers should treat changes as edge-triggered events rather than
/// polling the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No device connected.
    Disconnected,

    /// Discovery is running and advertisements are being collected.
    Searching,

    /// A connection attempt is in flight.
    ///
    /// The host should disable user interaction until the state changes.
    Connecting,

    /// The device is connected and, once configured, ready for card reads.
    Connected,

    /// Device settings are being applied.
    ///
    /// The host should disable user interaction until the state changes.
    Configuring,
}

impl ConnectionState {
    /// Check whether a transition to `target` is legal.
    ///
    /// Any state may fall back to `Disconnected` (link loss, teardown, or an
    /// unrecoverable error); forward progress follows the session lifecycle.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlink_core::ConnectionState;
    ///
    /// assert!(ConnectionState::Disconnected.can_transition_to(ConnectionState::Searching));
    /// assert!(!ConnectionState::Searching.can_transition_to(ConnectionState::Connected));
    /// ```
    #[must_use]
    pub fn can_transition_to(self, target: ConnectionState) -> bool {
        if self == target {
            return false;
        }
        matches!(
            (self, target),
            (_, ConnectionState::Disconnected)
                | (ConnectionState::Disconnected, ConnectionState::Searching)
                | (
                    ConnectionState::Disconnected | ConnectionState::Searching,
                    ConnectionState::Connecting
                )
                | (ConnectionState::Connecting, ConnectionState::Connected)
                | (ConnectionState::Connected, ConnectionState::Configuring)
                | (ConnectionState::Configuring, ConnectionState::Connected)
        )
    }

    /// Returns `true` if the state is `Disconnected`.
    #[must_use]
    pub fn is_disconnected(self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// Returns `true` if the state is `Searching`.
    #[must_use]
    pub fn is_searching(self) -> bool {
        matches!(self, ConnectionState::Searching)
    }

    /// Returns `true` if the state is `Connected`.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Searching => "Searching",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Configuring => "Configuring",
        };
        write!(f, "{s}")
    }
}

/// Card read technique accepted by the reader for a session.
///
/// Fixed at the moment a connection is accepted and immutable for the life
/// of that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Magstripe swipe only.
    SwipeOnly,

    /// Magstripe swipe or EMV chip insertion.
    SwipeAndDip,
}

impl ReadMode {
    /// Maximum card read timeout supported by this mode, in seconds.
    ///
    /// Swipe-only readers carry the timeout in one byte, dip-capable readers
    /// in two.
    #[must_use]
    pub fn max_timeout_secs(self) -> u32 {
        match self {
            ReadMode::SwipeOnly => crate::constants::MAX_CARD_READ_TIMEOUT_SWIPE_SECS,
            ReadMode::SwipeAndDip => crate::constants::MAX_CARD_READ_TIMEOUT_SWIPE_DIP_SECS,
        }
    }

    /// Returns `true` if chip insertion is accepted.
    #[must_use]
    pub fn supports_dip(self) -> bool {
        matches!(self, ReadMode::SwipeAndDip)
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadMode::SwipeOnly => write!(f, "SwipeOnly"),
            ReadMode::SwipeAndDip => write!(f, "SwipeAndDip"),
        }
    }
}

/// Audible tone the reader emits after a card read.
///
/// Readers without a speaker only honor [`BeepSetting::None`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeepSetting {
    /// No tone.
    None,
    /// A single short tone.
    Single,
    /// Two short tones.
    Double,
    /// Three short tones.
    Triple,
    /// Four short tones.
    Quadruple,
    /// A single 200 millisecond tone.
    Long200ms,
    /// A single 400 millisecond tone.
    Long400ms,
    /// A single 600 millisecond tone.
    Long600ms,
    /// A single 800 millisecond tone.
    #[default]
    Long800ms,
}

/// Battery condition reported by the reader.
///
/// Advisory and non-blocking; may arrive at any time while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryStatus {
    /// Battery is low but the reader still processes commands.
    Low,

    /// Battery is critical and the reader will stop processing commands.
    Critical,
}

/// How card data was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTechnology {
    /// Magnetic stripe swipe.
    Magstripe,

    /// EMV chip read.
    Chip,
}

/// Raw card data captured by the reader.
///
/// Handed to the tokenizer; never surfaced to the host directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    /// Capture technology.
    pub technology: CardTechnology,

    /// Primary account number.
    pub pan: String,

    /// Expiry in `MM/YY` form.
    pub expiry: String,

    /// Raw track data for magstripe reads, when the reader provides it.
    pub track_data: Option<String>,

    /// When the card was captured.
    pub read_at: DateTime<Utc>,
}

impl CardData {
    /// Card data from a magstripe swipe.
    pub fn swiped(pan: impl Into<String>, expiry: impl Into<String>) -> Self {
        Self {
            technology: CardTechnology::Magstripe,
            pan: pan.into(),
            expiry: expiry.into(),
            track_data: None,
            read_at: Utc::now(),
        }
    }

    /// Card data from a chip read.
    pub fn dipped(pan: impl Into<String>, expiry: impl Into<String>) -> Self {
        Self {
            technology: CardTechnology::Chip,
            pan: pan.into(),
            expiry: expiry.into(),
            track_data: None,
            read_at: Utc::now(),
        }
    }

    /// Attach raw track data.
    #[must_use]
    pub fn with_track_data(mut self, track_data: impl Into<String>) -> Self {
        self.track_data = Some(track_data.into());
        self
    }
}

/// Tokenized card data returned on a successful read.
///
/// The token is an opaque string minted by the tokenization backend; no raw
/// card data survives in this type beyond the masked PAN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque token standing in for the card.
    pub token: String,

    /// PAN with all but the last four digits masked.
    pub masked_pan: String,

    /// Expiry in `MM/YY` form.
    pub expiry: String,

    /// Cardholder name, when the read captured one.
    pub cardholder_name: Option<String>,
}
