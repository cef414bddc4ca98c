//! Error types for transport bindings.
//!
//! Transport errors describe link-level failures. The session engine maps
//! them onto the session error taxonomy via
//! [`into_swiper_error`](TransportError::into_swiper_error) before anything
//! reaches a host observer.

use cardlink_core::{DeviceId, ReadMode, SwiperError};

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur on a transport binding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The host lacks the audio/microphone permission the audio-jack
    /// transport needs.
    #[error("audio permission denied")]
    PermissionDenied,

    /// Another application holds the audio session.
    #[error("audio transport preempted by another application")]
    AudioBusy,

    /// The link to the reader dropped.
    #[error("link lost: {message}")]
    LinkLost { message: String },

    /// A connection attempt did not complete in time.
    #[error("connection attempt timed out")]
    ConnectTimeout,

    /// The identifier does not match any reachable device.
    #[error("unknown device: {id}")]
    UnknownDevice { id: DeviceId },

    /// An operation that requires a connection was issued without one.
    #[error("not connected")]
    NotConnected,

    /// The transport's event channel closed underneath it.
    #[error("transport channel closed")]
    ChannelClosed,

    /// A frame could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// The reader does not support the requested read mode.
    #[error("unsupported read mode: {mode}")]
    UnsupportedMode { mode: ReadMode },
}

impl TransportError {
    /// Create a new link-lost error.
    pub fn link_lost(message: impl Into<String>) -> Self {
        Self::LinkLost {
            message: message.into(),
        }
    }

    /// Create a new codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Map this transport failure onto the session error taxonomy.
    ///
    /// Link-level failures of any shape surface to hosts as connection
    /// errors; permission and audio-session problems keep their specific
    /// kinds so hosts can prompt the user.
    #[must_use]
    pub fn into_swiper_error(self) -> SwiperError {
        match self {
            Self::PermissionDenied => SwiperError::AudioPermissionDenied,
            Self::AudioBusy => SwiperError::OtherAudioPlaying,
            Self::LinkLost { message } => SwiperError::connection(message),
            Self::ConnectTimeout => SwiperError::connection("connection attempt timed out"),
            Self::UnknownDevice { id } => {
                SwiperError::connection(format!("unknown device: {id}"))
            }
            Self::NotConnected => SwiperError::connection("not connected"),
            Self::ChannelClosed => SwiperError::connection("transport channel closed"),
            Self::Codec { message } => SwiperError::unknown(format!("codec error: {message}")),
            Self::UnsupportedMode { mode } => SwiperError::UnsupportedMode { mode },
        }
    }
}
