//! Error taxonomy for swiper sessions.
//!
//! Every failure a host can observe is one of the closed set of kinds below,
//! each with a stable integer code and a host-displayable message. Errors are
//! delivered through the observer's failure callback, never panicked or thrown
//! across the observer boundary; connection-fatal kinds are additionally
//! reflected as a `Disconnected` state transition.

use crate::types::ReadMode;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SwiperError>;

/// Errors produced by a swiper session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SwiperError {
    /// The host has not been granted audio access, which the audio-jack
    /// transport requires. Fatal until permission is granted.
    #[error("audio permission denied")]
    AudioPermissionDenied,

    /// A chip error occurred and the card should be swiped instead.
    #[error("chip could not be read, card should be swiped")]
    SwipeCard,

    /// A chip card was swiped and should be inserted instead.
    #[error("chip card was swiped, card should be inserted")]
    InsertCard,

    /// The transaction was canceled by the user or the host.
    #[error("transaction canceled")]
    CanceledTransaction,

    /// No card was presented within the configured card read timeout.
    #[error("card read timed out")]
    Timeout,

    /// The link failed or dropped. The session is disconnected and cannot
    /// be recovered without reconnecting.
    #[error("connection error: {message}")]
    ConnectionError { message: String },

    /// The requested read mode is not supported by the hardware.
    #[error("unsupported read mode: {mode}")]
    UnsupportedMode { mode: ReadMode },

    /// The swiped card could not be read.
    #[error("card could not be read")]
    BadCardRead,

    /// The device failed to apply its settings, or a session entry point
    /// was misused. The session is disconnected if configuration was
    /// in progress.
    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    /// The audio transport was preempted by another application taking
    /// priority over audio.
    #[error("another application is playing audio")]
    OtherAudioPlaying,

    /// An unknown error occurred; the message carries full detail.
    #[error("unknown error: {message}")]
    Unknown { message: String },
}

impl SwiperError {
    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Stable integer code for this error kind.
    ///
    /// The code space (100-109 plus catch-all 500) is shared with host
    /// applications that key behavior off numeric codes and must not be
    /// renumbered.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::AudioPermissionDenied => 100,
            Self::SwipeCard => 101,
            Self::InsertCard => 102,
            Self::CanceledTransaction => 103,
            Self::Timeout => 104,
            Self::ConnectionError { .. } => 105,
            Self::UnsupportedMode { .. } => 106,
            Self::BadCardRead => 107,
            Self::ConfigurationError { .. } => 108,
            Self::OtherAudioPlaying => 109,
            Self::Unknown { .. } => 500,
        }
    }

    /// Whether the session stays ready for another attempt after this error.
    ///
    /// Recoverable errors leave the session connected; once the failure
    /// callback's continuation fires, the reader is armed again. The
    /// remaining kinds either disconnect the session or require host action
    /// (permission grants, reconnecting) before another attempt can work.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SwipeCard
                | Self::InsertCard
                | Self::CanceledTransaction
                | Self::Timeout
                | Self::BadCardRead
                | Self::OtherAudioPlaying
        )
    }

    /// Host-displayable message for this error.
    ///
    /// Every error pairs with a message suitable for direct display to the
    /// person holding the card.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::AudioPermissionDenied => {
                "Microphone access is required to use the card reader".to_string()
            }
            Self::SwipeCard => "Please swipe your card".to_string(),
            Self::InsertCard => "Please insert your card".to_string(),
            Self::CanceledTransaction => "Transaction canceled".to_string(),
            Self::Timeout => "No card was presented in time".to_string(),
            Self::ConnectionError { .. } => "Lost connection to the card reader".to_string(),
            Self::UnsupportedMode { .. } => {
                "This reader does not support the requested card entry method".to_string()
            }
            Self::BadCardRead => "Card could not be read, please try again".to_string(),
            Self::ConfigurationError { .. } => "The card reader could not be set up".to_string(),
            Self::OtherAudioPlaying => {
                "Another app is using audio, close it and try again".to_string()
            }
            Self::Unknown { message } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SwiperError::AudioPermissionDenied, 100)]
    #[case(SwiperError::SwipeCard, 101)]
    #[case(SwiperError::InsertCard, 102)]
    #[case(SwiperError::CanceledTransaction, 103)]
    #[case(SwiperError::Timeout, 104)]
    #[case(SwiperError::connection("dropped"), 105)]
    #[case(SwiperError::UnsupportedMode { mode: ReadMode::SwipeAndDip }, 106)]
    #[case(SwiperError::BadCardRead, 107)]
    #[case(SwiperError::configuration("nak"), 108)]
    #[case(SwiperError::OtherAudioPlaying, 109)]
    #[case(SwiperError::unknown("boom"), 500)]
    fn test_error_codes_are_stable(#[case] error: SwiperError, #[case] code: u16) {
        assert_eq!(error.code(), code);
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(SwiperError::SwipeCard.is_recoverable());
        assert!(SwiperError::InsertCard.is_recoverable());
        assert!(SwiperError::CanceledTransaction.is_recoverable());
        assert!(SwiperError::Timeout.is_recoverable());
        assert!(SwiperError::BadCardRead.is_recoverable());
        assert!(SwiperError::OtherAudioPlaying.is_recoverable());

        assert!(!SwiperError::AudioPermissionDenied.is_recoverable());
        assert!(!SwiperError::connection("dropped").is_recoverable());
        assert!(
            !SwiperError::UnsupportedMode {
                mode: ReadMode::SwipeAndDip
            }
            .is_recoverable()
        );
        assert!(!SwiperError::configuration("nak").is_recoverable());
        assert!(!SwiperError::unknown("boom").is_recoverable());
    }

    #[test]
    fn test_every_error_has_a_display_message() {
        let errors = vec![
            SwiperError::AudioPermissionDenied,
            SwiperError::SwipeCard,
            SwiperError::InsertCard,
            SwiperError::CanceledTransaction,
            SwiperError::Timeout,
            SwiperError::connection("dropped"),
            SwiperError::UnsupportedMode {
                mode: ReadMode::SwipeOnly,
            },
            SwiperError::BadCardRead,
            SwiperError::configuration("nak"),
            SwiperError::OtherAudioPlaying,
            SwiperError::unknown("boom"),
        ];

        for error in errors {
            assert!(!error.display_message().is_empty());
        }
    }

    #[test]
    fn test_unknown_surfaces_full_detail() {
        let error = SwiperError::unknown("firmware fault 0x3f");
        assert_eq!(error.display_message(), "firmware fault 0x3f");
    }
}
