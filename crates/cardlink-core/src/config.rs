//! Device configuration for a swiper session.

use crate::constants::{DEFAULT_CARD_READ_TIMEOUT_SECS, MIN_CARD_READ_TIMEOUT_SECS};
use crate::types::{BeepSetting, ReadMode};
use serde::{Deserialize, Serialize};

/// Settings applied to the reader when a session configures.
///
/// The card read timeout has mode-dependent bounds: at least
/// [`MIN_CARD_READ_TIMEOUT_SECS`] for either mode, at most 255 seconds for
/// [`ReadMode::SwipeOnly`] and 65535 seconds for [`ReadMode::SwipeAndDip`].
/// An out-of-bounds write through [`set_card_read_timeout_secs`] leaves the
/// previous value unchanged without raising an error; that matches the
/// property semantics host applications were written against. Callers that
/// want a signal use [`try_set_card_read_timeout_secs`] instead.
///
/// Switching read mode clamps an over-max timeout down to the new mode's
/// maximum, never up.
///
/// [`set_card_read_timeout_secs`]: DeviceConfig::set_card_read_timeout_secs
/// [`try_set_card_read_timeout_secs`]: DeviceConfig::try_set_card_read_timeout_secs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    beep: BeepSetting,
    card_read_timeout_secs: u32,
    read_mode: ReadMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            beep: BeepSetting::default(),
            card_read_timeout_secs: DEFAULT_CARD_READ_TIMEOUT_SECS,
            read_mode: ReadMode::SwipeOnly,
        }
    }
}

impl DeviceConfig {
    /// Configured beep setting.
    #[must_use]
    pub fn beep(&self) -> BeepSetting {
        self.beep
    }

    /// Set the beep setting.
    ///
    /// Readers without a speaker ignore everything but [`BeepSetting::None`];
    /// the value is forwarded regardless.
    pub fn set_beep(&mut self, beep: BeepSetting) {
        self.beep = beep;
    }

    /// Configured card read timeout in seconds.
    #[must_use]
    pub fn card_read_timeout_secs(&self) -> u32 {
        self.card_read_timeout_secs
    }

    /// Set the card read timeout, silently ignoring out-of-bounds values.
    pub fn set_card_read_timeout_secs(&mut self, secs: u32) {
        let _ = self.try_set_card_read_timeout_secs(secs);
    }

    /// Set the card read timeout, reporting whether the value was accepted.
    ///
    /// Returns `false` and leaves the previous value unchanged when `secs`
    /// is below [`MIN_CARD_READ_TIMEOUT_SECS`] or above the current read
    /// mode's maximum.
    pub fn try_set_card_read_timeout_secs(&mut self, secs: u32) -> bool {
        if !(MIN_CARD_READ_TIMEOUT_SECS..=self.read_mode.max_timeout_secs()).contains(&secs) {
            return false;
        }
        self.card_read_timeout_secs = secs;
        true
    }

    /// Read mode the session is (or will be) connected with.
    #[must_use]
    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    /// Fix the read mode, clamping the timeout down to the new mode's
    /// maximum if it now exceeds it.
    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.read_mode = mode;
        let max = mode.max_timeout_secs();
        if self.card_read_timeout_secs > max {
            self.card_read_timeout_secs = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.beep(), BeepSetting::Long800ms);
        assert_eq!(config.card_read_timeout_secs(), 60);
        assert_eq!(config.read_mode(), ReadMode::SwipeOnly);
    }

    #[rstest]
    #[case(ReadMode::SwipeOnly, 1)]
    #[case(ReadMode::SwipeOnly, 255)]
    #[case(ReadMode::SwipeAndDip, 1)]
    #[case(ReadMode::SwipeAndDip, 65535)]
    fn test_boundary_timeouts_accepted(#[case] mode: ReadMode, #[case] secs: u32) {
        let mut config = DeviceConfig::default();
        config.set_read_mode(mode);
        assert!(config.try_set_card_read_timeout_secs(secs));
        assert_eq!(config.card_read_timeout_secs(), secs);
    }

    #[rstest]
    #[case(ReadMode::SwipeOnly, 0)]
    #[case(ReadMode::SwipeOnly, 256)]
    #[case(ReadMode::SwipeAndDip, 0)]
    #[case(ReadMode::SwipeAndDip, 65536)]
    #[case(ReadMode::SwipeAndDip, 70000)]
    fn test_out_of_bounds_timeouts_silently_ignored(#[case] mode: ReadMode, #[case] secs: u32) {
        let mut config = DeviceConfig::default();
        config.set_read_mode(mode);
        let before = config.card_read_timeout_secs();

        config.set_card_read_timeout_secs(secs);

        assert_eq!(config.card_read_timeout_secs(), before);
        assert!(!config.try_set_card_read_timeout_secs(secs));
        assert_eq!(config.card_read_timeout_secs(), before);
    }

    #[test]
    fn test_mode_change_clamps_timeout_down() {
        let mut config = DeviceConfig::default();
        config.set_read_mode(ReadMode::SwipeAndDip);
        assert!(config.try_set_card_read_timeout_secs(1000));

        config.set_read_mode(ReadMode::SwipeOnly);
        assert_eq!(config.card_read_timeout_secs(), 255);
    }

    #[test]
    fn test_mode_change_never_raises_timeout() {
        let mut config = DeviceConfig::default();
        assert!(config.try_set_card_read_timeout_secs(30));

        config.set_read_mode(ReadMode::SwipeAndDip);
        assert_eq!(config.card_read_timeout_secs(), 30);
    }

    #[test]
    fn test_swipe_dip_range_rejected_in_swipe_only() {
        let mut config = DeviceConfig::default();
        let before = config.card_read_timeout_secs();

        // Legal for SwipeAndDip, out of range for the default SwipeOnly mode.
        config.set_card_read_timeout_secs(1000);

        assert_eq!(config.card_read_timeout_secs(), before);
    }
}
