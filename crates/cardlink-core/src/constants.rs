//! Shared constants for the cardlink session engine.
//!
//! These values define the timing and bounds contract between the session
//! engine, the transport binding, and the reader hardware. They mirror the
//! behavior of the supported reader models; changing them may break
//! compatibility with deployed devices.

use std::time::Duration;

// ============================================================================
// Card Read Timeout Bounds
// ============================================================================

/// Minimum card read timeout in seconds, for either read mode.
///
/// Readers reject a zero timeout outright; a write below this bound is
/// silently ignored by [`DeviceConfig`](crate::config::DeviceConfig).
///
/// # Value: 1 second
pub const MIN_CARD_READ_TIMEOUT_SECS: u32 = 1;

/// Maximum card read timeout for swipe-only mode.
///
/// Swipe-only readers carry the timeout in a single byte, so the ceiling
/// is `0xFF`.
///
/// # Value: 255 seconds
pub const MAX_CARD_READ_TIMEOUT_SWIPE_SECS: u32 = 0xFF;

/// Maximum card read timeout for swipe-and-dip mode.
///
/// Dip-capable readers carry the timeout in two bytes, so the ceiling
/// is `0xFFFF`.
///
/// # Value: 65535 seconds
pub const MAX_CARD_READ_TIMEOUT_SWIPE_DIP_SECS: u32 = 0xFFFF;

/// Default card read timeout applied to a fresh configuration.
///
/// # Value: 60 seconds
pub const DEFAULT_CARD_READ_TIMEOUT_SECS: u32 = 60;

// ============================================================================
// Session Timing
// ============================================================================

/// How long a connection attempt may take before it fails.
///
/// Covers BLE link negotiation or audio-jack handshake. Expiry surfaces as
/// a connection error, never as a hang.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the engine waits for the reader to acknowledge a configuration
/// frame before treating configuration as failed.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// Device Display
// ============================================================================

/// Amount shown on screen-equipped readers when the host does not supply one,
/// in minor currency units.
///
/// # Value: 100 ($1.00)
pub const DEFAULT_DISPLAY_AMOUNT_MINOR: i64 = 100;

// ============================================================================
// Channels
// ============================================================================

/// Capacity of the scripted-event channel inside the mock transport.
///
/// Large enough that a test can queue a whole scenario without the handle
/// blocking.
pub const MOCK_EVENT_CHANNEL_CAPACITY: usize = 64;
