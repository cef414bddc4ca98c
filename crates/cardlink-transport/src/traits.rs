//! Transport binding trait definitions.
//!
//! A transport binding owns one physical link to a reader (BLE or
//! audio-jack) and exposes it as an opaque duplex frame channel plus
//! advertisement scanning. The session engine is the sole owner of a
//! binding; two sessions never share one physical transport.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), so it is not object-safe; the engine dispatches through the
//! [`AnyTransport`](crate::devices::AnyTransport) enum wrapper instead of a
//! trait object.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use bytes::Bytes;
use cardlink_core::{DeviceId, ReadMode};

/// Discovery beacon from a nearby reader.
///
/// The radio re-broadcasts advertisements continuously; consumers are
/// expected to deduplicate by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised device name.
    pub name: String,

    /// Stable identifier usable with [`Transport::connect`].
    pub id: DeviceId,
}

impl Advertisement {
    /// Create a new advertisement.
    pub fn new(name: impl Into<String>, id: DeviceId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// An inbound event from the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A discovery beacon arrived while scanning.
    Advertisement(Advertisement),

    /// An opaque frame arrived from the connected reader.
    Frame(Bytes),
}

/// Duplex channel to one reader peripheral.
///
/// Implementations translate between the typed frame vocabulary in
/// [`wire`](crate::wire) and whatever byte protocol their reader model
/// speaks; the session engine never sees model-specific framing.
pub trait Transport: Send + Sync {
    /// Start delivering advertisements through [`recv`](Transport::recv).
    ///
    /// # Errors
    ///
    /// Returns an error if the radio or audio session cannot be acquired.
    async fn start_scan(&mut self) -> Result<()>;

    /// Stop delivering advertisements.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stack rejects the request.
    async fn stop_scan(&mut self) -> Result<()>;

    /// Establish a link to the identified reader in the given read mode.
    ///
    /// Implementations enforce an internal connection timeout; a connect
    /// never hangs indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The identifier matches no reachable device
    /// - The attempt times out or the link cannot be established
    /// - The reader does not support the requested mode
    async fn connect(&mut self, id: DeviceId, mode: ReadMode) -> Result<()>;

    /// Tear down the link. Safe to call when not connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stack fails to release the link.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send one opaque frame to the connected reader.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the link drops mid-send.
    async fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Receive the next inbound event.
    ///
    /// Blocks asynchronously until an advertisement or frame arrives. Link
    /// loss surfaces as `Err(TransportError::LinkLost)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link drops or the transport shuts down.
    async fn recv(&mut self) -> Result<TransportEvent>;
}
