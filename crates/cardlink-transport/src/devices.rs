//! Enum wrapper for transport dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) are not object-safe,
//! so the session engine cannot hold a `Box<dyn Transport>`. This enum
//! provides concrete dispatch at compile time instead, with zero-cost
//! monomorphization and room for additional bindings as variants.

use crate::error::Result;
use crate::mock::MockTransport;
use crate::traits::{Transport, TransportEvent};
use bytes::Bytes;
use cardlink_core::{DeviceId, ReadMode};

/// Enum wrapper over the available transport bindings.
///
/// Real BLE and audio-jack bindings slot in as additional variants; the
/// mock stands in for them in development and tests.
///
/// # Examples
///
/// ```
/// use cardlink_transport::{AnyTransport, MockTransport};
///
/// let (transport, _handle) = MockTransport::new();
/// let _any = AnyTransport::Mock(transport);
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTransport {
    /// Scriptable emulated reader for development and testing.
    Mock(MockTransport),
}

impl Transport for AnyTransport {
    async fn start_scan(&mut self) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.start_scan().await,
        }
    }

    async fn stop_scan(&mut self) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.stop_scan().await,
        }
    }

    async fn connect(&mut self, id: DeviceId, mode: ReadMode) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.connect(id, mode).await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.disconnect().await,
        }
    }

    async fn send(&mut self, frame: Bytes) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.send(frame).await,
        }
    }

    async fn recv(&mut self) -> Result<TransportEvent> {
        match self {
            Self::Mock(transport) => transport.recv().await,
        }
    }
}
