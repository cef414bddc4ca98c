pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod wire;

pub use devices::AnyTransport;
pub use error::{Result, TransportError};
pub use mock::{MockReaderHandle, MockTransport};
pub use traits::{Advertisement, Transport, TransportEvent};
pub use wire::{FrameKind, HostFrame, ReaderFrame};
