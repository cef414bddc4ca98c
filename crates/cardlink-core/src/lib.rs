pub mod card;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::DeviceConfig;
pub use error::{Result, SwiperError};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
