//! Session engine for card-reading payment peripherals.
//!
//! This crate drives the lifecycle of a swiper connected over BLE or an
//! audio-jack link: device discovery, connection, device configuration, and
//! one card-read transaction at a time, reporting everything to a single
//! registered [`SessionObserver`].
//!
//! The public handle is [`SwiperController`]; all hardware I/O and timers run
//! on one engine task per session, so observer callbacks are never re-entered
//! concurrently. Terminal transaction outcomes carry a [`Continuation`] the
//! host must invoke before the next attempt can start.

pub mod controller;
mod engine;
pub mod observer;
pub mod registry;
pub mod tokenizer;

pub use controller::{SwiperController, SwiperControllerBuilder};
pub use observer::{Continuation, SessionObserver};
pub use registry::DeviceRegistry;
pub use tokenizer::{AnyTokenizer, MockTokenizer, Tokenizer};
