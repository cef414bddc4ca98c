//! Tokenization boundary.
//!
//! The session engine hands raw card data to a tokenizer and receives an
//! opaque account token or a failure; how tokens are minted is outside this
//! crate. The mock implementation is deterministic and keeps development and
//! tests independent of any backend.

#![allow(async_fn_in_trait)]

use cardlink_core::card::{masked_pan, validate_pan};
use cardlink_core::{Account, CardData, Result, SwiperError};
use tracing::debug;

/// Produces an account token from raw card data.
pub trait Tokenizer: Send + Sync {
    /// Tokenize one card read.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture is unusable or the backend declines
    /// to tokenize it.
    async fn tokenize(&mut self, card: &CardData) -> Result<Account>;
}

/// Enum wrapper over the available tokenizers.
///
/// The tokenizer trait uses native `async fn` (RPITIT) and is therefore not
/// object-safe; the engine dispatches through this enum instead.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTokenizer {
    /// Deterministic local tokenizer for development and testing.
    Mock(MockTokenizer),
}

impl Tokenizer for AnyTokenizer {
    async fn tokenize(&mut self, card: &CardData) -> Result<Account> {
        match self {
            Self::Mock(tokenizer) => tokenizer.tokenize(card).await,
        }
    }
}

/// Deterministic tokenizer for development and testing.
///
/// Validates the captured PAN and derives a stable opaque token from it;
/// the same card always yields the same token.
#[derive(Debug, Default)]
pub struct MockTokenizer;

impl MockTokenizer {
    /// Create a new mock tokenizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// FNV-1a over the PAN and expiry, rendered as an opaque token.
    fn derive_token(pan: &str, expiry: &str) -> String {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in pan.bytes().chain(expiry.bytes()) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        format!("tok_{hash:016x}")
    }
}

impl Tokenizer for MockTokenizer {
    async fn tokenize(&mut self, card: &CardData) -> Result<Account> {
        if !validate_pan(&card.pan) {
            debug!("captured PAN failed validation");
            return Err(SwiperError::BadCardRead);
        }

        Ok(Account {
            token: Self::derive_token(&card.pan, &card.expiry),
            masked_pan: masked_pan(&card.pan),
            expiry: card.expiry.clone(),
            cardholder_name: None,
        })
    }
}
