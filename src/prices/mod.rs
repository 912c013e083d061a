//! Remote market-price sources.
//!
//! Defines the `PriceSource` trait consumed by the price cache, plus the
//! fut.gg-backed implementation.

pub mod futgg;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::PriceQuote;

pub use futgg::FutggClient;

/// Largest number of catalog ids per batched lookup.
pub const MAX_BATCH: usize = 50;

/// Abstraction over a remote price lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Look up up to [`MAX_BATCH`] catalog ids in one call. A malformed or
    /// failed response is an error; the caller decides whether to retry.
    async fn fetch_prices(&self, definition_ids: &[u64]) -> Result<Vec<PriceQuote>>;

    /// Price of the cheapest listed card at exactly `rating`, if one is found.
    async fn cheapest_by_rating(&self, rating: u8) -> Result<Option<PriceQuote>>;
}
