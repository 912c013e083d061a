//! Durable TTL price cache.
//!
//! Keyed by catalog id, plus the synthetic `"<rating>_CBR"` band. Reads are
//! cache-only and staleness-aware: a stale or missing record reads as `None`.
//! `refresh` only touches missing or stale ids, in sequential batches, and
//! retries a failed batch until it succeeds.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::pricing::MarketQuote;
use crate::prices::{PriceSource, MAX_BATCH};
use crate::storage::{self, KeyValueStore};
use crate::types::{Card, PriceKey, PriceRecord};

/// Ratings whose band price is a fixed floor rather than a scraped listing.
pub const FLOOR_BAND: std::ops::RangeInclusive<u8> = 45..=80;

const DEFAULT_RETRY_BACKOFF_MS: u64 = 2_000;

/// Floor band price for ratings in [`FLOOR_BAND`].
pub fn floor_band_price(rating: u8) -> u64 {
    if rating < 75 {
        200
    } else {
        400
    }
}

#[derive(Debug, Clone)]
pub struct PriceCache {
    records: HashMap<String, PriceRecord>,
    ttl: Duration,
    retry_backoff_max_ms: u64,
}

impl PriceCache {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            records: HashMap::new(),
            ttl: Duration::minutes(ttl_minutes),
            retry_backoff_max_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }

    pub fn with_retry_backoff_ms(mut self, max_ms: u64) -> Self {
        self.retry_backoff_max_ms = max_ms;
        self
    }

    pub fn set_ttl_minutes(&mut self, minutes: i64) {
        self.ttl = Duration::minutes(minutes);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // -- Reads ------------------------------------------------------------

    pub fn get_price(&self, key: PriceKey) -> Option<u64> {
        self.get_price_at(key, Utc::now())
    }

    pub fn get_price_at(&self, key: PriceKey, now: DateTime<Utc>) -> Option<u64> {
        self.records
            .get(&key.to_string())
            .filter(|r| !r.is_stale(now, self.ttl))
            .and_then(|r| r.price)
    }

    /// Raw record, regardless of staleness.
    pub fn record(&self, key: PriceKey) -> Option<&PriceRecord> {
        self.records.get(&key.to_string())
    }

    pub fn needs_refresh(&self, key: PriceKey, now: DateTime<Utc>) -> bool {
        self.records.get(&key.to_string()).map_or(true, |r| r.is_stale(now, self.ttl))
    }

    /// Own price and rating band for `card`, both staleness-checked.
    pub fn quote_for(&self, card: &Card) -> MarketQuote {
        let now = Utc::now();
        MarketQuote {
            market: self.get_price_at(PriceKey::Definition(card.definition_id), now),
            band: self.get_price_at(PriceKey::CheapestByRating(card.rating), now),
        }
    }

    pub fn is_extinct(&self, definition_id: u64) -> bool {
        self.record(PriceKey::Definition(definition_id)).is_some_and(|r| r.is_extinct)
    }

    pub fn is_sbc(&self, definition_id: u64) -> bool {
        self.record(PriceKey::Definition(definition_id)).is_some_and(|r| r.is_sbc)
    }

    pub fn is_objective(&self, definition_id: u64) -> bool {
        self.record(PriceKey::Definition(definition_id)).is_some_and(|r| r.is_objective)
    }

    // -- Writes -----------------------------------------------------------

    pub fn insert(&mut self, key: PriceKey, record: PriceRecord) {
        self.records.insert(key.to_string(), record);
    }

    /// Drop every stale record. Returns how many were removed.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_stale(now, ttl));
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Refresh prices for `cards` whose record is missing or stale.
    pub async fn refresh(&mut self, source: &dyn PriceSource, cards: &[Card]) -> usize {
        self.refresh_ids(source, cards.iter().map(|c| c.definition_id)).await
    }

    /// Refresh the given catalog ids. Batches run one after another; a failed
    /// batch is retried after a random backoff until it succeeds.
    pub async fn refresh_ids(
        &mut self,
        source: &dyn PriceSource,
        definition_ids: impl IntoIterator<Item = u64>,
    ) -> usize {
        let now = Utc::now();
        let pending: Vec<u64> = definition_ids
            .into_iter()
            .filter(|id| self.needs_refresh(PriceKey::Definition(*id), now))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if pending.is_empty() {
            return 0;
        }

        let total = pending.len();
        let mut done = 0;
        for batch in pending.chunks(MAX_BATCH) {
            let mut attempt = 0u32;
            let quotes = loop {
                attempt += 1;
                match source.fetch_prices(batch).await {
                    Ok(quotes) => break quotes,
                    Err(e) => {
                        let delay_ms = self.retry_delay_ms();
                        warn!(error = %e, attempt, delay_ms, batch = batch.len(), "Price batch failed, retrying");
                        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    }
                }
            };

            let stamped = Utc::now();
            for quote in quotes {
                let key = PriceKey::Definition(quote.definition_id);
                self.insert(key, quote.into_record(stamped));
            }
            done += batch.len();
            debug!(done, total, "Fetched {done} / {total} Prices");
        }

        info!(total, "Price refresh complete");
        total
    }

    /// Uniform random backoff in `0..=retry_backoff_max_ms`.
    fn retry_delay_ms(&self) -> u64 {
        rand::rng().random_range(0..=self.retry_backoff_max_ms)
    }

    /// Seed the floor band and scrape stale bands above it, up to `max_rating`.
    pub async fn update_cheapest_by_rating(&mut self, source: &dyn PriceSource, max_rating: u8) -> usize {
        let now = Utc::now();
        for rating in FLOOR_BAND {
            self.insert(
                PriceKey::CheapestByRating(rating),
                PriceRecord {
                    price: Some(floor_band_price(rating)),
                    timestamp: now,
                    is_extinct: false,
                    is_objective: false,
                    is_sbc: false,
                },
            );
        }

        let mut scraped = 0;
        for rating in (FLOOR_BAND.end() + 1)..=max_rating {
            let key = PriceKey::CheapestByRating(rating);
            if !self.needs_refresh(key, now) {
                continue;
            }
            match source.cheapest_by_rating(rating).await {
                Ok(Some(quote)) => {
                    self.insert(key, quote.into_record(Utc::now()));
                    scraped += 1;
                }
                Ok(None) => debug!(rating, "No cheapest listing for rating"),
                Err(e) => warn!(rating, error = %e, "Cheapest-by-rating lookup failed"),
            }
        }

        debug!(max_rating, scraped, "Cheapest-by-rating band updated");
        scraped
    }

    // -- Persistence ------------------------------------------------------

    pub async fn load(store: &dyn KeyValueStore, ttl_minutes: i64) -> Result<Self> {
        let mut cache = Self::new(ttl_minutes);
        if let Some(records) = storage::load_json(store, storage::keys::PRICES).await? {
            cache.records = records;
        }
        let evicted = cache.evict_stale(Utc::now());
        if evicted > 0 {
            debug!(evicted, "Dropped stale cached prices");
        }
        info!(records = cache.records.len(), ttl_minutes, "Price cache loaded");
        Ok(cache)
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<()> {
        storage::save_json(store, storage::keys::PRICES, &self.records).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
