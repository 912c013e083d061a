//! Process-wide mutable state owned by the orchestrator: price cache,
//! solver settings, pinned items and the collected concept pool.

use anyhow::{Context, Result};
use tracing::info;

use crate::engine::price_cache::PriceCache;
use crate::settings::{PinnedItems, SettingsStore};
use crate::storage::KeyValueStore;
use crate::types::Card;

/// Concept cards gathered after login. Until `collected` is set the
/// `useConcepts` option has no effect.
#[derive(Debug, Clone, Default)]
pub struct ConceptPool {
    pub collected: bool,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone)]
pub struct SharedState {
    pub prices: PriceCache,
    pub settings: SettingsStore,
    pub pins: PinnedItems,
    pub concepts: ConceptPool,
}

impl SharedState {
    /// Restore everything from `store`, seeding missing global defaults.
    pub async fn load(store: &dyn KeyValueStore, retry_backoff_max_ms: u64) -> Result<Self> {
        let mut settings = SettingsStore::load(store).await.context("Failed to load solver settings")?;
        let seeded = settings.initialize_defaults();
        if seeded > 0 {
            info!(seeded, "Seeded default solver settings");
            settings.persist(store).await.context("Failed to persist seeded settings")?;
        }

        let pins = PinnedItems::load(store).await.context("Failed to load pinned items")?;
        let prices = PriceCache::load(store, settings.price_cache_minutes())
            .await
            .context("Failed to load price cache")?
            .with_retry_backoff_ms(retry_backoff_max_ms);

        Ok(Self { prices, settings, pins, concepts: ConceptPool::default() })
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<()> {
        self.settings.persist(store).await?;
        self.pins.persist(store).await?;
        self.prices.persist(store).await
    }

    pub async fn persist_prices(&self, store: &dyn KeyValueStore) -> Result<()> {
        self.prices.persist(store).await
    }

    pub async fn persist_pins(&self, store: &dyn KeyValueStore) -> Result<()> {
        self.pins.persist(store).await
    }

    /// Drop session data (cached prices and concepts). Settings and pins survive.
    pub fn reset(&mut self) {
        self.prices.clear();
        self.concepts = ConceptPool::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
