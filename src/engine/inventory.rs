//! Inventory synchronizer.
//!
//! Pages through the club, storage and concept pools and merges them into
//! one candidate inventory. Pagination never raises: a failed or non-2xx
//! page ends the walk and whatever was gathered so far is returned.

use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::price_cache::PriceCache;
use crate::host::{HostApp, PageRequest, PoolKind, SearchFilters};
use crate::settings::PinnedItems;
use crate::types::Card;

/// Fixed page size for every pool.
pub const PAGE_SIZE: usize = 91;

/// Merged inventory for one solve attempt.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub cards: Vec<Card>,
    pub storage_ids: HashSet<u64>,
    /// Instance ids of tracked duplicates.
    pub duplicate_ids: HashSet<u64>,
}

impl Inventory {
    pub fn owned_definition_ids(&self) -> HashSet<u64> {
        self.cards.iter().filter(|c| !c.is_concept()).map(|c| c.definition_id).collect()
    }

    pub fn find(&self, id: u64) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }
}

pub struct InventorySynchronizer<'a> {
    host: &'a dyn HostApp,
}

impl<'a> InventorySynchronizer<'a> {
    pub fn new(host: &'a dyn HostApp) -> Self {
        Self { host }
    }

    /// Walk one pool page by page until the host reports everything
    /// retrieved, `cap` cards are gathered, a page is empty, or a page fails.
    pub async fn fetch_pool(&self, pool: PoolKind, filters: &SearchFilters, cap: Option<usize>) -> Vec<Card> {
        let mut gathered: Vec<Card> = Vec::new();
        let mut offset = 0;

        loop {
            let request = PageRequest { offset, count: PAGE_SIZE };
            let page = match self.host.search_inventory(pool, filters, request).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(%pool, offset, error = %e, "Inventory page failed, keeping partial result");
                    break;
                }
            };

            if !page.is_success() {
                warn!(%pool, offset, status = page.status, "Inventory page rejected, keeping partial result");
                break;
            }

            let received = page.items.len();
            gathered.extend(page.items);

            if page.retrieved_all || received == 0 || cap.is_some_and(|c| gathered.len() >= c) {
                break;
            }
            offset += PAGE_SIZE;
        }

        if let Some(cap) = cap {
            gathered.truncate(cap);
        }
        debug!(%pool, count = gathered.len(), "Pool fetched");
        gathered
    }

    /// Full resync: club minus anything also in storage, then storage, then
    /// usable concept cards when given. Derived flags are set on the way.
    pub async fn synchronize(
        &self,
        pins: &PinnedItems,
        concepts: Option<&[Card]>,
        prices: &PriceCache,
    ) -> Result<Inventory> {
        if let Err(e) = self.host.invalidate_inventory_cache().await {
            warn!(error = %e, "Failed to invalidate host inventory cache");
        }

        let filters = SearchFilters::default();
        let club = self.fetch_pool(PoolKind::Club, &filters, None).await;
        let storage = self.fetch_pool(PoolKind::Storage, &filters, None).await;
        let duplicate_ids: HashSet<u64> = self.host.duplicate_ids().await?.into_iter().collect();

        let storage_definitions: HashSet<u64> = storage.iter().map(|c| c.definition_id).collect();
        let storage_ids: HashSet<u64> = storage.iter().map(|c| c.id).collect();

        let mut cards: Vec<Card> = club
            .into_iter()
            .filter(|c| !storage_definitions.contains(&c.definition_id))
            .collect();
        cards.extend(storage.into_iter().map(|mut c| {
            c.location.is_storage = true;
            c
        }));

        let mut concept_count = 0;
        if let Some(concepts) = concepts {
            let mut seen: HashSet<u64> = cards.iter().map(|c| c.definition_id).collect();
            for concept in concepts {
                if prices.is_extinct(concept.definition_id) || !seen.insert(concept.definition_id) {
                    continue;
                }
                let mut concept = concept.clone();
                concept.location.is_concept = true;
                cards.push(concept);
                concept_count += 1;
            }
        }

        for card in &mut cards {
            card.location.is_duplicate = duplicate_ids.contains(&card.id);
            card.is_fixed = pins.is_fixed(card.id);
            card.is_locked = pins.is_locked(card.definition_id);
        }

        info!(
            total = cards.len(),
            storage = storage_ids.len(),
            duplicates = duplicate_ids.len(),
            concepts = concept_count,
            "Inventory synchronized"
        );

        Ok(Inventory { cards, storage_ids, duplicate_ids })
    }

    /// The whole concept pool, flagged as concept cards.
    pub async fn collect_concepts(&self) -> Vec<Card> {
        let mut concepts = self
            .fetch_pool(PoolKind::Concept, &SearchFilters::highest_rated_first(), None)
            .await;
        for card in &mut concepts {
            card.location.is_concept = true;
        }
        info!(count = concepts.len(), "Concept pool collected");
        concepts
    }

    /// Highest rating on the first concept page.
    pub async fn highest_concept_rating(&self) -> Option<u8> {
        self.fetch_pool(PoolKind::Concept, &SearchFilters::highest_rated_first(), Some(PAGE_SIZE))
            .await
            .iter()
            .map(|c| c.rating)
            .max()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
