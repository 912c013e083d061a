//! Scripted host for unit tests: serves queued inventory pages per pool and
//! records every page request.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    ChallengeSet, ChallengeSummary, HostApp, InventoryPage, LoadedChallenge, Pack, PageRequest, PoolKind,
    SearchFilters,
};
use crate::types::{Card, Notification};

#[derive(Default)]
pub struct PagedHost {
    pages: Mutex<HashMap<PoolKind, VecDeque<Result<InventoryPage>>>>,
    pub duplicates: Vec<u64>,
    pub requests: Mutex<Vec<(PoolKind, PageRequest)>>,
    pub invalidations: AtomicUsize,
}

impl PagedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, pool: PoolKind, items: Vec<Card>, retrieved_all: bool) -> Self {
        self.push(pool, Ok(InventoryPage { status: 200, items, retrieved_all }))
    }

    pub fn status(self, pool: PoolKind, status: u16, items: Vec<Card>) -> Self {
        self.push(pool, Ok(InventoryPage { status, items, retrieved_all: false }))
    }

    pub fn failure(self, pool: PoolKind) -> Self {
        self.push(pool, Err(anyhow!("connection reset")))
    }

    fn push(self, pool: PoolKind, page: Result<InventoryPage>) -> Self {
        self.pages.lock().unwrap().entry(pool).or_default().push_back(page);
        self
    }

    pub fn requests_for(&self, pool: PoolKind) -> Vec<PageRequest> {
        self.requests.lock().unwrap().iter().filter(|(p, _)| *p == pool).map(|(_, r)| *r).collect()
    }
}

#[async_trait]
impl HostApp for PagedHost {
    async fn invalidate_inventory_cache(&self) -> Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn search_inventory(
        &self,
        pool: PoolKind,
        _filters: &SearchFilters,
        page: PageRequest,
    ) -> Result<InventoryPage> {
        self.requests.lock().unwrap().push((pool, page));
        self.pages
            .lock()
            .unwrap()
            .get_mut(&pool)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(InventoryPage { status: 200, items: vec![], retrieved_all: true }))
    }

    async fn send_unassigned_to_club(&self) -> Result<()> {
        Ok(())
    }

    async fn duplicate_ids(&self) -> Result<Vec<u64>> {
        Ok(self.duplicates.clone())
    }

    async fn challenge_sets(&self) -> Result<Vec<ChallengeSet>> {
        bail!("not scripted")
    }

    async fn challenges(&self, _set_id: u64) -> Result<Vec<ChallengeSummary>> {
        bail!("not scripted")
    }

    async fn load_challenge(&self, _set_id: u64, _challenge_id: u64) -> Result<LoadedChallenge> {
        bail!("not scripted")
    }

    async fn commit_squad(&self, _set_id: u64, _challenge_id: u64, _slots: &[Option<u64>]) -> Result<()> {
        bail!("not scripted")
    }

    async fn submit_challenge(&self, _set_id: u64, _challenge_id: u64) -> Result<()> {
        bail!("not scripted")
    }

    async fn packs(&self) -> Result<Vec<Pack>> {
        bail!("not scripted")
    }

    async fn open_pack(&self, _pack_id: u64) -> Result<Vec<Card>> {
        bail!("not scripted")
    }

    fn notify(&self, _notification: Notification) {}
}

/// Plain tradable gold card for tests.
pub fn card(id: u64, definition_id: u64, rating: u8) -> Card {
    use crate::types::{LocationFlags, Ownership, Position};
    Card {
        id,
        definition_id,
        name: format!("Player {definition_id}"),
        rating,
        rarity_id: 1,
        rarity_label: "Rare Gold".to_string(),
        rating_tier: 3,
        team_id: 1,
        league_id: 1,
        nation_id: 1,
        possible_positions: vec![Position(5)],
        preferred_position: Position(5),
        ownership: Ownership::Tradable,
        location: LocationFlags::default(),
        is_loan: false,
        groups: vec![],
        max_price_limit: None,
        is_locked: false,
        is_fixed: false,
    }
}
