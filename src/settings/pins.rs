//! User-pinned cards.
//!
//! Locked cards (by definition id) are never offered to the solver. Fixed
//! cards (by instance id) must be used and are priced at 1. A card cannot be
//! both: fixing a locked definition is refused.

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::debug;

use crate::storage::{self, KeyValueStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedItems {
    locked: BTreeSet<u64>,
    fixed: BTreeSet<u64>,
}

impl PinnedItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&mut self, definition_id: u64) -> bool {
        self.locked.insert(definition_id)
    }

    pub fn unlock(&mut self, definition_id: u64) -> bool {
        self.locked.remove(&definition_id)
    }

    pub fn is_locked(&self, definition_id: u64) -> bool {
        self.locked.contains(&definition_id)
    }

    /// Returns false if the card's definition is locked.
    pub fn fix(&mut self, id: u64, definition_id: u64) -> bool {
        if self.is_locked(definition_id) {
            return false;
        }
        self.fixed.insert(id);
        true
    }

    pub fn unfix(&mut self, id: u64) -> bool {
        self.fixed.remove(&id)
    }

    pub fn is_fixed(&self, id: u64) -> bool {
        self.fixed.contains(&id)
    }

    pub fn locked(&self) -> &BTreeSet<u64> {
        &self.locked
    }

    pub fn fixed(&self) -> &BTreeSet<u64> {
        &self.fixed
    }

    /// Drop locks for definitions no longer owned. Returns the number dropped.
    pub fn cleanup_locked(&mut self, owned_definition_ids: &BTreeSet<u64>) -> usize {
        let before = self.locked.len();
        self.locked.retain(|id| owned_definition_ids.contains(id));
        before - self.locked.len()
    }

    /// Drop fixes for instances no longer owned. Returns the number dropped.
    pub fn cleanup_fixed(&mut self, owned_ids: &BTreeSet<u64>) -> usize {
        let before = self.fixed.len();
        self.fixed.retain(|id| owned_ids.contains(id));
        before - self.fixed.len()
    }

    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let locked = storage::load_json(store, storage::keys::LOCKED_ITEMS).await?.unwrap_or_default();
        let fixed = storage::load_json(store, storage::keys::FIXED_ITEMS).await?.unwrap_or_default();
        let pins = Self { locked, fixed };
        debug!(locked = pins.locked.len(), fixed = pins.fixed.len(), "Pinned items loaded");
        Ok(pins)
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<()> {
        storage::save_json(store, storage::keys::LOCKED_ITEMS, &self.locked).await?;
        storage::save_json(store, storage::keys::FIXED_ITEMS, &self.fixed).await
    }
}
