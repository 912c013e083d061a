//! Host application integration.
//!
//! Defines the `HostApp` trait: everything the core asks of the game client
//! (inventory search, challenge data, squad commit and submission, packs and
//! notifications). The bridge client implements it over HTTP.

pub mod bridge;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Card, ChallengeRequirement, Notification, Position};

pub use bridge::BridgeClient;

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Club,
    Storage,
    Concept,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Club => write!(f, "club"),
            PoolKind::Storage => write!(f, "storage"),
            PoolKind::Concept => write!(f, "concept"),
        }
    }
}

/// Search criteria forwarded to the host's inventory query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<u8>,
    /// Highest-rated first.
    #[serde(default)]
    pub sort_rating_desc: bool,
}

impl SearchFilters {
    pub fn highest_rated_first() -> Self {
        Self { sort_rating_desc: true, ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub count: usize,
}

/// One page of an inventory search. A non-2xx `status` ends pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPage {
    pub status: u16,
    #[serde(default)]
    pub items: Vec<Card>,
    #[serde(default)]
    pub retrieved_all: bool,
}

impl InventoryPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Challenges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwardKind {
    Pack,
    Item,
    Coins,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub kind: AwardKind,
    /// Pack id for pack awards, item id or amount otherwise.
    pub value: u64,
}

impl Award {
    pub fn pack_id(&self) -> Option<u64> {
        (self.kind == AwardKind::Pack).then_some(self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSet {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub awards: Vec<Award>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSummary {
    pub id: u64,
    pub set_id: u64,
    pub status: ChallengeStatus,
}

impl ChallengeSummary {
    pub fn is_complete(&self) -> bool {
        self.status == ChallengeStatus::Completed
    }
}

/// Full challenge data as loaded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedChallenge {
    pub id: u64,
    pub set_id: u64,
    pub requirements: Vec<ChallengeRequirement>,
    /// Role for each starting slot.
    pub formation: Vec<Position>,
    #[serde(default)]
    pub brick_indices: Vec<usize>,
    /// Fixed substitutes by definition id, in listed order.
    #[serde(default)]
    pub sub_definition_ids: Vec<u64>,
    #[serde(default)]
    pub awards: Vec<Award>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over the host game client.
///
/// Every remote operation is async request/response; a failure flag or
/// non-2xx status surfaces as an error, except inventory pages which carry
/// their status so pagination can stop without raising.
#[async_trait]
pub trait HostApp: Send + Sync {
    /// Drop any client-side inventory cache before a full resync.
    async fn invalidate_inventory_cache(&self) -> Result<()>;

    async fn search_inventory(
        &self,
        pool: PoolKind,
        filters: &SearchFilters,
        page: PageRequest,
    ) -> Result<InventoryPage>;

    /// Move movable unassigned items into the club.
    async fn send_unassigned_to_club(&self) -> Result<()>;

    /// Instance ids of club cards duplicated by unassigned items.
    async fn duplicate_ids(&self) -> Result<Vec<u64>>;

    async fn challenge_sets(&self) -> Result<Vec<ChallengeSet>>;

    async fn challenges(&self, set_id: u64) -> Result<Vec<ChallengeSummary>>;

    async fn load_challenge(&self, set_id: u64, challenge_id: u64) -> Result<LoadedChallenge>;

    /// Apply a squad: one card id per slot, `None` for empty slots.
    async fn commit_squad(&self, set_id: u64, challenge_id: u64, slots: &[Option<u64>]) -> Result<()>;

    async fn submit_challenge(&self, set_id: u64, challenge_id: u64) -> Result<()>;

    async fn packs(&self) -> Result<Vec<Pack>>;

    /// Open a pack, returning the items it contained.
    async fn open_pack(&self, pack_id: u64) -> Result<Vec<Card>>;

    /// Show a message to the user. Fire-and-forget.
    fn notify(&self, notification: Notification);
}
