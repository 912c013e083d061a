//! Shared types for SBCPILOT.
//!
//! These types form the data model used across all modules: owned cards,
//! cached prices, challenge descriptors, solver payloads and the queue of
//! deferred challenges. They carry no behaviour beyond small derived
//! helpers so that inventory, pricing, settings and engine modules can all
//! depend on them without circular references.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// Formation role identifier, as numbered by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub u16);

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    Tradable,
    Untradeable,
}

/// Where a card lives, derived while cross-referencing the inventory pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFlags {
    #[serde(default)]
    pub is_storage: bool,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default)]
    pub is_concept: bool,
    #[serde(default)]
    pub is_time_limited: bool,
}

/// An owned (or loaned/concept) player card.
///
/// `id` identifies the physical copy, `definition_id` the catalog item and is
/// shared by every copy of the same card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: u64,
    pub definition_id: u64,
    #[serde(default)]
    pub name: String,
    pub rating: u8,
    pub rarity_id: u32,
    /// Localised card-type label, e.g. "Rare Gold" or "Evolution".
    #[serde(default)]
    pub rarity_label: String,
    #[serde(default)]
    pub rating_tier: u8,
    pub team_id: u64,
    pub league_id: u64,
    pub nation_id: u64,
    pub possible_positions: Vec<Position>,
    pub preferred_position: Position,
    pub ownership: Ownership,
    #[serde(default)]
    pub location: LocationFlags,
    /// Loan items are never offered to the solver.
    #[serde(default)]
    pub is_loan: bool,
    #[serde(default)]
    pub groups: Vec<u32>,
    /// Upper transfer-market price limit reported by the host, if any.
    #[serde(default)]
    pub max_price_limit: Option<u64>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_fixed: bool,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} ({} {})",
            self.id, self.definition_id, self.name, self.rating, self.rarity_label
        )
    }
}

impl Card {
    pub fn is_untradeable(&self) -> bool {
        self.ownership == Ownership::Untradeable
    }

    pub fn is_concept(&self) -> bool {
        self.location.is_concept
    }

    pub fn is_storage(&self) -> bool {
        self.location.is_storage
    }

    /// Evolution cards are priced with a premium regardless of market data.
    pub fn is_evolution(&self) -> bool {
        self.rarity_label.to_lowercase().contains("evolution")
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Key into the price cache.
///
/// Catalog prices are keyed by definition id; the synthetic
/// cheapest-by-rating band is keyed by `"<rating>_CBR"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceKey {
    Definition(u64),
    CheapestByRating(u8),
}

const CBR_SUFFIX: &str = "_CBR";

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceKey::Definition(id) => write!(f, "{id}"),
            PriceKey::CheapestByRating(rating) => write!(f, "{rating}{CBR_SUFFIX}"),
        }
    }
}

impl FromStr for PriceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rating) = s.strip_suffix(CBR_SUFFIX) {
            return rating
                .parse()
                .map(PriceKey::CheapestByRating)
                .map_err(|e| format!("bad rating in price key '{s}': {e}"));
        }
        s.parse()
            .map(PriceKey::Definition)
            .map_err(|e| format!("bad price key '{s}': {e}"))
    }
}

/// One cached market price.
///
/// `price == None` means "price unknown" and must never be read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub price: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_extinct: bool,
    #[serde(default)]
    pub is_objective: bool,
    #[serde(default)]
    pub is_sbc: bool,
}

impl PriceRecord {
    /// Stale iff strictly older than the TTL.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.timestamp > ttl
    }
}

/// A single quote returned by a remote price source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub definition_id: u64,
    pub price: Option<u64>,
    pub is_extinct: bool,
    pub is_objective: bool,
    pub is_sbc: bool,
}

impl PriceQuote {
    pub fn into_record(self, timestamp: DateTime<Utc>) -> PriceRecord {
        PriceRecord {
            price: self.price,
            timestamp,
            is_extinct: self.is_extinct,
            is_objective: self.is_objective,
            is_sbc: self.is_sbc,
        }
    }
}

// ---------------------------------------------------------------------------
// Challenges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequirementScope {
    Exact,
    Any,
}

/// Eligibility requirement key as named by the host (open-ended set).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementKey(pub String);

impl RequirementKey {
    pub const PLAYER_RARITY_GROUP: &'static str = "PLAYER_RARITY_GROUP";

    pub fn new(key: &str) -> Self {
        Self(key.to_string())
    }

    pub fn is(&self, key: &str) -> bool {
        self.0 == key
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequirement {
    pub scope: RequirementScope,
    pub count: i32,
    pub requirement_key: RequirementKey,
    pub eligibility_values: Vec<i64>,
}

/// A formation slot: a concrete role, or a wildcard ("brick") accepting any
/// position. Serialised as the role number, `-1` for the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Slot {
    Role(Position),
    Wildcard,
}

impl From<i32> for Slot {
    fn from(value: i32) -> Self {
        if value < 0 {
            Slot::Wildcard
        } else {
            Slot::Role(Position(value as u16))
        }
    }
}

impl From<Slot> for i32 {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Role(Position(p)) => i32::from(p),
            Slot::Wildcard => -1,
        }
    }
}

/// Everything the solver needs to know about one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDescriptor {
    pub constraints: Vec<ChallengeRequirement>,
    pub formation: Vec<Slot>,
    pub brick_indices: Vec<usize>,
    pub challenge_id: u64,
    pub set_id: u64,
    /// Fixed substitutes, by definition id, in the order the challenge lists them.
    pub subs: Vec<u64>,
    #[serde(rename = "finalSBC")]
    pub final_sbc: bool,
    /// Pack ids awarded on completion.
    pub awards: Vec<u64>,
}

/// A challenge deferred for later automatic attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub sbc_id: u64,
    #[serde(default)]
    pub challenge_id: u64,
    #[serde(default)]
    pub label: String,
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.label, self.sbc_id, self.challenge_id)
    }
}

// ---------------------------------------------------------------------------
// Solver payloads
// ---------------------------------------------------------------------------

/// A candidate card as sent to the solver. `price` is the solve cost, not
/// the market price; the raw market price travels in `futgg_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedCard {
    pub id: u64,
    pub name: String,
    pub card_type: String,
    pub definition_id: u64,
    pub rating: u8,
    pub team_id: u64,
    pub league_id: u64,
    pub nation_id: u64,
    pub rarity_id: u32,
    pub rating_tier: u8,
    pub is_untradeable: bool,
    pub is_duplicate: bool,
    pub is_storage: bool,
    pub preferred_position: Position,
    pub possible_positions: Vec<Position>,
    pub groups: Vec<u32>,
    pub is_fixed: bool,
    pub concept: bool,
    pub price: f64,
    pub futgg_price: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveRequest {
    #[serde(rename = "clubPlayers")]
    pub candidates: Vec<PricedCard>,
    #[serde(rename = "sbcData")]
    pub descriptor: ChallengeDescriptor,
    #[serde(rename = "maxSolveTime")]
    pub max_solve_seconds: u64,
}

/// Solver outcome. Only codes 2 and 4 are usable; 4 means optimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Feasible,
    Optimal,
    Failed(i64),
}

impl SolveStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => SolveStatus::Feasible,
            4 => SolveStatus::Optimal,
            other => SolveStatus::Failed(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            SolveStatus::Feasible => 2,
            SolveStatus::Optimal => 4,
            SolveStatus::Failed(code) => *code,
        }
    }

    pub fn is_usable(&self) -> bool {
        !matches!(self, SolveStatus::Failed(_))
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Feasible => write!(f, "FEASIBLE"),
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::Failed(code) => write!(f, "FAILED({code})"),
        }
    }
}

/// One card of the solver's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub card_id: u64,
    pub is_positional_match: bool,
    pub assigned_role: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveResponse {
    pub status: SolveStatus,
    pub message: String,
    pub assignment: Vec<Assignment>,
}

/// Concrete squad: starting slots first, then substitutes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Squad {
    pub slots: Vec<Option<Card>>,
}

impl Squad {
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn card_ids(&self) -> Vec<Option<u64>> {
        self.slots.iter().map(|s| s.as_ref().map(|c| c.id)).collect()
    }
}

// ---------------------------------------------------------------------------
// Notifications and run phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Positive,
    Neutral,
    Negative,
}

/// A user-visible message routed through the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn positive(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: NotificationKind::Positive }
    }

    pub fn neutral(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: NotificationKind::Neutral }
    }

    pub fn negative(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: NotificationKind::Negative }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    #[default]
    Idle,
    LoadChallenge,
    SyncInventory,
    PriceRefresh,
    AwaitSolve,
    MapSolution,
    Review,
    Submitting,
    OpenPacks,
    DequeueNext,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SBCPILOT.
#[derive(Debug, thiserror::Error)]
pub enum SbcError {
    #[error("Network error during {operation}: {message}")]
    TransientNetwork { operation: String, message: String },

    #[error("Remote rejected {operation} (status {status})")]
    RemoteRejection { operation: String, status: u16 },

    #[error("No eligible challenge: {0}")]
    NoEligibleChallenge(String),

    #[error("Solver returned no usable squad (code {code}): {message}")]
    SolveUnsatisfiable { code: i64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SbcError {
    pub fn network(operation: &str, message: impl fmt::Display) -> Self {
        SbcError::TransientNetwork { operation: operation.to_string(), message: message.to_string() }
    }

    pub fn rejected(operation: &str, status: u16) -> Self {
        SbcError::RemoteRejection { operation: operation.to_string(), status }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
