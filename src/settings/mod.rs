//! Three-tier solver settings.
//!
//! Values are keyed by `(sbc_id, challenge_id, option)`. A lookup falls back
//! from the challenge entry to the set entry (`challenge_id = 0`), then to the
//! global entry (`0, 0`), then to the built-in default. The whole tree is
//! persisted as one JSON blob under [`storage::keys::SETTINGS`].

pub mod pins;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::storage::{self, KeyValueStore};
use crate::types::{QueueEntry, SolveStatus};

pub use pins::PinnedItems;

/// Recognised option names.
pub mod keys {
    pub const API_URL: &str = "apiUrl";
    pub const EXCLUDE_TEAMS: &str = "excludeTeams";
    pub const EXCLUDE_RARITY: &str = "excludeRarity";
    pub const EXCLUDE_NATIONS: &str = "excludeNations";
    pub const EXCLUDE_LEAGUES: &str = "excludeLeagues";
    pub const EXCLUDE_PLAYERS: &str = "excludePlayers";
    pub const EXCLUDE_SBC: &str = "excludeSbc";
    pub const EXCLUDE_OBJECTIVE: &str = "excludeObjective";
    pub const USE_CONCEPTS: &str = "useConcepts";
    pub const COLLECT_CONCEPTS: &str = "collectConcepts";
    pub const AUTO_SUBMIT: &str = "autoSubmit";
    pub const MAX_SOLVE_TIME: &str = "maxSolveTime";
    pub const PRICE_CACHE_MINUTES: &str = "priceCacheMinutes";
    pub const MAX_RATING: &str = "maxRating";
    pub const REPEAT_COUNT: &str = "repeatCount";
    pub const USE_DUPES: &str = "useDupes";
    pub const AUTO_OPEN_PACKS: &str = "autoOpenPacks";
    pub const SAVE_TOTW: &str = "saveTotw";
    pub const SBC_ON_LOGIN: &str = "sbcOnLogin";
}

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/solve";

/// Built-in default for every recognised option.
pub fn default_value(key: &str) -> Option<Value> {
    let value = match key {
        keys::API_URL => json!(DEFAULT_API_URL),
        keys::EXCLUDE_TEAMS
        | keys::EXCLUDE_RARITY
        | keys::EXCLUDE_NATIONS
        | keys::EXCLUDE_LEAGUES
        | keys::EXCLUDE_PLAYERS => json!([]),
        keys::USE_CONCEPTS
        | keys::COLLECT_CONCEPTS
        | keys::AUTO_OPEN_PACKS
        | keys::SAVE_TOTW
        | keys::EXCLUDE_SBC
        | keys::EXCLUDE_OBJECTIVE
        | keys::SBC_ON_LOGIN => json!(false),
        keys::USE_DUPES => json!(true),
        keys::AUTO_SUBMIT => json!(0),
        keys::MAX_SOLVE_TIME => json!(60),
        keys::PRICE_CACHE_MINUTES => json!(1440),
        keys::MAX_RATING => json!(99),
        keys::REPEAT_COUNT => json!(0),
        _ => return None,
    };
    Some(value)
}

/// Options seeded at the global level by [`SettingsStore::initialize_defaults`].
/// Every recognised option is listed.
const SEEDED: &[&str] = &[
    keys::API_URL,
    keys::EXCLUDE_TEAMS,
    keys::EXCLUDE_RARITY,
    keys::EXCLUDE_NATIONS,
    keys::EXCLUDE_LEAGUES,
    keys::EXCLUDE_PLAYERS,
    keys::EXCLUDE_SBC,
    keys::EXCLUDE_OBJECTIVE,
    keys::USE_CONCEPTS,
    keys::COLLECT_CONCEPTS,
    keys::AUTO_SUBMIT,
    keys::MAX_SOLVE_TIME,
    keys::PRICE_CACHE_MINUTES,
    keys::MAX_RATING,
    keys::REPEAT_COUNT,
    keys::USE_DUPES,
    keys::AUTO_OPEN_PACKS,
    keys::SAVE_TOTW,
    keys::SBC_ON_LOGIN,
];

/// Booleans may be stored as `true`/`false` or as numbers; non-zero is true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Auto-submit policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSubmit {
    Never,
    Always,
    OptimalOnly,
}

impl AutoSubmit {
    /// Unrecognised values disable auto-submit.
    pub fn from_setting(value: i64) -> Self {
        match value {
            1 => AutoSubmit::Always,
            4 => AutoSubmit::OptimalOnly,
            _ => AutoSubmit::Never,
        }
    }

    pub fn permits(&self, status: SolveStatus) -> bool {
        match self {
            AutoSubmit::Never => false,
            AutoSubmit::Always => status.is_usable(),
            AutoSubmit::OptimalOnly => status.is_optimal(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved view
// ---------------------------------------------------------------------------

/// Every option the solve flow reads, resolved for one challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveSettings {
    pub api_url: String,
    pub max_rating: u8,
    pub use_dupes: bool,
    pub exclude_leagues: BTreeSet<u64>,
    pub exclude_nations: BTreeSet<u64>,
    pub exclude_teams: BTreeSet<u64>,
    pub exclude_rarity: BTreeSet<String>,
    pub exclude_players: BTreeSet<u64>,
    pub exclude_sbc: bool,
    pub exclude_objective: bool,
    pub auto_submit: AutoSubmit,
    pub repeat_count: i64,
    pub max_solve_seconds: u64,
    pub use_concepts: bool,
    pub auto_open_packs: bool,
    pub save_totw: bool,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

type ChallengeMap = BTreeMap<u64, BTreeMap<String, Value>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsStore {
    #[serde(rename = "sbcSettings", default)]
    entries: BTreeMap<u64, ChallengeMap>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, sbc_id: u64, challenge_id: u64, key: &str) -> Option<&Value> {
        self.entries
            .get(&sbc_id)
            .and_then(|c| c.get(&challenge_id))
            .and_then(|m| m.get(key))
            .filter(|v| !v.is_null())
    }

    /// Resolve an option through the challenge → set → global → default chain.
    pub fn get(&self, sbc_id: u64, challenge_id: u64, key: &str) -> Option<Value> {
        self.lookup(sbc_id, challenge_id, key)
            .or_else(|| self.lookup(sbc_id, 0, key))
            .or_else(|| self.lookup(0, 0, key))
            .cloned()
            .or_else(|| default_value(key))
    }

    pub fn set(&mut self, sbc_id: u64, challenge_id: u64, key: &str, value: Value) {
        debug!(sbc_id, challenge_id, key, %value, "Setting updated");
        self.entries
            .entry(sbc_id)
            .or_default()
            .entry(challenge_id)
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Remove an override so the next lookup falls through to the parent level.
    pub fn remove(&mut self, sbc_id: u64, challenge_id: u64, key: &str) -> Option<Value> {
        let challenges = self.entries.get_mut(&sbc_id)?;
        let options = challenges.get_mut(&challenge_id)?;
        let removed = options.remove(key);
        if options.is_empty() {
            challenges.remove(&challenge_id);
        }
        if challenges.is_empty() {
            self.entries.remove(&sbc_id);
        }
        removed
    }

    /// Seed global defaults without overwriting anything. Returns how many
    /// options were added.
    pub fn initialize_defaults(&mut self) -> usize {
        let mut added = 0;
        for key in SEEDED {
            if self.lookup(0, 0, key).is_none() {
                if let Some(value) = default_value(key) {
                    self.set(0, 0, key, value);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn get_bool(&self, sbc_id: u64, challenge_id: u64, key: &str) -> bool {
        self.get(sbc_id, challenge_id, key).is_some_and(|v| is_truthy(&v))
    }

    pub fn get_i64(&self, sbc_id: u64, challenge_id: u64, key: &str) -> i64 {
        self.get(sbc_id, challenge_id, key)
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Id lists may be stored as numbers or numeric strings.
    pub fn get_id_set(&self, sbc_id: u64, challenge_id: u64, key: &str) -> BTreeSet<u64> {
        self.get_list(sbc_id, challenge_id, key)
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect()
    }

    pub fn get_label_set(&self, sbc_id: u64, challenge_id: u64, key: &str) -> BTreeSet<String> {
        self.get_list(sbc_id, challenge_id, key)
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    fn get_list(&self, sbc_id: u64, challenge_id: u64, key: &str) -> Vec<Value> {
        match self.get(sbc_id, challenge_id, key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    pub fn get_string(&self, sbc_id: u64, challenge_id: u64, key: &str) -> Option<String> {
        self.get(sbc_id, challenge_id, key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn price_cache_minutes(&self) -> i64 {
        self.get_i64(0, 0, keys::PRICE_CACHE_MINUTES)
    }

    /// Every option the solve flow needs, resolved for one challenge.
    pub fn resolve(&self, sbc_id: u64, challenge_id: u64) -> SolveSettings {
        SolveSettings {
            api_url: self
                .get_string(sbc_id, challenge_id, keys::API_URL)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            max_rating: self.get_i64(sbc_id, challenge_id, keys::MAX_RATING).clamp(0, 99) as u8,
            use_dupes: self.get_bool(sbc_id, challenge_id, keys::USE_DUPES),
            exclude_leagues: self.get_id_set(sbc_id, challenge_id, keys::EXCLUDE_LEAGUES),
            exclude_nations: self.get_id_set(sbc_id, challenge_id, keys::EXCLUDE_NATIONS),
            exclude_teams: self.get_id_set(sbc_id, challenge_id, keys::EXCLUDE_TEAMS),
            exclude_rarity: self.get_label_set(sbc_id, challenge_id, keys::EXCLUDE_RARITY),
            exclude_players: self.get_id_set(sbc_id, challenge_id, keys::EXCLUDE_PLAYERS),
            exclude_sbc: self.get_bool(sbc_id, challenge_id, keys::EXCLUDE_SBC),
            exclude_objective: self.get_bool(sbc_id, challenge_id, keys::EXCLUDE_OBJECTIVE),
            auto_submit: AutoSubmit::from_setting(self.get_i64(sbc_id, challenge_id, keys::AUTO_SUBMIT)),
            repeat_count: self.get_i64(sbc_id, challenge_id, keys::REPEAT_COUNT),
            max_solve_seconds: self.get_i64(sbc_id, challenge_id, keys::MAX_SOLVE_TIME).max(0) as u64,
            use_concepts: self.get_bool(sbc_id, challenge_id, keys::USE_CONCEPTS),
            auto_open_packs: self.get_bool(sbc_id, challenge_id, keys::AUTO_OPEN_PACKS),
            save_totw: self.get_bool(sbc_id, challenge_id, keys::SAVE_TOTW),
        }
    }

    /// `(sbc, challenge)` pairs explicitly flagged to run at login, in key order.
    pub fn login_entries(&self) -> Vec<QueueEntry> {
        let mut out = Vec::new();
        for (&sbc_id, challenges) in &self.entries {
            if sbc_id == 0 {
                continue;
            }
            for (&challenge_id, options) in challenges {
                if options.get(keys::SBC_ON_LOGIN).is_some_and(is_truthy) {
                    out.push(QueueEntry { sbc_id, challenge_id, label: String::new() });
                }
            }
        }
        out
    }

    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let settings: Self = storage::load_json(store, storage::keys::SETTINGS)
            .await?
            .unwrap_or_default();
        info!(sets = settings.entries.len(), "Solver settings loaded");
        Ok(settings)
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<()> {
        storage::save_json(store, storage::keys::SETTINGS, self).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
