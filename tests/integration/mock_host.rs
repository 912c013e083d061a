//! Mock collaborators for integration testing.
//!
//! `MockHost` is a deterministic in-memory host: one club, scripted
//! challenge sets, recorded commits/submits/notifications. `MockSolver`
//! answers from a script or assigns the first candidates to the formation.
//! `FixedPrices` quotes the same price for every id.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use sbcpilot::control::ControlHandle;
use sbcpilot::host::{
    Award, AwardKind, ChallengeSet, ChallengeStatus, ChallengeSummary, HostApp, InventoryPage,
    LoadedChallenge, Pack, PageRequest, PoolKind, SearchFilters,
};
use sbcpilot::prices::PriceSource;
use sbcpilot::solver::Solver;
use sbcpilot::types::*;

pub const AWARD_PACK: u64 = 900;
pub const SET_REWARD_ITEM: u64 = 7_777;

/// Tradable gold card playing role 5.
pub fn card(id: u64, definition_id: u64, rating: u8) -> Card {
    Card {
        id,
        definition_id,
        name: format!("Player {definition_id}"),
        rating,
        rarity_id: 1,
        rarity_label: "Rare Gold".to_string(),
        rating_tier: 3,
        team_id: 10,
        league_id: 13,
        nation_id: 14,
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

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

pub struct MockHost {
    club: Vec<Card>,
    concepts: Vec<Card>,
    sets: Arc<Mutex<Vec<ChallengeSet>>>,
    challenges: Arc<Mutex<HashMap<u64, Vec<ChallengeSummary>>>>,
    commits: Arc<Mutex<Vec<Vec<Option<u64>>>>>,
    submits: Arc<Mutex<Vec<(u64, u64)>>>,
    opened: Arc<Mutex<Vec<u64>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
    /// If set, challenge listing fails with this error.
    force_error: Arc<Mutex<Option<String>>>,
    /// Request a stop once this many submits happened.
    stop_after: Option<(usize, ControlHandle)>,
    complete_on_submit: bool,
}

impl MockHost {
    /// One repeatable set (id 100, "Daily Bronze") with a single challenge.
    pub fn new() -> Self {
        let host = Self {
            club: (1..=6).map(|i| card(i, 1_000 + i, 70 + i as u8)).collect(),
            concepts: vec![card(50, 5_050, 91)],
            sets: Arc::new(Mutex::new(Vec::new())),
            challenges: Arc::new(Mutex::new(HashMap::new())),
            commits: Arc::new(Mutex::new(Vec::new())),
            submits: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(Mutex::new(Vec::new())),
            notifications: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
            stop_after: None,
            complete_on_submit: false,
        };
        host.with_set(100, "Daily Bronze", &[1], false)
    }

    pub fn with_set(self, id: u64, name: &str, challenge_ids: &[u64], is_complete: bool) -> Self {
        let status = if is_complete { ChallengeStatus::Completed } else { ChallengeStatus::NotStarted };
        self.sets.lock().unwrap().push(ChallengeSet {
            id,
            name: name.to_string(),
            is_complete,
            awards: vec![
                Award { kind: AwardKind::Pack, value: 901 },
                Award { kind: AwardKind::Item, value: SET_REWARD_ITEM },
            ],
        });
        self.challenges.lock().unwrap().insert(
            id,
            challenge_ids.iter().map(|&c| ChallengeSummary { id: c, set_id: id, status }).collect(),
        );
        self
    }

    pub fn stop_after(mut self, submits: usize, control: ControlHandle) -> Self {
        self.stop_after = Some((submits, control));
        self
    }

    pub fn complete_on_submit(mut self) -> Self {
        self.complete_on_submit = true;
        self
    }

    pub fn set_error(&self, error: Option<String>) {
        *self.force_error.lock().unwrap() = error;
    }

    pub fn submits(&self) -> Vec<(u64, u64)> {
        self.submits.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<Vec<Option<u64>>> {
        self.commits.lock().unwrap().clone()
    }

    pub fn opened_packs(&self) -> Vec<u64> {
        self.opened.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn messages(&self, kind: NotificationKind) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.message)
            .collect()
    }

    pub fn completion_messages(&self) -> Vec<String> {
        self.messages(NotificationKind::Positive)
            .into_iter()
            .filter(|m| m.ends_with("Completed"))
            .collect()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(e) => Err(anyhow!("{e}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostApp for MockHost {
    async fn invalidate_inventory_cache(&self) -> Result<()> {
        Ok(())
    }

    async fn search_inventory(
        &self,
        pool: PoolKind,
        _filters: &SearchFilters,
        page: PageRequest,
    ) -> Result<InventoryPage> {
        let source = match pool {
            PoolKind::Club => &self.club,
            PoolKind::Concept => &self.concepts,
            PoolKind::Storage => return Ok(InventoryPage { status: 200, items: vec![], retrieved_all: true }),
        };
        let items: Vec<Card> = source.iter().skip(page.offset).take(page.count).cloned().collect();
        let retrieved_all = page.offset + items.len() >= source.len();
        Ok(InventoryPage { status: 200, items, retrieved_all })
    }

    async fn send_unassigned_to_club(&self) -> Result<()> {
        Ok(())
    }

    async fn duplicate_ids(&self) -> Result<Vec<u64>> {
        Ok(vec![])
    }

    async fn challenge_sets(&self) -> Result<Vec<ChallengeSet>> {
        self.check_error()?;
        Ok(self.sets.lock().unwrap().clone())
    }

    async fn challenges(&self, set_id: u64) -> Result<Vec<ChallengeSummary>> {
        self.check_error()?;
        Ok(self.challenges.lock().unwrap().get(&set_id).cloned().unwrap_or_default())
    }

    async fn load_challenge(&self, set_id: u64, challenge_id: u64) -> Result<LoadedChallenge> {
        Ok(LoadedChallenge {
            id: challenge_id,
            set_id,
            requirements: vec![ChallengeRequirement {
                scope: RequirementScope::Exact,
                count: 3,
                requirement_key: RequirementKey::new("PLAYER_QUALITY"),
                eligibility_values: vec![3],
            }],
            formation: vec![Position(5); 3],
            brick_indices: vec![],
            sub_definition_ids: vec![],
            awards: vec![Award { kind: AwardKind::Pack, value: AWARD_PACK }],
        })
    }

    async fn commit_squad(&self, _set_id: u64, _challenge_id: u64, slots: &[Option<u64>]) -> Result<()> {
        self.commits.lock().unwrap().push(slots.to_vec());
        Ok(())
    }

    async fn submit_challenge(&self, set_id: u64, challenge_id: u64) -> Result<()> {
        let count = {
            let mut submits = self.submits.lock().unwrap();
            submits.push((set_id, challenge_id));
            submits.len()
        };

        if self.complete_on_submit {
            let mut challenges = self.challenges.lock().unwrap();
            if let Some(list) = challenges.get_mut(&set_id) {
                for c in list.iter_mut().filter(|c| c.id == challenge_id) {
                    c.status = ChallengeStatus::Completed;
                }
                if list.iter().all(|c| c.is_complete()) {
                    for set in self.sets.lock().unwrap().iter_mut().filter(|s| s.id == set_id) {
                        set.is_complete = true;
                    }
                }
            }
        }

        if let Some((limit, control)) = &self.stop_after {
            if count >= *limit {
                control.request_stop();
            }
        }
        Ok(())
    }

    async fn packs(&self) -> Result<Vec<Pack>> {
        Ok(vec![
            Pack { id: 42, name: "Gold Pack".into() },
            Pack { id: AWARD_PACK, name: "Rare Players Pack".into() },
        ])
    }

    async fn open_pack(&self, pack_id: u64) -> Result<Vec<Card>> {
        self.opened.lock().unwrap().push(pack_id);
        Ok(vec![card(700, 8_700, 84)])
    }

    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

pub struct MockSolver {
    status: SolveStatus,
    scripted: Mutex<VecDeque<Result<SolveResponse>>>,
    requests: Mutex<Vec<(String, usize)>>,
    /// Request a stop while "solving".
    stop_during_solve: Option<ControlHandle>,
}

impl MockSolver {
    pub fn new(status: SolveStatus) -> Self {
        Self {
            status,
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            stop_during_solve: None,
        }
    }

    pub fn optimal() -> Self {
        Self::new(SolveStatus::Optimal)
    }

    pub fn then(self, response: Result<SolveResponse>) -> Self {
        self.scripted.lock().unwrap().push_back(response);
        self
    }

    pub fn stopping(mut self, control: ControlHandle) -> Self {
        self.stop_during_solve = Some(control);
        self
    }

    /// `(endpoint, candidate count)` per call.
    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Solver for MockSolver {
    async fn solve(&self, endpoint: &str, request: &SolveRequest) -> Result<SolveResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), request.candidates.len()));
        if let Some(control) = &self.stop_during_solve {
            control.request_stop();
        }
        if let Some(scripted) = self.scripted.lock().unwrap().pop_front() {
            return scripted;
        }

        let assignment = request
            .candidates
            .iter()
            .zip(&request.descriptor.formation)
            .map(|(candidate, slot)| match slot {
                Slot::Role(role) => Assignment { card_id: candidate.id, is_positional_match: true, assigned_role: *role },
                Slot::Wildcard => Assignment { card_id: candidate.id, is_positional_match: false, assigned_role: Position(0) },
            })
            .collect();
        Ok(SolveResponse { status: self.status, message: self.status.to_string(), assignment })
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

pub struct FixedPrices(pub u64);

#[async_trait]
impl PriceSource for FixedPrices {
    async fn fetch_prices(&self, definition_ids: &[u64]) -> Result<Vec<PriceQuote>> {
        Ok(definition_ids
            .iter()
            .map(|&definition_id| PriceQuote {
                definition_id,
                price: Some(self.0),
                is_extinct: false,
                is_objective: false,
                is_sbc: false,
            })
            .collect())
    }

    async fn cheapest_by_rating(&self, _rating: u8) -> Result<Option<PriceQuote>> {
        Ok(None)
    }
}
