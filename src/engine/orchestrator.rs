//! Challenge queue orchestrator.
//!
//! Drives one solve attempt through load → sync → price → solve → map →
//! review/submit, repeats completed sets according to `repeatCount`, and
//! drains the FIFO queue of deferred challenges one entry at a time.
//!
//! Only one flow runs at a time: the orchestrator owns its state by `&mut`
//! and shares nothing but the run status, the queue and the stop flag.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::candidates::{build_candidates, CandidateFilter};
use super::descriptor::{build_descriptor, select_challenge};
use super::hooks::{value_squad, CoreHooks, SquadValuation};
use super::inventory::InventorySynchronizer;
use super::mapper::SolutionMapper;
use super::price_cache::FLOOR_BAND;
use crate::control::{ActiveChallenge, ControlHandle, RepeatProgress};
use crate::host::{AwardKind, HostApp, PoolKind, SearchFilters};
use crate::prices::PriceSource;
use crate::pricing::PricingEngine;
use crate::settings::keys;
use crate::solver::Solver;
use crate::state::{ConceptPool, SharedState};
use crate::storage::KeyValueStore;
use crate::types::{
    Card, ChallengeDescriptor, Notification, QueueEntry, RunPhase, SbcError, SolveRequest, Squad,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a single attempt ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Squad applied and left for manual submission.
    Review,
    Submitted { final_sbc: bool, repeat_count: i64 },
    /// A stop request arrived while the solver was working.
    Cancelled,
}

/// How a chain of attempts (including repeats) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Left at review, or the repeat budget ran out.
    Finished,
    Failed,
    Stopped,
}

/// Next step of a repeat chain after a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatStep {
    /// Completion message to show, if any.
    pub message: Option<String>,
    /// Remaining count for the next attempt, or `None` to stop.
    pub next: Option<i64>,
}

/// Advance the repeat counter after a successful submit.
///
/// `total` is the configured `repeatCount`, `remaining` the signed count
/// carried by the chain. Negative counts never run out; positive counts
/// only decrease when the submitted challenge was the last of its set.
pub fn repeat_step(total: i64, remaining: i64, final_sbc: bool) -> RepeatStep {
    if remaining == 0 {
        return RepeatStep {
            message: (total > 0).then(|| format!("{total} / {total} Completed")),
            next: None,
        };
    }

    let after = if final_sbc { remaining - 1 } else { remaining };
    let message = if remaining < 0 {
        format!("{} Completed", remaining.abs())
    } else {
        format!("{} / {total} Completed", total - after)
    };
    RepeatStep { message: Some(message), next: Some(after) }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    host: Arc<dyn HostApp>,
    solver: Arc<dyn Solver>,
    price_source: Arc<dyn PriceSource>,
    store: Arc<dyn KeyValueStore>,
    state: SharedState,
    engine: PricingEngine,
    control: ControlHandle,
}

impl Orchestrator {
    pub fn new(
        host: Arc<dyn HostApp>,
        solver: Arc<dyn Solver>,
        price_source: Arc<dyn PriceSource>,
        store: Arc<dyn KeyValueStore>,
        state: SharedState,
        control: ControlHandle,
    ) -> Self {
        Self {
            host,
            solver,
            price_source,
            store,
            state,
            engine: PricingEngine::default(),
            control,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SharedState {
        &mut self.state
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    pub async fn persist(&self) -> Result<()> {
        self.state.persist(self.store.as_ref()).await
    }

    // -- Entry points -----------------------------------------------------

    /// Solve one challenge (0 = last incomplete of the set), run its repeat
    /// chain, then work through the queue unless stopped.
    pub async fn solve(&mut self, sbc_id: u64, challenge_id: u64, allow_auto_submit: bool) -> ChainOutcome {
        // A stop pressed while idle must not cancel a fresh request.
        self.control.take_stop();

        let outcome = self.run_chain(sbc_id, challenge_id, allow_auto_submit).await;
        if outcome != ChainOutcome::Stopped {
            self.drain_queue().await;
        }
        self.set_phase(RunPhase::Idle).await;
        outcome
    }

    /// Run queued entries strictly one after another. A failed entry moves
    /// on to the next; a stop leaves the rest of the queue in place.
    pub async fn drain_queue(&mut self) -> usize {
        let mut ran = 0;
        loop {
            if self.control.take_stop() {
                self.notify(Notification::neutral("SBC Stopped")).await;
                break;
            }
            let Some(entry) = self.control.dequeue().await else {
                break;
            };

            self.set_phase(RunPhase::DequeueNext).await;
            info!(sbc_id = entry.sbc_id, challenge_id = entry.challenge_id, label = %entry.label, "Dequeued challenge");
            self.notify(Notification::positive(format!("{} SBC Started", entry.label))).await;

            ran += 1;
            if self.run_chain(entry.sbc_id, entry.challenge_id, true).await == ChainOutcome::Stopped {
                break;
            }
        }
        self.set_phase(RunPhase::Idle).await;
        ran
    }

    /// One challenge plus its repeats.
    pub async fn run_chain(&mut self, sbc_id: u64, challenge_id: u64, allow_auto_submit: bool) -> ChainOutcome {
        let mut challenge_id = challenge_id;
        let mut repeat: Option<RepeatProgress> = None;

        loop {
            let attempt_id = Uuid::new_v4();
            let span = info_span!("attempt", %attempt_id, sbc_id, challenge_id);
            let result = self.attempt(sbc_id, challenge_id, allow_auto_submit).instrument(span).await;

            let (final_sbc, repeat_count) = match result {
                Ok(AttemptOutcome::Review) => return ChainOutcome::Finished,
                Ok(AttemptOutcome::Cancelled) => {
                    info!(sbc_id, "Solve cancelled");
                    self.notify(Notification::neutral("SBC Stopped")).await;
                    return ChainOutcome::Stopped;
                }
                Ok(AttemptOutcome::Submitted { final_sbc, repeat_count }) => (final_sbc, repeat_count),
                Err(e) => {
                    self.report_failure(sbc_id, &e).await;
                    return ChainOutcome::Failed;
                }
            };

            let progress = *repeat.get_or_insert(RepeatProgress { remaining: repeat_count, total: repeat_count });
            let step = repeat_step(progress.total, progress.remaining, final_sbc);
            if let Some(message) = &step.message {
                self.notify(Notification::positive(message.clone())).await;
            }

            let Some(next) = step.next else {
                info!(sbc_id, total = progress.total, "Repeat chain complete");
                return ChainOutcome::Finished;
            };

            let progress = RepeatProgress { remaining: next, total: progress.total };
            repeat = Some(progress);
            self.control.update(|s| s.repeat = Some(progress)).await;

            if self.control.take_stop() {
                info!(sbc_id, "Stop requested, repeat chain halted");
                self.notify(Notification::neutral("SBC Stopped")).await;
                return ChainOutcome::Stopped;
            }
            debug!(sbc_id, remaining = next, "Repeating challenge set");
            challenge_id = 0;
        }
    }

    /// A single pass through the state machine.
    pub async fn attempt(&mut self, sbc_id: u64, challenge_id: u64, allow_auto_submit: bool) -> Result<AttemptOutcome> {
        self.control
            .update(|s| {
                s.attempts += 1;
                s.current = Some(ActiveChallenge { sbc_id, challenge_id });
            })
            .await;

        // LOAD_CHALLENGE
        self.set_phase(RunPhase::LoadChallenge).await;
        let sets = self.host.challenge_sets().await?;
        let Some(set) = sets.into_iter().find(|s| s.id == sbc_id) else {
            bail!(SbcError::NoEligibleChallenge(format!("SBC {sbc_id} is not available")));
        };
        let challenges = self.host.challenges(sbc_id).await?;
        let (challenge_id, final_sbc) = select_challenge(&set, &challenges, challenge_id)?;
        let settings = self.state.settings.resolve(sbc_id, challenge_id);
        let loaded = self.host.load_challenge(sbc_id, challenge_id).await?;
        let descriptor = build_descriptor(&loaded, &set, final_sbc, settings.save_totw);
        self.on_challenge_loaded(&descriptor).await;

        if let Err(e) = self.host.send_unassigned_to_club().await {
            warn!(error = %e, "Failed to move unassigned items to club");
        }

        // SYNC_INVENTORY
        self.set_phase(RunPhase::SyncInventory).await;
        if settings.use_concepts && !self.state.concepts.collected {
            self.notify(Notification::negative(
                "Still collecting concept players, they will not be used for this solution",
            ))
            .await;
        }
        let use_concepts = settings.use_concepts && self.state.concepts.collected;
        let inventory = {
            let sync = InventorySynchronizer::new(self.host.as_ref());
            let concepts = use_concepts.then_some(self.state.concepts.cards.as_slice());
            sync.synchronize(&self.state.pins, concepts, &self.state.prices).await?
        };

        // PRICE_REFRESH
        self.set_phase(RunPhase::PriceRefresh).await;
        let band_top = inventory
            .cards
            .iter()
            .map(|c| c.rating)
            .max()
            .unwrap_or(*FLOOR_BAND.end())
            .min(settings.max_rating);
        self.state
            .prices
            .update_cheapest_by_rating(self.price_source.as_ref(), band_top)
            .await;
        self.state.prices.refresh(self.price_source.as_ref(), &inventory.cards).await;
        self.persist_prices().await;

        let request = {
            let filter = CandidateFilter {
                settings: &settings,
                pins: &self.state.pins,
                prices: &self.state.prices,
                subs: &descriptor.subs,
                duplicate_ids: &inventory.duplicate_ids,
            };
            SolveRequest {
                candidates: build_candidates(&inventory, &filter, &self.engine, &self.state.prices),
                descriptor: descriptor.clone(),
                max_solve_seconds: settings.max_solve_seconds,
            }
        };
        info!(
            candidates = request.candidates.len(),
            slots = descriptor.formation.len(),
            final_sbc,
            "Solve request ready"
        );

        // AWAIT_SOLVE
        self.set_phase(RunPhase::AwaitSolve).await;
        let countdown = self.spawn_countdown(settings.max_solve_seconds);
        let response = self.solver.solve(&settings.api_url, &request).await;
        countdown.abort();
        self.control.update(|s| s.countdown_secs = None).await;
        let response = response?;

        if self.control.take_stop() {
            return Ok(AttemptOutcome::Cancelled);
        }
        if !response.status.is_usable() {
            bail!(SbcError::SolveUnsatisfiable { code: response.status.code(), message: response.message });
        }
        info!(status = %response.status, assigned = response.assignment.len(), "Solver returned");
        if response.status.is_optimal() {
            self.notify(Notification::positive(response.message.clone())).await;
        } else {
            self.notify(Notification::neutral(response.message.clone())).await;
        }

        // MAP_SOLUTION
        self.set_phase(RunPhase::MapSolution).await;
        let squad = SolutionMapper::apply(&response, &descriptor, &inventory.cards);
        if squad.filled() < descriptor.formation.len() {
            warn!(filled = squad.filled(), slots = descriptor.formation.len(), "Squad is under-filled");
        }
        self.host.commit_squad(sbc_id, challenge_id, &squad.card_ids()).await?;
        let valuation = self.on_squad_assigned(&squad);
        info!(total = valuation.total, "Squad applied");

        if !(allow_auto_submit && settings.auto_submit.permits(response.status)) {
            self.set_phase(RunPhase::Review).await;
            return Ok(AttemptOutcome::Review);
        }

        // SUBMITTING
        self.set_phase(RunPhase::Submitting).await;
        self.host.submit_challenge(sbc_id, challenge_id).await?;
        self.control.update(|s| s.submitted += 1).await;
        info!(sbc_id, challenge_id, final_sbc, "Challenge submitted");

        if settings.auto_open_packs {
            self.set_phase(RunPhase::OpenPacks).await;
            self.open_award_pack(&descriptor).await;
        }

        Ok(AttemptOutcome::Submitted { final_sbc, repeat_count: settings.repeat_count })
    }

    /// Startup routine: resync, clean pins, warm prices, queue login
    /// challenges, drain them, then collect concepts when enabled.
    pub async fn on_login(&mut self) -> Result<()> {
        info!("Login routine starting");
        if let Err(e) = self.host.invalidate_inventory_cache().await {
            warn!(error = %e, "Failed to invalidate host inventory cache");
        }

        let (owned, highest_concept) = {
            let sync = InventorySynchronizer::new(self.host.as_ref());
            let filters = SearchFilters::default();
            let mut owned = sync.fetch_pool(PoolKind::Club, &filters, None).await;
            owned.extend(sync.fetch_pool(PoolKind::Storage, &filters, None).await);
            (owned, sync.highest_concept_rating().await)
        };

        if owned.is_empty() {
            warn!("No owned cards returned, skipping pin cleanup");
        } else {
            let definitions: BTreeSet<u64> = owned.iter().map(|c| c.definition_id).collect();
            let ids: BTreeSet<u64> = owned.iter().map(|c| c.id).collect();
            let dropped = self.state.pins.cleanup_locked(&definitions) + self.state.pins.cleanup_fixed(&ids);
            if dropped > 0 {
                info!(dropped, "Dropped pins for cards no longer owned");
                if let Err(e) = self.state.persist_pins(self.store.as_ref()).await {
                    warn!(error = %e, "Failed to persist pinned items");
                }
            }
        }

        let band_top = highest_concept.unwrap_or(*FLOOR_BAND.end());
        self.state
            .prices
            .update_cheapest_by_rating(self.price_source.as_ref(), band_top)
            .await;

        let sets = match self.host.challenge_sets().await {
            Ok(sets) => sets,
            Err(e) => {
                warn!(error = %e, "Failed to list challenge sets");
                Vec::new()
            }
        };
        let reward_items: Vec<u64> = sets
            .iter()
            .flat_map(|s| s.awards.iter())
            .filter(|a| a.kind == AwardKind::Item)
            .map(|a| a.value)
            .collect();
        self.state.prices.refresh_ids(self.price_source.as_ref(), reward_items).await;
        self.persist_prices().await;

        let mut queued = 0;
        for entry in self.state.settings.login_entries() {
            let Some(set) = sets.iter().find(|s| s.id == entry.sbc_id && !s.is_complete) else {
                debug!(sbc_id = entry.sbc_id, "Login challenge unavailable or complete, skipped");
                continue;
            };
            self.control
                .enqueue(QueueEntry { label: set.name.clone(), ..entry })
                .await;
            queued += 1;
        }
        info!(queued, "Login challenges queued");
        self.drain_queue().await;

        if self.state.settings.get_bool(0, 0, keys::COLLECT_CONCEPTS) {
            let concepts = InventorySynchronizer::new(self.host.as_ref()).collect_concepts().await;
            self.state.prices.refresh(self.price_source.as_ref(), &concepts).await;
            self.persist_prices().await;
            self.state.concepts = ConceptPool { collected: true, cards: concepts };
            self.notify(Notification::positive("Collected All Concept Players")).await;
        }

        Ok(())
    }

    // -- Helpers ----------------------------------------------------------

    async fn open_award_pack(&mut self, descriptor: &ChallengeDescriptor) {
        let Some(pack_id) = descriptor.awards.first().copied() else {
            debug!("Challenge awards no pack");
            return;
        };

        let packs = match self.host.packs().await {
            Ok(packs) => packs,
            Err(e) => {
                warn!(error = %e, "Failed to list packs");
                return;
            }
        };
        let Some(pack) = packs.into_iter().find(|p| p.id == pack_id) else {
            warn!(pack_id, "Award pack not found in store");
            return;
        };

        match self.host.open_pack(pack.id).await {
            Ok(items) => {
                info!(pack_id, items = items.len(), "Award pack opened");
                self.state.prices.refresh(self.price_source.as_ref(), &items).await;
                self.persist_prices().await;
            }
            Err(e) => {
                warn!(pack_id, error = %e, "Failed to open award pack");
                self.notify(Notification::negative(format!("Failed to open {}", pack.name))).await;
            }
        }
    }

    fn spawn_countdown(&self, seconds: u64) -> JoinHandle<()> {
        let control = self.control.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            for remaining in (0..=seconds).rev() {
                ticker.tick().await;
                control.update(|s| s.countdown_secs = Some(remaining)).await;
            }
        })
    }

    async fn report_failure(&self, sbc_id: u64, err: &anyhow::Error) {
        let message = match err.downcast_ref::<SbcError>() {
            Some(SbcError::NoEligibleChallenge(reason)) => {
                warn!(sbc_id, reason = %reason, "No eligible challenge");
                reason.clone()
            }
            Some(SbcError::SolveUnsatisfiable { code, message }) => {
                warn!(sbc_id, code, message = %message, "Solver found no usable squad");
                message.clone()
            }
            Some(SbcError::RemoteRejection { operation, status }) => {
                error!(sbc_id, operation = %operation, status, "Host rejected request");
                format!("Error code: {status}")
            }
            Some(SbcError::TransientNetwork { operation, message }) => {
                error!(sbc_id, operation = %operation, error = %message, "Network failure");
                format!("Network error during {operation}")
            }
            _ => {
                error!(sbc_id, error = %err, "Solve attempt failed");
                format!("SBC failed: {err}")
            }
        };
        self.notify(Notification::negative(message)).await;
    }

    async fn persist_prices(&self) {
        if let Err(e) = self.state.persist_prices(self.store.as_ref()).await {
            warn!(error = %e, "Failed to persist price cache");
        }
    }

    async fn set_phase(&self, phase: RunPhase) {
        debug!(%phase, "Phase");
        self.control
            .update(|s| {
                s.phase = phase;
                if phase == RunPhase::Idle {
                    s.current = None;
                    s.countdown_secs = None;
                }
            })
            .await;
    }

    async fn notify(&self, notification: Notification) {
        let message = notification.message.clone();
        self.control.update(|s| s.last_message = Some(message)).await;
        self.host.notify(notification);
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[async_trait]
impl CoreHooks for Orchestrator {
    async fn on_inventory_loaded(&mut self, cards: &[Card]) -> usize {
        let fetched = self.state.prices.refresh(self.price_source.as_ref(), cards).await;
        if fetched > 0 {
            self.persist_prices().await;
        }
        fetched
    }

    async fn on_challenge_loaded(&mut self, descriptor: &ChallengeDescriptor) {
        info!(
            sbc_id = descriptor.set_id,
            challenge_id = descriptor.challenge_id,
            constraints = descriptor.constraints.len(),
            subs = descriptor.subs.len(),
            final_sbc = descriptor.final_sbc,
            "Challenge loaded"
        );
        let current = ActiveChallenge { sbc_id: descriptor.set_id, challenge_id: descriptor.challenge_id };
        self.control.update(|s| s.current = Some(current)).await;
    }

    fn on_squad_assigned(&self, squad: &Squad) -> SquadValuation {
        value_squad(&self.state.prices, squad)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
