//! End-to-end orchestrator scenarios against the in-memory mocks.

use std::sync::Arc;

use sbcpilot::control::ControlHandle;
use sbcpilot::engine::{ChainOutcome, CoreHooks, Orchestrator};
use sbcpilot::settings::keys;
use sbcpilot::state::SharedState;
use sbcpilot::storage::{KeyValueStore, MemoryStore};
use sbcpilot::types::*;
use serde_json::json;

use crate::mock_host::{card, FixedPrices, MockHost, MockSolver, AWARD_PACK, SET_REWARD_ITEM};

struct Harness {
    orchestrator: Orchestrator,
    host: Arc<MockHost>,
    solver: Arc<MockSolver>,
    control: ControlHandle,
}

async fn harness(host: MockHost, solver: MockSolver, control: ControlHandle) -> Harness {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let state = SharedState::load(store.as_ref(), 0).await.unwrap();
    let host = Arc::new(host);
    let solver = Arc::new(solver);
    let orchestrator = Orchestrator::new(
        host.clone(),
        solver.clone(),
        Arc::new(FixedPrices(1_000)),
        store,
        state,
        control.clone(),
    );
    Harness { orchestrator, host, solver, control }
}

fn set_option(h: &mut Harness, sbc_id: u64, challenge_id: u64, key: &str, value: serde_json::Value) {
    h.orchestrator.state_mut().settings.set(sbc_id, challenge_id, key, value);
}

fn entry(sbc_id: u64, label: &str) -> QueueEntry {
    QueueEntry { sbc_id, challenge_id: 0, label: label.to_string() }
}

// ---------------------------------------------------------------------------
// Review and auto-submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_review_without_auto_submit() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;

    let outcome = h.orchestrator.solve(100, 0, true).await;

    assert_eq!(outcome, ChainOutcome::Finished);
    assert!(h.host.submits().is_empty());
    assert_eq!(h.host.commits(), vec![vec![Some(1), Some(2), Some(3)]]);
    assert_eq!(h.solver.requests().len(), 1);
    assert_eq!(h.solver.requests()[0].1, 6);
    assert!(h.host.messages(NotificationKind::Positive).contains(&"OPTIMAL".to_string()));

    let status = h.control.status().await;
    assert_eq!(status.phase, RunPhase::Idle);
    assert_eq!(status.attempts, 1);
    assert_eq!(status.submitted, 0);
    assert_eq!(status.last_message.as_deref(), Some("OPTIMAL"));
}

#[tokio::test]
async fn test_manual_solve_never_auto_submits() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));

    h.orchestrator.solve(100, 0, false).await;
    assert!(h.host.submits().is_empty());
    assert_eq!(h.host.commits().len(), 1);
}

#[tokio::test]
async fn test_optimal_only_skips_feasible_solution() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::new(SolveStatus::Feasible), control).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(4));

    let outcome = h.orchestrator.solve(100, 0, true).await;
    assert_eq!(outcome, ChainOutcome::Finished);
    assert!(h.host.submits().is_empty());
    assert!(h.host.messages(NotificationKind::Neutral).contains(&"FEASIBLE".to_string()));
}

#[tokio::test]
async fn test_solver_endpoint_follows_settings() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::API_URL, json!("http://solver.local/solve"));

    h.orchestrator.solve(100, 0, true).await;
    assert_eq!(h.solver.requests()[0].0, "http://solver.local/solve");
}

#[tokio::test]
async fn test_max_rating_filters_candidates() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::MAX_RATING, json!(73));
    set_option(&mut h, 0, 0, keys::USE_DUPES, json!(false));

    h.orchestrator.solve(100, 0, true).await;
    // Club ratings are 71..=76.
    assert_eq!(h.solver.requests()[0].1, 3);
}

// ---------------------------------------------------------------------------
// Repeats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_repeat_count_three_submits_four_times() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    set_option(&mut h, 100, 0, keys::REPEAT_COUNT, json!(3));

    let outcome = h.orchestrator.solve(100, 0, true).await;

    assert_eq!(outcome, ChainOutcome::Finished);
    assert_eq!(h.host.submits(), vec![(100, 1); 4]);
    assert_eq!(
        h.host.completion_messages(),
        vec!["1 / 3 Completed", "2 / 3 Completed", "3 / 3 Completed", "3 / 3 Completed"]
    );
    assert_eq!(h.control.status().await.submitted, 4);
}

#[tokio::test]
async fn test_zero_repeat_submits_once_silently() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));

    h.orchestrator.solve(100, 0, true).await;
    assert_eq!(h.host.submits().len(), 1);
    assert!(h.host.completion_messages().is_empty());
}

#[tokio::test]
async fn test_unlimited_repeat_runs_until_stopped() {
    let control = ControlHandle::new();
    let host = MockHost::new().stop_after(5, control.clone());
    let mut h = harness(host, MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    set_option(&mut h, 100, 0, keys::REPEAT_COUNT, json!(-1));

    let outcome = h.orchestrator.solve(100, 0, true).await;

    assert_eq!(outcome, ChainOutcome::Stopped);
    assert_eq!(h.host.submits().len(), 5);
    let completions = h.host.completion_messages();
    assert_eq!(completions.first().map(String::as_str), Some("1 Completed"));
    assert_eq!(completions.last().map(String::as_str), Some("5 Completed"));
    assert!(h.host.messages(NotificationKind::Neutral).contains(&"SBC Stopped".to_string()));
}

#[tokio::test]
async fn test_multi_step_set_repeat_ends_when_set_complete() {
    let control = ControlHandle::new();
    let host = MockHost::new().with_set(300, "Upgrade", &[1, 2], false).complete_on_submit();
    let mut h = harness(host, MockSolver::optimal(), control).await;
    set_option(&mut h, 300, 0, keys::AUTO_SUBMIT, json!(1));
    set_option(&mut h, 300, 0, keys::REPEAT_COUNT, json!(1));

    let outcome = h.orchestrator.solve(300, 0, true).await;

    // Last incomplete first, then the final one; the third pass finds the set done.
    assert_eq!(h.host.submits(), vec![(300, 2), (300, 1)]);
    assert_eq!(h.host.completion_messages(), vec!["0 / 1 Completed", "1 / 1 Completed"]);
    assert_eq!(outcome, ChainOutcome::Failed);
    assert!(h.host.messages(NotificationKind::Negative).iter().any(|m| m.contains("already completed")));
}

#[tokio::test]
async fn test_auto_open_packs_after_submit() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    set_option(&mut h, 100, 0, keys::AUTO_OPEN_PACKS, json!(true));

    h.orchestrator.solve(100, 0, true).await;

    assert_eq!(h.host.opened_packs(), vec![AWARD_PACK]);
    assert_eq!(h.orchestrator.state().prices.get_price(PriceKey::Definition(8_700)), Some(1_000));
}

// ---------------------------------------------------------------------------
// Failures and the queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_entry_then_next_queued_runs() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control.clone()).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    control.enqueue(entry(999, "Missing")).await;
    control.enqueue(entry(100, "Daily Bronze")).await;

    let ran = h.orchestrator.drain_queue().await;

    assert_eq!(ran, 2);
    assert_eq!(control.queue_len().await, 0);
    assert_eq!(h.host.submits(), vec![(100, 1)]);
    let negatives = h.host.messages(NotificationKind::Negative);
    assert!(negatives.contains(&"SBC 999 is not available".to_string()));
    let positives = h.host.messages(NotificationKind::Positive);
    assert!(positives.contains(&"Missing SBC Started".to_string()));
    assert!(positives.contains(&"Daily Bronze SBC Started".to_string()));
}

#[tokio::test]
async fn test_solver_failure_status_is_reported() {
    let control = ControlHandle::new();
    let solver = MockSolver::optimal().then(Ok(SolveResponse {
        status: SolveStatus::Failed(3),
        message: "INFEASIBLE".into(),
        assignment: vec![],
    }));
    let mut h = harness(MockHost::new(), solver, control).await;

    let outcome = h.orchestrator.solve(100, 0, true).await;

    assert_eq!(outcome, ChainOutcome::Failed);
    assert!(h.host.commits().is_empty());
    assert_eq!(h.host.messages(NotificationKind::Negative), vec!["INFEASIBLE"]);
    let status = h.control.status().await;
    assert_eq!(status.last_message.as_deref(), Some("INFEASIBLE"));
}

#[tokio::test]
async fn test_solver_network_error_moves_to_next_entry() {
    let control = ControlHandle::new();
    let solver = MockSolver::optimal().then(Err(SbcError::network("solve", "connection refused").into()));
    let mut h = harness(MockHost::new(), solver, control.clone()).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    control.enqueue(entry(100, "Daily Bronze")).await;

    let outcome = h.orchestrator.solve(100, 0, true).await;

    assert_eq!(outcome, ChainOutcome::Failed);
    assert!(h.host.messages(NotificationKind::Negative).contains(&"Network error during solve".to_string()));
    // The queued entry still ran afterwards.
    assert_eq!(h.host.submits(), vec![(100, 1)]);
    assert_eq!(h.solver.requests().len(), 2);
}

#[tokio::test]
async fn test_host_error_is_surfaced() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    h.host.set_error(Some("bridge down".into()));

    let outcome = h.orchestrator.solve(100, 0, true).await;

    assert_eq!(outcome, ChainOutcome::Failed);
    assert_eq!(h.host.messages(NotificationKind::Negative), vec!["SBC failed: bridge down"]);
    assert!(h.solver.requests().is_empty());
}

#[tokio::test]
async fn test_stop_during_solve_keeps_queue() {
    let control = ControlHandle::new();
    let solver = MockSolver::optimal().stopping(control.clone());
    let mut h = harness(MockHost::new(), solver, control.clone()).await;
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    control.enqueue(entry(100, "First")).await;
    control.enqueue(entry(100, "Second")).await;

    let ran = h.orchestrator.drain_queue().await;

    assert_eq!(ran, 1);
    assert!(h.host.submits().is_empty());
    assert!(h.host.commits().is_empty());
    assert_eq!(control.queue_snapshot().await, vec![entry(100, "Second")]);
    assert!(!control.is_stop_requested());
    assert!(h.host.messages(NotificationKind::Neutral).contains(&"SBC Stopped".to_string()));
}

// ---------------------------------------------------------------------------
// Login routine and concepts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_queues_flagged_sets_and_collects_concepts() {
    let control = ControlHandle::new();
    let host = MockHost::new().with_set(200, "Done Already", &[1], true);
    let mut h = harness(host, MockSolver::optimal(), control.clone()).await;
    set_option(&mut h, 100, 1, keys::SBC_ON_LOGIN, json!(true));
    set_option(&mut h, 100, 0, keys::AUTO_SUBMIT, json!(1));
    set_option(&mut h, 200, 0, keys::SBC_ON_LOGIN, json!(true));
    set_option(&mut h, 0, 0, keys::COLLECT_CONCEPTS, json!(true));
    h.orchestrator.state_mut().pins.lock(1_001);
    h.orchestrator.state_mut().pins.lock(5_555);

    h.orchestrator.on_login().await.unwrap();

    assert_eq!(h.host.submits(), vec![(100, 1)]);
    assert_eq!(control.queue_len().await, 0);
    assert!(h.host.messages(NotificationKind::Positive).contains(&"Daily Bronze SBC Started".to_string()));
    assert!(!h.host.messages(NotificationKind::Positive).contains(&"Done Already SBC Started".to_string()));

    let state = h.orchestrator.state();
    assert!(state.pins.is_locked(1_001));
    assert!(!state.pins.is_locked(5_555));
    assert_eq!(state.prices.get_price(PriceKey::Definition(SET_REWARD_ITEM)), Some(1_000));
    assert_eq!(state.prices.get_price(PriceKey::CheapestByRating(60)), Some(200));
    assert!(state.concepts.collected);
    assert_eq!(state.concepts.cards.len(), 1);
    assert!(h
        .host
        .messages(NotificationKind::Positive)
        .contains(&"Collected All Concept Players".to_string()));
}

#[tokio::test]
async fn test_concepts_ignored_until_collected() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;
    set_option(&mut h, 100, 0, keys::USE_CONCEPTS, json!(true));

    h.orchestrator.solve(100, 0, true).await;

    assert_eq!(
        h.host.messages(NotificationKind::Negative),
        vec!["Still collecting concept players, they will not be used for this solution"]
    );
    assert_eq!(h.solver.requests()[0].1, 6);
}

#[tokio::test]
async fn test_inventory_hook_refreshes_prices() {
    let control = ControlHandle::new();
    let mut h = harness(MockHost::new(), MockSolver::optimal(), control).await;

    let fetched = h.orchestrator.on_inventory_loaded(&[card(1, 4_001, 80), card(2, 4_002, 81)]).await;
    assert_eq!(fetched, 2);
    assert_eq!(h.orchestrator.on_inventory_loaded(&[card(1, 4_001, 80)]).await, 0);

    let squad = Squad { slots: vec![Some(card(1, 4_001, 80)), None] };
    let valuation = h.orchestrator.on_squad_assigned(&squad);
    assert_eq!(valuation.total, 1_000);
}
