//! Control API route handlers.
//!
//! All endpoints return JSON. State is shared via a cloneable `ControlHandle`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::types::{QueueEntry, RunPhase};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveChallenge {
    pub sbc_id: u64,
    pub challenge_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepeatProgress {
    /// Signed repeats left; negative means unlimited.
    pub remaining: i64,
    pub total: i64,
}

/// What the orchestrator is doing right now.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub phase: RunPhase,
    pub current: Option<ActiveChallenge>,
    pub repeat: Option<RepeatProgress>,
    pub countdown_secs: Option<u64>,
    pub last_message: Option<String>,
    pub attempts: u64,
    pub submitted: u64,
    pub started_at: DateTime<Utc>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            current: None,
            repeat: None,
            countdown_secs: None,
            last_message: None,
            attempts: 0,
            submitted: 0,
            started_at: Utc::now(),
        }
    }
}

/// Run status, FIFO queue and cancellation flag, shared between the
/// orchestrator and the control server.
#[derive(Clone, Default)]
pub struct ControlHandle {
    status: Arc<RwLock<RunStatus>>,
    queue: Arc<Mutex<VecDeque<QueueEntry>>>,
    cancel: Arc<AtomicBool>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, entry: QueueEntry) -> usize {
        let mut queue = self.queue.lock().await;
        queue.push_back(entry);
        queue.len()
    }

    pub async fn dequeue(&self) -> Option<QueueEntry> {
        self.queue.lock().await.pop_front()
    }

    pub async fn queue_snapshot(&self) -> Vec<QueueEntry> {
        self.queue.lock().await.iter().cloned().collect()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Ask the running flow to stop at its next checkpoint.
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Consume a pending stop request.
    pub fn take_stop(&self) -> bool {
        self.cancel.swap(false, Ordering::SeqCst)
    }

    pub async fn status(&self) -> RunStatus {
        self.status.read().await.clone()
    }

    pub async fn update(&self, f: impl FnOnce(&mut RunStatus)) {
        let mut status = self.status.write().await;
        f(&mut status);
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: RunStatus,
    pub queue_length: usize,
    pub stop_requested: bool,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub sbc_id: u64,
    #[serde(default)]
    pub challenge_id: u64,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub queued: QueueEntry,
    pub queue_length: usize,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = ControlHandle;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.status().await;
    let uptime = (Utc::now() - status.started_at).num_seconds();
    Json(StatusResponse {
        queue_length: state.queue_len().await,
        stop_requested: state.is_stop_requested(),
        uptime_secs: uptime,
        status,
    })
}

/// GET /api/queue
pub async fn get_queue(State(state): State<AppState>) -> Json<Vec<QueueEntry>> {
    Json(state.queue_snapshot().await)
}

/// POST /api/queue
pub async fn post_queue(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> (StatusCode, Json<EnqueueResponse>) {
    let entry = QueueEntry {
        sbc_id: req.sbc_id,
        challenge_id: req.challenge_id,
        label: req.label.unwrap_or_else(|| format!("SBC {}", req.sbc_id)),
    };
    let queue_length = state.enqueue(entry.clone()).await;
    info!(sbc_id = entry.sbc_id, challenge_id = entry.challenge_id, queue_length, "Challenge queued via API");
    (StatusCode::ACCEPTED, Json(EnqueueResponse { queued: entry, queue_length }))
}

/// POST /api/stop
pub async fn post_stop(State(state): State<AppState>) -> StatusCode {
    state.request_stop();
    info!("Stop requested via API");
    StatusCode::ACCEPTED
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
