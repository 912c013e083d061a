//! HTTP client for the solve API.
//!
//! `POST <url>` with `{clubPlayers, sbcData, maxSolveTime}`; the response is
//! `{status, status_code, results}` where `results` is itself a JSON string
//! of `[{id, possiblePositions, Is_Pos}]`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::Solver;
use crate::types::{Assignment, Position, SbcError, SolveRequest, SolveResponse, SolveStatus};

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawSolveResponse {
    #[serde(default)]
    status: String,
    status_code: i64,
    #[serde(default)]
    results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAssignment {
    id: u64,
    /// The role the solver placed the card in.
    #[serde(rename = "possiblePositions")]
    assigned_role: u16,
    #[serde(rename = "Is_Pos", default)]
    is_pos: u8,
}

impl From<RawAssignment> for Assignment {
    fn from(raw: RawAssignment) -> Self {
        Assignment {
            card_id: raw.id,
            is_positional_match: raw.is_pos == 1,
            assigned_role: Position(raw.assigned_role),
        }
    }
}

/// Decode the raw wire response. Unparseable results on a failed status
/// yield an empty assignment; on a usable status they are an error.
pub fn decode_response(body: &str) -> Result<SolveResponse> {
    let raw: RawSolveResponse = serde_json::from_str(body).context("Failed to parse solver response")?;
    let status = SolveStatus::from_code(raw.status_code);

    let parsed = raw
        .results
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(|r| serde_json::from_str::<Vec<RawAssignment>>(r))
        .transpose();

    let assignment = match parsed {
        Ok(items) => items.unwrap_or_default().into_iter().map(Into::into).collect(),
        Err(e) if status.is_usable() => {
            return Err(e).context("Failed to parse solver results");
        }
        Err(e) => {
            debug!(error = %e, code = raw.status_code, "Ignoring unparseable results of failed solve");
            Vec::new()
        }
    };

    Ok(SolveResponse { status, message: raw.status, assignment })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HttpSolver {
    http: Client,
}

impl HttpSolver {
    /// `request_timeout_secs` is a transport ceiling, independent of the
    /// per-request `maxSolveTime` the solver itself honours.
    pub fn new(request_timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .context("Failed to build solver HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Solver for HttpSolver {
    async fn solve(&self, endpoint: &str, request: &SolveRequest) -> Result<SolveResponse> {
        debug!(
            endpoint,
            candidates = request.candidates.len(),
            challenge_id = request.descriptor.challenge_id,
            "Sending solve request"
        );

        let resp = self
            .http
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| SbcError::network("solve", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "Solver returned non-success status");
            return Err(SbcError::network("solve", format!("HTTP {status}")).into());
        }

        let body = resp.text().await.map_err(|e| SbcError::network("solve", e))?;
        decode_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
