//! HTTP bridge to the host game client.
//!
//! The host side exposes a small JSON REST surface; this client maps the
//! `HostApp` operations onto it.
//!
//! Auth: `Authorization: Bearer {token}` when a token is configured.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    ChallengeSet, ChallengeSummary, HostApp, InventoryPage, LoadedChallenge, Pack, PageRequest, PoolKind,
    SearchFilters,
};
use crate::types::{Card, Notification, SbcError};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryQuery<'a> {
    #[serde(flatten)]
    filters: &'a SearchFilters,
    offset: usize,
    count: usize,
}

#[derive(Debug, Serialize)]
struct SquadBody<'a> {
    slots: &'a [Option<u64>],
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct BridgeClient {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl BridgeClient {
    pub fn new(base_url: &str, token: Option<SecretString>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("SBCPILOT/0.1.0")
            .build()
            .context("Failed to build host bridge HTTP client")?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, operation: &str) -> Result<Response> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| SbcError::network(operation, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            warn!(operation, status, "Host bridge rejected request");
            bail!(SbcError::rejected(operation, status));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, operation: &str) -> Result<T> {
        let resp = self.send(self.http.get(self.url(path)), operation).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse host response for {operation}"))
    }

    async fn post_empty(&self, path: &str, operation: &str) -> Result<()> {
        self.send(self.http.post(self.url(path)), operation).await?;
        Ok(())
    }
}

#[async_trait]
impl HostApp for BridgeClient {
    async fn invalidate_inventory_cache(&self) -> Result<()> {
        self.post_empty("/inventory/invalidate", "invalidate inventory cache").await
    }

    async fn search_inventory(
        &self,
        pool: PoolKind,
        filters: &SearchFilters,
        page: PageRequest,
    ) -> Result<InventoryPage> {
        let body = InventoryQuery { filters, offset: page.offset, count: page.count };
        let resp = self
            .authed(self.http.post(self.url(&format!("/inventory/{pool}"))).json(&body))
            .send()
            .await
            .map_err(|e| SbcError::network("inventory search", e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            debug!(%pool, status, offset = page.offset, "Inventory page returned non-success status");
            return Ok(InventoryPage { status, items: Vec::new(), retrieved_all: false });
        }

        let mut parsed: InventoryPage = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {pool} inventory page"))?;
        parsed.status = status;
        Ok(parsed)
    }

    async fn send_unassigned_to_club(&self) -> Result<()> {
        self.post_empty("/unassigned/send-to-club", "send unassigned to club").await
    }

    async fn duplicate_ids(&self) -> Result<Vec<u64>> {
        self.get_json("/unassigned/duplicates", "duplicate ids").await
    }

    async fn challenge_sets(&self) -> Result<Vec<ChallengeSet>> {
        self.get_json("/sbc/sets", "challenge sets").await
    }

    async fn challenges(&self, set_id: u64) -> Result<Vec<ChallengeSummary>> {
        self.get_json(&format!("/sbc/sets/{set_id}/challenges"), "challenge list").await
    }

    async fn load_challenge(&self, set_id: u64, challenge_id: u64) -> Result<LoadedChallenge> {
        self.get_json(&format!("/sbc/sets/{set_id}/challenges/{challenge_id}"), "load challenge")
            .await
    }

    async fn commit_squad(&self, set_id: u64, challenge_id: u64, slots: &[Option<u64>]) -> Result<()> {
        let req = self
            .http
            .put(self.url(&format!("/sbc/sets/{set_id}/challenges/{challenge_id}/squad")))
            .json(&SquadBody { slots });
        self.send(req, "commit squad").await?;
        Ok(())
    }

    async fn submit_challenge(&self, set_id: u64, challenge_id: u64) -> Result<()> {
        self.post_empty(&format!("/sbc/sets/{set_id}/challenges/{challenge_id}/submit"), "submit challenge")
            .await
    }

    async fn packs(&self) -> Result<Vec<Pack>> {
        self.get_json("/store/packs", "pack list").await
    }

    async fn open_pack(&self, pack_id: u64) -> Result<Vec<Card>> {
        let resp = self
            .send(self.http.post(self.url(&format!("/store/packs/{pack_id}/open"))), "open pack")
            .await?;
        resp.json().await.context("Failed to parse opened pack items")
    }

    fn notify(&self, notification: Notification) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(message = %notification.message, "No runtime for notification, dropped");
            return;
        };
        let client = self.clone();
        handle.spawn(async move {
            let req = client.http.post(client.url("/notifications")).json(&notification);
            if let Err(e) = client.send(req, "notify").await {
                warn!(error = %e, "Failed to deliver notification");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
