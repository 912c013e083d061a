//! fut.gg price provider.
//!
//! Batched JSON lookups against the player-prices endpoint, and a
//! cheapest-listing scrape of the player search page for rating bands.
//!
//! API: `GET {base}/api/fut/player-prices/25/?ids=1,2,3`
//! Search: `GET {base}/players/?overall__gte=R&overall__lte=R&price__gte=100&sorts=current_price`

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use regex::Regex;

use super::{PriceSource, MAX_BATCH};
use crate::types::{PriceQuote, SbcError};

pub const DEFAULT_BASE_URL: &str = "https://www.fut.gg";

static RE_CARD_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a\b[^>]*fut-card-container[^>]*>"#).unwrap());
static RE_HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).unwrap());
static RE_PLAYER_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"25-(\d+)").unwrap());

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PricesResponse {
    data: PriceData,
}

/// The endpoint has returned both a keyed object and a plain list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceData {
    Keyed(HashMap<String, PriceEntry>),
    List(Vec<PriceEntry>),
}

impl PriceData {
    fn into_entries(self) -> Vec<PriceEntry> {
        match self {
            PriceData::Keyed(map) => map.into_values().collect(),
            PriceData::List(list) => list,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceEntry {
    ea_id: u64,
    #[serde(default)]
    price: Option<i64>,
    #[serde(default)]
    is_extinct: bool,
    #[serde(default)]
    is_objective: bool,
    #[serde(default)]
    is_sbc: bool,
}

impl From<PriceEntry> for PriceQuote {
    fn from(e: PriceEntry) -> Self {
        PriceQuote {
            definition_id: e.ea_id,
            price: e.price.and_then(|p| u64::try_from(p).ok()),
            is_extinct: e.is_extinct,
            is_objective: e.is_objective,
            is_sbc: e.is_sbc,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct FutggClient {
    http: Client,
    base_url: String,
}

impl FutggClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("SBCPILOT/0.1.0")
            .build()
            .context("Failed to build fut.gg HTTP client")?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn get_text(&self, url: &str, operation: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SbcError::network(operation, e))?;

        if !resp.status().is_success() {
            bail!(SbcError::rejected(operation, resp.status().as_u16()));
        }

        resp.text().await.map_err(|e| SbcError::network(operation, e).into())
    }

    /// Catalog id of the first card listed on a search results page.
    pub fn first_listed_id(html: &str) -> Option<u64> {
        let anchor = RE_CARD_ANCHOR.find(html)?;
        let href = RE_HREF.captures(anchor.as_str())?.get(1)?.as_str();
        RE_PLAYER_ID.captures(href)?.get(1)?.as_str().parse().ok()
    }
}

#[async_trait]
impl PriceSource for FutggClient {
    async fn fetch_prices(&self, definition_ids: &[u64]) -> Result<Vec<PriceQuote>> {
        if definition_ids.is_empty() {
            return Ok(Vec::new());
        }
        if definition_ids.len() > MAX_BATCH {
            bail!("price batch of {} exceeds limit of {MAX_BATCH}", definition_ids.len());
        }

        let ids = definition_ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let url = format!(
            "{}/api/fut/player-prices/25/?ids={}",
            self.base_url,
            urlencoding::encode(&ids)
        );

        let body = self.get_text(&url, "price lookup").await?;
        let parsed: PricesResponse =
            serde_json::from_str(&body).context("Failed to parse price lookup response")?;

        let quotes: Vec<PriceQuote> = parsed.data.into_entries().into_iter().map(Into::into).collect();
        debug!(requested = definition_ids.len(), received = quotes.len(), "Fetched price batch");
        Ok(quotes)
    }

    async fn cheapest_by_rating(&self, rating: u8) -> Result<Option<PriceQuote>> {
        let url = format!(
            "{}/players/?overall__gte={rating}&overall__lte={rating}&price__gte=100&sorts=current_price",
            self.base_url
        );
        let html = self.get_text(&url, "cheapest-by-rating search").await?;

        let Some(id) = Self::first_listed_id(&html) else {
            debug!(rating, "No listed card found for rating");
            return Ok(None);
        };

        let quote = self.fetch_prices(&[id]).await?.into_iter().next();
        Ok(quote)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
