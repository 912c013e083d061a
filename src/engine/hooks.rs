//! Event hooks the host-integration layer calls into.
//!
//! The core never reaches into host objects; the host tells it when an
//! inventory view, a challenge or a squad has been shown.

use async_trait::async_trait;
use serde::Serialize;

use super::price_cache::PriceCache;
use crate::types::{Card, ChallengeDescriptor, PriceKey, Squad};

/// Cached prices for a squad, slot by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadValuation {
    pub slot_prices: Vec<Option<u64>>,
    /// Sum of the known slot prices.
    pub total: u64,
}

#[async_trait]
pub trait CoreHooks: Send {
    /// Cards were shown to the user. Refreshes their prices; returns how
    /// many ids were fetched.
    async fn on_inventory_loaded(&mut self, cards: &[Card]) -> usize;

    async fn on_challenge_loaded(&mut self, descriptor: &ChallengeDescriptor);

    fn on_squad_assigned(&self, squad: &Squad) -> SquadValuation;
}

pub fn value_squad(prices: &PriceCache, squad: &Squad) -> SquadValuation {
    let slot_prices: Vec<Option<u64>> = squad
        .slots
        .iter()
        .map(|slot| slot.as_ref().and_then(|c| prices.get_price(PriceKey::Definition(c.definition_id))))
        .collect();
    let total = slot_prices.iter().flatten().sum();
    SquadValuation { slot_prices, total }
}
