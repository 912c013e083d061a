//! Candidate selection and pricing.
//!
//! Applies the per-challenge hard filters to the merged inventory and turns
//! every surviving card into a `PricedCard` for the solver.

use std::collections::HashSet;

use super::inventory::Inventory;
use super::price_cache::PriceCache;
use crate::pricing::PricingEngine;
use crate::settings::{PinnedItems, SolveSettings};
use crate::types::{Card, PriceKey, PricedCard};

pub struct CandidateFilter<'a> {
    pub settings: &'a SolveSettings,
    pub pins: &'a PinnedItems,
    pub prices: &'a PriceCache,
    /// Definition ids already fixed as substitutes.
    pub subs: &'a [u64],
    pub duplicate_ids: &'a HashSet<u64>,
}

impl CandidateFilter<'_> {
    pub fn accepts(&self, card: &Card) -> bool {
        let s = self.settings;
        if self.subs.contains(&card.definition_id) {
            return false;
        }
        if card.is_locked || self.pins.is_locked(card.definition_id) {
            return false;
        }

        let passes_filters = !card.is_loan
            && card.rating <= s.max_rating
            && !s.exclude_players.contains(&card.definition_id)
            && !s.exclude_leagues.contains(&card.league_id)
            && !s.exclude_nations.contains(&card.nation_id)
            && !s.exclude_teams.contains(&card.team_id)
            && !s.exclude_rarity.contains(&card.rarity_label)
            && !card.location.is_time_limited
            && !(s.exclude_sbc && self.prices.is_sbc(card.definition_id))
            && !(s.exclude_objective && self.prices.is_objective(card.definition_id));

        let spare_copy = s.use_dupes && (self.duplicate_ids.contains(&card.id) || card.is_storage());

        passes_filters || spare_copy
    }
}

/// Filter `inventory` and price every accepted card.
pub fn build_candidates(
    inventory: &Inventory,
    filter: &CandidateFilter<'_>,
    engine: &PricingEngine,
    prices: &PriceCache,
) -> Vec<PricedCard> {
    inventory
        .cards
        .iter()
        .filter(|c| filter.accepts(c))
        .map(|card| {
            let quote = prices.quote_for(card);
            PricedCard {
                id: card.id,
                name: card.name.clone(),
                card_type: card.rarity_label.clone(),
                definition_id: card.definition_id,
                rating: card.rating,
                team_id: card.team_id,
                league_id: card.league_id,
                nation_id: card.nation_id,
                rarity_id: card.rarity_id,
                rating_tier: card.rating_tier,
                is_untradeable: card.is_untradeable(),
                is_duplicate: filter.duplicate_ids.contains(&card.id),
                is_storage: card.is_storage(),
                preferred_position: card.preferred_position,
                possible_positions: card.possible_positions.clone(),
                groups: if card.groups.is_empty() { vec![0] } else { card.groups.clone() },
                is_fixed: card.is_fixed,
                concept: card.is_concept(),
                price: engine.cost(card, &quote, filter.duplicate_ids),
                futgg_price: prices.get_price(PriceKey::Definition(card.definition_id)),
            }
        })
        .collect()
}
