//! Solve-cost pricing.
//!
//! Turns a card's cached market price plus its ownership attributes into the
//! weight the optimizer minimises. Pure: no I/O, no cache access. Callers
//! pass the already-resolved [`MarketQuote`].

use std::collections::HashSet;

use crate::types::Card;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Applied to tracked duplicates, and again to storage copies.
    pub duplicate_discount: f64,
    pub untradeable_discount: f64,
    pub concept_premium: f64,
    pub evo_premium: f64,
    /// Multiplier when the market price is unknown, or suspiciously zero.
    pub unknown_price_multiplier: f64,
    pub floor_price: f64,
    /// Cards above this rating with a zero market price are treated as suspect.
    pub suspicious_rating: u8,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            duplicate_discount: 0.51,
            untradeable_discount: 0.8,
            concept_premium: 10.0,
            evo_premium: 2.0,
            unknown_price_multiplier: 1.5,
            floor_price: 100.0,
            suspicious_rating: 87,
        }
    }
}

/// Cached prices relevant to one card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketQuote {
    /// The card's own market price; `None` when unknown or stale.
    pub market: Option<u64>,
    /// Cheapest-by-rating band price for the card's rating.
    pub band: Option<u64>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Solve cost for `card`. `duplicate_ids` holds instance ids of tracked
    /// duplicates. An unknown market price only inflates the base; the
    /// remaining rules short-circuit in order.
    pub fn cost(&self, card: &Card, quote: &MarketQuote, duplicate_ids: &HashSet<u64>) -> f64 {
        let c = &self.config;

        if card.is_fixed {
            return 1.0;
        }

        let mut base = (quote.market.unwrap_or(0) as f64)
            .max(quote.band.unwrap_or(0) as f64)
            .max(c.floor_price);

        if quote.market.is_none() {
            base *= c.unknown_price_multiplier;
        }

        if quote.market == Some(0) && card.rating > c.suspicious_rating {
            let limit = card.max_price_limit.unwrap_or(0) as f64;
            return limit.max(base * c.unknown_price_multiplier);
        }

        if card.is_concept() {
            return base * c.concept_premium;
        }

        if card.is_evolution() {
            return base * c.evo_premium;
        }

        let mut cost = base - f64::from(100 - card.rating.min(100));
        if duplicate_ids.contains(&card.id) {
            cost *= c.duplicate_discount;
        }
        if card.is_storage() {
            cost *= c.duplicate_discount;
        }
        if card.is_untradeable() {
            cost *= c.untradeable_discount;
        }
        cost
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
