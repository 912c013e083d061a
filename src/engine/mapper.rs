//! Solution mapper.
//!
//! Places the solver's per-card assignment onto concrete formation slots,
//! then appends the challenge's fixed substitutes.

use tracing::warn;

use crate::types::{Card, ChallengeDescriptor, Slot, SolveResponse, Squad};

pub struct SolutionMapper;

impl SolutionMapper {
    /// Deterministic: the same inputs always produce the same squad.
    ///
    /// Positional matches go first (stable, so response order breaks ties)
    /// into the first empty slot with the same role. Non-positional entries
    /// take the first empty wildcard slot, else the first empty slot of any
    /// kind. Entries with no room, or whose card is not in `pool`, are
    /// dropped.
    pub fn apply(response: &SolveResponse, descriptor: &ChallengeDescriptor, pool: &[Card]) -> Squad {
        let mut slots: Vec<Option<Card>> = vec![None; descriptor.formation.len()];

        let mut ordered: Vec<_> = response.assignment.iter().collect();
        ordered.sort_by_key(|a| !a.is_positional_match);

        for entry in ordered {
            let Some(card) = pool.iter().find(|c| c.id == entry.card_id) else {
                warn!(card_id = entry.card_id, "Solver assigned a card outside the candidate pool");
                continue;
            };

            let target = if entry.is_positional_match {
                descriptor
                    .formation
                    .iter()
                    .enumerate()
                    .position(|(i, slot)| slots[i].is_none() && *slot == Slot::Role(entry.assigned_role))
            } else {
                descriptor
                    .formation
                    .iter()
                    .enumerate()
                    .position(|(i, slot)| slots[i].is_none() && *slot == Slot::Wildcard)
                    .or_else(|| slots.iter().position(Option::is_none))
            };

            match target {
                Some(index) => slots[index] = Some(card.clone()),
                None => warn!(
                    card_id = entry.card_id,
                    role = %entry.assigned_role,
                    "No compatible empty slot, card dropped"
                ),
            }
        }

        for definition_id in &descriptor.subs {
            let sub = pool.iter().find(|c| c.definition_id == *definition_id).cloned();
            if sub.is_none() {
                warn!(definition_id, "Substitute not found in candidate pool");
            }
            slots.push(sub);
        }

        Squad { slots }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
