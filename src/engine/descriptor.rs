//! Challenge descriptor construction.

use crate::host::{Award, ChallengeSet, ChallengeSummary, LoadedChallenge};
use crate::types::{
    ChallengeDescriptor, ChallengeRequirement, RequirementKey, RequirementScope, SbcError, Slot,
};

/// Rarity group the "save TOTW" option protects.
pub const TOTW_RARITY_GROUP: i64 = 27;

/// Pick the challenge to attempt. `requested == 0` means the last incomplete
/// challenge of the set. A requested challenge that is already completed is
/// rejected. Returns the id and whether it is the final one.
pub fn select_challenge(
    set: &ChallengeSet,
    challenges: &[ChallengeSummary],
    requested: u64,
) -> Result<(u64, bool), SbcError> {
    if set.is_complete {
        return Err(SbcError::NoEligibleChallenge(format!("{} is already completed", set.name)));
    }

    let incomplete: Vec<&ChallengeSummary> = challenges.iter().filter(|c| !c.is_complete()).collect();
    let Some(last) = incomplete.last() else {
        return Err(SbcError::NoEligibleChallenge(format!("{} has no incomplete challenges", set.name)));
    };
    let final_sbc = incomplete.len() == 1;

    if requested == 0 {
        return Ok((last.id, final_sbc));
    }
    match challenges.iter().find(|c| c.id == requested) {
        Some(c) if c.is_complete() => Err(SbcError::NoEligibleChallenge(format!(
            "challenge {requested} in {} is already completed",
            set.name
        ))),
        Some(_) => Ok((requested, final_sbc)),
        None => Err(SbcError::NoEligibleChallenge(format!("challenge {requested} not found in {}", set.name))),
    }
}

/// Force-include the TOTW exclusion clause.
pub fn apply_save_totw(requirements: &mut Vec<ChallengeRequirement>) {
    let existing = requirements.iter_mut().find(|r| {
        r.requirement_key.is(RequirementKey::PLAYER_RARITY_GROUP)
            && r.eligibility_values.first() == Some(&TOTW_RARITY_GROUP)
    });

    match existing {
        Some(requirement) => requirement.scope = RequirementScope::Exact,
        None => requirements.push(ChallengeRequirement {
            scope: RequirementScope::Exact,
            count: 0,
            requirement_key: RequirementKey::new(RequirementKey::PLAYER_RARITY_GROUP),
            eligibility_values: vec![TOTW_RARITY_GROUP],
        }),
    }
}

fn pack_ids(awards: &[Award]) -> impl Iterator<Item = u64> + '_ {
    awards.iter().filter_map(Award::pack_id)
}

pub fn build_descriptor(
    loaded: &LoadedChallenge,
    set: &ChallengeSet,
    final_sbc: bool,
    save_totw: bool,
) -> ChallengeDescriptor {
    let mut constraints = loaded.requirements.clone();
    if save_totw {
        apply_save_totw(&mut constraints);
    }

    let formation = loaded
        .formation
        .iter()
        .enumerate()
        .map(|(i, role)| if loaded.brick_indices.contains(&i) { Slot::Wildcard } else { Slot::Role(*role) })
        .collect();

    let mut awards: Vec<u64> = pack_ids(&loaded.awards).collect();
    if final_sbc {
        awards.extend(pack_ids(&set.awards));
    }

    ChallengeDescriptor {
        constraints,
        formation,
        brick_indices: loaded.brick_indices.clone(),
        challenge_id: loaded.id,
        set_id: loaded.set_id,
        subs: loaded.sub_definition_ids.iter().copied().filter(|id| *id > 0).collect(),
        final_sbc,
        awards,
    }
}
