/// Farm engine — Bonus Resolver
///
/// Folds the active nation's traits and the skill allocation into one
/// modifier bundle. Stateless; recomputed on every read and never cached
/// in `GameState`.
///
/// Composition:
///   nation contribution  = stacks(effect) * per-stack rate
///   skill contribution   = points * per-point rate
///   reductions, chance   = nation + skill (reductions clamped)
///   sell multiplier      = 1 + nation + skill

use std::collections::BTreeMap;

use crate::catalog::{Catalog, NationEffect};
use crate::domain::{GameState, Nation, SkillTree};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonusBundle {
    pub crop_time_reduction: f64,
    pub mine_time_reduction: f64,
    pub country_time_reduction: f64,
    pub tenant_time_reduction: f64,
    /// Nation-only; no skill feeds it.
    pub ruin_time_reduction: f64,
    pub fragment_chance_increase: f64,
    pub sell_price_multiplier: f64,
}

impl Default for BonusBundle {
    fn default() -> Self {
        Self {
            crop_time_reduction: 0.0,
            mine_time_reduction: 0.0,
            country_time_reduction: 0.0,
            tenant_time_reduction: 0.0,
            ruin_time_reduction: 0.0,
            fragment_chance_increase: 0.0,
            sell_price_multiplier: 1.0,
        }
    }
}

/// Count how many populated trait slots map to each effect.
pub fn nation_stacks(nation: &Nation, catalog: &Catalog) -> BTreeMap<NationEffect, u32> {
    let mut stacks = BTreeMap::new();
    for (category, option) in nation.attributes.selections() {
        if let Some(effect) = catalog.trait_effect(category, option) {
            *stacks.entry(effect).or_insert(0) += 1;
        }
    }
    stacks
}

pub fn resolve(nation: Option<&Nation>, skills: &SkillTree, catalog: &Catalog) -> BonusBundle {
    let tuning = &catalog.tuning;
    let stacks = nation.map(|n| nation_stacks(n, catalog)).unwrap_or_default();
    let from_nation = |effect: NationEffect| {
        let count = stacks.get(&effect).copied().unwrap_or(0);
        f64::from(count) * tuning.nation_effect_rates.per_stack(effect)
    };
    let rates = &tuning.skill_rates;
    let from_skill = |points: u32, rate: f64| f64::from(points) * rate;
    let clamp = |r: f64| r.min(tuning.max_time_reduction);

    BonusBundle {
        crop_time_reduction: clamp(
            from_nation(NationEffect::CropTime) + from_skill(skills.crop_time, rates.crop_time),
        ),
        mine_time_reduction: clamp(
            from_nation(NationEffect::MineTime) + from_skill(skills.mine_time, rates.mine_time),
        ),
        country_time_reduction: clamp(
            from_nation(NationEffect::CountryTime)
                + from_skill(skills.country_time, rates.country_time),
        ),
        tenant_time_reduction: clamp(from_skill(skills.tenant_time, rates.tenant_time)),
        ruin_time_reduction: clamp(from_nation(NationEffect::RuinTime)),
        fragment_chance_increase: from_nation(NationEffect::FragmentChance)
            + from_skill(skills.fragment_chance, rates.fragment_chance),
        sell_price_multiplier: 1.0
            + from_nation(NationEffect::SellPrice)
            + from_skill(skills.sell_price, rates.sell_price),
    }
}

/// The active nation, if the pointer resolves to a finalized nation.
pub fn active_nation(state: &GameState) -> Option<&Nation> {
    let id = state.active_nation_id.as_deref()?;
    state.nation(id).filter(|n| n.is_finalized)
}

pub fn resolve_for_state(state: &GameState, catalog: &Catalog) -> BonusBundle {
    resolve(active_nation(state), &state.skill_tree, catalog)
}
