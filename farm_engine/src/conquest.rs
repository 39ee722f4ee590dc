/// Farm engine — Countries
///
/// Countries unlock in catalog order. Conquest spends weapons and grants
/// a one-time population reward; each conquered country then runs its
/// own production timer, paying specialty goods and bonds computed from
/// its ranks at collection time. Bonds buy rank upgrades.

use crate::bonus;
use crate::catalog::{Catalog, Tuning};
use crate::domain::{ConqueredCountry, GameState, RankKind};
use crate::mining::sell_from_ledger;
use crate::outcome::Rejection;
use crate::timer::{Cycle, DurationRule};
use crate::transitions::TransitionContext;

/// Selectable once the immediate predecessor is conquered.
pub fn is_unlocked(state: &GameState, catalog: &Catalog, country_id: &str) -> bool {
    if catalog.country(country_id).is_none() {
        return false;
    }
    match catalog.predecessor(country_id) {
        None => true,
        Some(previous) => state.countries.contains_key(&previous.id),
    }
}

/// `(goods, bonds)` one collection yields at the given rank total.
pub fn production_yield(country: &ConqueredCountry, tuning: &Tuning) -> (i64, i64) {
    let above_base = i64::from(country.total_levels()).saturating_sub(3).max(0);
    let goods = tuning.base_goods_per_production + above_base / 5;
    let bonds = tuning.base_bonds_per_production + above_base * 2;
    (goods, bonds)
}

/// Bond cost of raising `rank` one level.
pub fn rank_upgrade_cost(country: &ConqueredCountry, rank: RankKind, tuning: &Tuning) -> i64 {
    tuning
        .rank_upgrade_base_cost
        .saturating_mul(i64::from(country.rank(rank)) + 1)
}

fn conquered_mut<'s>(
    state: &'s mut GameState,
    country_id: &str,
) -> Result<&'s mut ConqueredCountry, Rejection> {
    state
        .countries
        .get_mut(country_id)
        .ok_or_else(|| Rejection::not_found("conquered country", country_id))
}

pub(crate) fn apply_conquer(
    state: &mut GameState,
    ctx: &TransitionContext,
    country_id: &str,
) -> Result<(), Rejection> {
    let info = ctx
        .catalog
        .country(country_id)
        .ok_or_else(|| Rejection::not_found("country", country_id))?;
    if state.countries.contains_key(country_id) {
        return Err(Rejection::WrongPhase("country already conquered"));
    }
    if !is_unlocked(state, ctx.catalog, country_id) {
        return Err(Rejection::WrongPhase("previous country not conquered"));
    }
    for (weapon_id, needed) in &info.conquest_requirements {
        let have = state.weapons.get(weapon_id);
        if have < *needed {
            return Err(Rejection::insufficient(weapon_id.as_str(), *needed, have));
        }
    }
    for (weapon_id, needed) in &info.conquest_requirements {
        state.weapons.debit(weapon_id, *needed)?;
    }
    state.gain_citizens(info.conquest_citizen_reward)?;
    state
        .countries
        .insert(country_id.to_string(), ConqueredCountry::freshly_conquered());
    tracing::info!(country_id, reward = info.conquest_citizen_reward, "country conquered");
    Ok(())
}

pub(crate) fn apply_start_production(
    state: &mut GameState,
    ctx: &TransitionContext,
    country_id: &str,
) -> Result<(), Rejection> {
    conquered_mut(state, country_id)?.production_state.start(ctx.now)
}

pub(crate) fn apply_collect_production(
    state: &mut GameState,
    ctx: &TransitionContext,
    country_id: &str,
) -> Result<(), Rejection> {
    let info = ctx
        .catalog
        .country(country_id)
        .ok_or_else(|| Rejection::not_found("country", country_id))?;
    let bundle = bonus::resolve_for_state(state, ctx.catalog);
    let rule = DurationRule::for_cycle(
        Cycle::CountryProduction,
        &bundle,
        &state.recruiter_state,
        &ctx.catalog.tuning,
    );
    let tuning = &ctx.catalog.tuning;
    let country = conquered_mut(state, country_id)?;
    let mut timer = country.production_state;
    let (goods, bonds) = timer.collect(ctx.now, &rule, || {
        Ok(production_yield(country, tuning))
    })?;
    country.production_state = timer;
    country.bonds = country.bonds.checked_add(bonds).ok_or(Rejection::Overflow)?;
    state.specialty_goods.credit(&info.specialty_good_id, goods)
}

pub(crate) fn apply_upgrade_rank(
    state: &mut GameState,
    ctx: &TransitionContext,
    country_id: &str,
    rank: RankKind,
) -> Result<(), Rejection> {
    let tuning = &ctx.catalog.tuning;
    let country = conquered_mut(state, country_id)?;
    if country.rank(rank) >= tuning.max_rank {
        return Err(Rejection::CapReached("rank"));
    }
    let cost = rank_upgrade_cost(country, rank, tuning);
    if country.bonds < cost {
        return Err(Rejection::insufficient("bonds", cost, country.bonds));
    }
    country.bonds -= cost;
    *country.rank_mut(rank) += 1;
    Ok(())
}

pub(crate) fn apply_sell_specialty_good(
    state: &mut GameState,
    ctx: &TransitionContext,
    good_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    let price = ctx
        .catalog
        .specialty_goods
        .get(good_id)
        .ok_or_else(|| Rejection::not_found("specialty good", good_id))?
        .sell_price;
    sell_from_ledger(state, ctx, |s| &mut s.specialty_goods, good_id, price, quantity)
}
