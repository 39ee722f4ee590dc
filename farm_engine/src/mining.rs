/// Farm engine — Mine and Smithy
///
/// One mining timer; a completed run draws a fixed number of minerals
/// uniformly from the mineral table. Minerals craft into weapons, which
/// are spent on conquest or sold.

use std::collections::BTreeMap;

use rand::Rng;

use crate::arithmetic::{checked_mul, floor_scaled};
use crate::bonus;
use crate::domain::{GameState, Ledger};
use crate::outcome::Rejection;
use crate::timer::{Cycle, DurationRule};
use crate::transitions::TransitionContext;

/// Sell `quantity` from `ledger` at `unit_price`, scaled by the live sell
/// multiplier. Shared by every non-crop market.
pub(crate) fn sell_from_ledger(
    state: &mut GameState,
    ctx: &TransitionContext,
    pick: fn(&mut GameState) -> &mut Ledger,
    id: &str,
    unit_price: i64,
    quantity: i64,
) -> Result<(), Rejection> {
    if quantity <= 0 {
        return Err(Rejection::Invalid(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    let multiplier = bonus::resolve_for_state(state, ctx.catalog).sell_price_multiplier;
    let gross = checked_mul(unit_price, quantity).ok_or(Rejection::Overflow)?;
    pick(state).debit(id, quantity)?;
    state.earn(floor_scaled(gross, multiplier))
}

pub(crate) fn apply_start_mining(
    state: &mut GameState,
    ctx: &TransitionContext,
) -> Result<(), Rejection> {
    state.mine_state.start(ctx.now)
}

pub(crate) fn apply_collect_minerals(
    state: &mut GameState,
    ctx: &mut TransitionContext,
) -> Result<(), Rejection> {
    let catalog = ctx.catalog;
    let bundle = bonus::resolve_for_state(state, catalog);
    let rule = DurationRule::for_cycle(
        Cycle::Mining,
        &bundle,
        &state.recruiter_state,
        &catalog.tuning,
    );
    let rng = &mut ctx.rng;
    let mut timer = state.mine_state;
    let haul = timer.collect(ctx.now, &rule, || {
        if catalog.minerals.is_empty() {
            return Err(Rejection::NothingToDo);
        }
        let mut haul: BTreeMap<&str, i64> = BTreeMap::new();
        for _ in 0..catalog.tuning.minerals_per_run {
            let pick = &catalog.minerals[rng.gen_range(0..catalog.minerals.len())];
            *haul.entry(pick.id.as_str()).or_insert(0) += 1;
        }
        Ok(haul)
    })?;
    for (mineral_id, count) in haul {
        state.minerals.credit(mineral_id, count)?;
    }
    state.mine_state = timer;
    Ok(())
}

pub(crate) fn apply_sell_mineral(
    state: &mut GameState,
    ctx: &TransitionContext,
    mineral_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    let price = ctx
        .catalog
        .mineral(mineral_id)
        .ok_or_else(|| Rejection::not_found("mineral", mineral_id))?
        .sell_price;
    sell_from_ledger(state, ctx, |s| &mut s.minerals, mineral_id, price, quantity)
}

pub(crate) fn apply_craft_weapon(
    state: &mut GameState,
    ctx: &TransitionContext,
    weapon_id: &str,
) -> Result<(), Rejection> {
    let weapon = ctx
        .catalog
        .weapons
        .get(weapon_id)
        .ok_or_else(|| Rejection::not_found("weapon", weapon_id))?;
    for (mineral_id, needed) in &weapon.recipe {
        let have = state.minerals.get(mineral_id);
        if have < *needed {
            return Err(Rejection::insufficient(mineral_id.as_str(), *needed, have));
        }
    }
    for (mineral_id, needed) in &weapon.recipe {
        state.minerals.debit(mineral_id, *needed)?;
    }
    state.weapons.credit(weapon_id, 1)
}

pub(crate) fn apply_sell_weapon(
    state: &mut GameState,
    ctx: &TransitionContext,
    weapon_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    let price = ctx
        .catalog
        .weapons
        .get(weapon_id)
        .ok_or_else(|| Rejection::not_found("weapon", weapon_id))?
        .sell_price;
    sell_from_ledger(state, ctx, |s| &mut s.weapons, weapon_id, price, quantity)
}
