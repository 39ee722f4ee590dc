/// Farm engine — Fragments and Ruins
///
/// Unidentified fragments (dropped on harvest) are exchanged one at a
/// time for a ruin-specific fragment; a fixed number of those assemble
/// one ruin. Ruins feed a single passive profit timer whose payout is
/// computed from the ruin count at claim time.

use crate::arithmetic::checked_mul;
use crate::bonus;
use crate::domain::{GameState, UNIDENTIFIED_FRAGMENT};
use crate::outcome::Rejection;
use crate::timer::{Cycle, DurationRule};
use crate::transitions::TransitionContext;

pub fn total_ruins(state: &GameState) -> Result<i64, Rejection> {
    state.ruins.total().ok_or(Rejection::Overflow)
}

pub(crate) fn apply_exchange_fragment(
    state: &mut GameState,
    ctx: &TransitionContext,
    to_fragment: &str,
) -> Result<(), Rejection> {
    if !ctx.catalog.is_fragment(to_fragment) {
        return Err(Rejection::not_found("fragment", to_fragment));
    }
    state.fragments.debit(UNIDENTIFIED_FRAGMENT, 1)?;
    state.fragments.credit(to_fragment, 1)
}

pub(crate) fn apply_assemble_ruin(
    state: &mut GameState,
    ctx: &TransitionContext,
    ruin_type: &str,
) -> Result<(), Rejection> {
    let ruin = ctx
        .catalog
        .ruin(ruin_type)
        .ok_or_else(|| Rejection::not_found("ruin", ruin_type))?;
    state
        .fragments
        .debit(&ruin.fragment_id, ctx.catalog.tuning.fragments_per_ruin)?;
    state.ruins.credit(ruin_type, 1)?;
    tracing::info!(ruin_type, total = total_ruins(state)?, "ruin assembled");
    Ok(())
}

pub(crate) fn apply_start_profit_collection(
    state: &mut GameState,
    ctx: &TransitionContext,
) -> Result<(), Rejection> {
    if total_ruins(state)? <= 0 {
        return Err(Rejection::NothingToDo);
    }
    state.ruin_profit_state.start(ctx.now)
}

pub(crate) fn apply_claim_profit(
    state: &mut GameState,
    ctx: &TransitionContext,
) -> Result<(), Rejection> {
    let bundle = bonus::resolve_for_state(state, ctx.catalog);
    let rule = DurationRule::for_cycle(
        Cycle::RuinProfit,
        &bundle,
        &state.recruiter_state,
        &ctx.catalog.tuning,
    );
    let mut timer = state.ruin_profit_state;
    let earnings = timer.collect(ctx.now, &rule, || {
        checked_mul(total_ruins(state)?, ctx.catalog.tuning.profit_per_ruin)
            .ok_or(Rejection::Overflow)
    })?;
    state.ruin_profit_state = timer;
    state.earn(earnings)
}
