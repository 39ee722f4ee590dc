/// Farm engine — Progression
///
/// Nation builder, skill tree and recruiter: the three systems that feed
/// the bonus resolver or the population pool rather than producing goods.

use rand::Rng;

use crate::arithmetic::{checked_add, fresh_id};
use crate::bonus;
use crate::catalog::Catalog;
use crate::domain::{GameState, Nation, NationAttributes, RecruiterItem, SkillTree, TraitCategory};
use crate::outcome::Rejection;
use crate::timer::{Cycle, DurationRule};
use crate::transitions::TransitionContext;

// ── Nations ────────────────────────────────────────────────────────

pub(crate) fn apply_buy_nation(
    state: &mut GameState,
    ctx: &TransitionContext,
    name: &str,
) -> Result<(), Rejection> {
    if name.trim().is_empty() {
        return Err(Rejection::Invalid("nation name is empty".to_string()));
    }
    state.spend(ctx.catalog.tuning.nation_cost)?;
    let id = fresh_id("nation", |candidate| state.nation(candidate).is_some());
    state.nations.push(Nation {
        id,
        name: name.to_string(),
        attributes: NationAttributes::default(),
        is_finalized: false,
    });
    Ok(())
}

/// One uniformly drawn option per category.
fn roll_attributes(catalog: &Catalog, rng: &mut impl Rng) -> NationAttributes {
    let mut attributes = NationAttributes::default();
    for category in TraitCategory::ALL {
        if let Some(options) = catalog.nation_traits.get(&category) {
            if !options.is_empty() {
                let pick = &options[rng.gen_range(0..options.len())];
                attributes.set(category, Some(pick.id.clone()));
            }
        }
    }
    attributes
}

pub(crate) fn apply_reroll_nation(
    state: &mut GameState,
    ctx: &mut TransitionContext,
    nation_id: &str,
) -> Result<(), Rejection> {
    let catalog = ctx.catalog;
    let nation = state
        .nation(nation_id)
        .ok_or_else(|| Rejection::not_found("nation", nation_id))?;
    if nation.is_finalized {
        return Err(Rejection::WrongPhase("nation is finalized"));
    }
    state.spend(catalog.tuning.nation_reroll_cost)?;
    let attributes = roll_attributes(catalog, &mut ctx.rng);
    state.nation_mut(nation_id)?.attributes = attributes;
    Ok(())
}

pub(crate) fn apply_finalize_nation(
    state: &mut GameState,
    nation_id: &str,
) -> Result<(), Rejection> {
    let nation = state.nation_mut(nation_id)?;
    if nation.is_finalized {
        return Err(Rejection::WrongPhase("nation already finalized"));
    }
    if !nation.attributes.is_complete() {
        return Err(Rejection::WrongPhase("nation has unselected traits"));
    }
    nation.is_finalized = true;
    tracing::info!(nation_id, "nation finalized");
    Ok(())
}

pub(crate) fn apply_set_active_nation(
    state: &mut GameState,
    nation_id: Option<&str>,
) -> Result<(), Rejection> {
    if let Some(id) = nation_id {
        let nation = state
            .nation(id)
            .ok_or_else(|| Rejection::not_found("nation", id))?;
        if !nation.is_finalized {
            return Err(Rejection::WrongPhase("nation is not finalized"));
        }
    }
    state.active_nation_id = nation_id.map(str::to_string);
    Ok(())
}

// ── Skill tree ─────────────────────────────────────────────────────

/// Ceiling for the skill allocation: every crop's three quality stats.
pub fn total_skill_points_earned(state: &GameState) -> u64 {
    state
        .crop_data
        .values()
        .map(|c| c.stats.sum())
        .sum()
}

pub(crate) fn apply_allocate_skill_points(
    state: &mut GameState,
    allocation: &SkillTree,
) -> Result<(), Rejection> {
    let earned = total_skill_points_earned(state);
    let requested = allocation.total();
    if requested > earned {
        return Err(Rejection::insufficient(
            "skill points",
            i64::try_from(requested).unwrap_or(i64::MAX),
            i64::try_from(earned).unwrap_or(i64::MAX),
        ));
    }
    state.skill_tree = *allocation;
    Ok(())
}

pub(crate) fn apply_reset_skill_points(
    state: &mut GameState,
    ctx: &TransitionContext,
) -> Result<(), Rejection> {
    if state.skill_tree == SkillTree::default() {
        return Err(Rejection::NothingToDo);
    }
    state.spend(ctx.catalog.tuning.skill_reset_cost)?;
    state.skill_tree = SkillTree::default();
    Ok(())
}

// ── Recruiter ──────────────────────────────────────────────────────

/// Citizens one completed recruitment grants.
pub fn recruitment_yield(state: &GameState, catalog: &Catalog) -> i64 {
    let tuning = &catalog.tuning;
    tuning.recruitment_base_gain.saturating_add(
        state
            .recruiter_state
            .citizen_increase_items
            .saturating_mul(tuning.recruiter_item_citizen_bonus),
    )
}

/// Citizen price of the next batch of `item`.
pub fn recruiter_item_cost(state: &GameState, catalog: &Catalog, item: RecruiterItem) -> i64 {
    let tuning = &catalog.tuning;
    let owned = match item {
        RecruiterItem::CitizenIncrease => state.recruiter_state.citizen_increase_items,
        RecruiterItem::TimeReduction => state.recruiter_state.time_reduction_items,
    };
    tuning
        .recruiter_item_base_cost
        .saturating_add(owned.saturating_mul(tuning.recruiter_item_cost_increment))
}

pub(crate) fn apply_start_recruitment(
    state: &mut GameState,
    ctx: &TransitionContext,
) -> Result<(), Rejection> {
    state.recruiter_state.cycle.start(ctx.now)
}

pub(crate) fn apply_claim_citizens(
    state: &mut GameState,
    ctx: &TransitionContext,
) -> Result<(), Rejection> {
    let bundle = bonus::resolve_for_state(state, ctx.catalog);
    let rule = DurationRule::for_cycle(
        Cycle::Recruitment,
        &bundle,
        &state.recruiter_state,
        &ctx.catalog.tuning,
    );
    let mut timer = state.recruiter_state.cycle;
    let gained = timer.collect(ctx.now, &rule, || Ok(recruitment_yield(state, ctx.catalog)))?;
    state.recruiter_state.cycle = timer;
    state.gain_citizens(gained)
}

pub(crate) fn apply_buy_recruiter_item(
    state: &mut GameState,
    ctx: &TransitionContext,
    item: RecruiterItem,
) -> Result<(), Rejection> {
    let cost = recruiter_item_cost(state, ctx.catalog, item);
    state.spend_citizens(cost)?;
    let batch = ctx.catalog.tuning.recruiter_items_per_purchase;
    let counter = match item {
        RecruiterItem::CitizenIncrease => &mut state.recruiter_state.citizen_increase_items,
        RecruiterItem::TimeReduction => &mut state.recruiter_state.time_reduction_items,
    };
    *counter = checked_add(*counter, batch).ok_or(Rejection::Overflow)?;
    Ok(())
}

/// Effective recruiter duration with the current items.
pub fn recruitment_duration(state: &GameState, catalog: &Catalog) -> i64 {
    let bundle = bonus::resolve_for_state(state, catalog);
    DurationRule::for_cycle(
        Cycle::Recruitment,
        &bundle,
        &state.recruiter_state,
        &catalog.tuning,
    )
    .effective()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_initial_state;
    use rand::SeedableRng;

    const HOUR: i64 = 3_600_000;

    fn tycoon(catalog: &Catalog) -> GameState {
        let mut state = create_initial_state(catalog);
        state.money = 1_000_000_000;
        state
    }

    #[test]
    fn test_nation_lifecycle() {
        let catalog = Catalog::standard();
        let mut ctx = TransitionContext::new(&catalog, 0, 11);
        let mut state = tycoon(&catalog);
        apply_buy_nation(&mut state, &ctx, "Freedonia").unwrap();
        let id = state.nations[0].id.clone();
        assert_eq!(state.money, 900_000_000);

        assert!(apply_finalize_nation(&mut state, &id).is_err());
        assert!(apply_set_active_nation(&mut state, Some(&id)).is_err());

        apply_reroll_nation(&mut state, &mut ctx, &id).unwrap();
        assert!(state.nations[0].attributes.is_complete());
        assert_eq!(state.money, 899_000_000);

        apply_finalize_nation(&mut state, &id).unwrap();
        assert_eq!(
            apply_reroll_nation(&mut state, &mut ctx, &id),
            Err(Rejection::WrongPhase("nation is finalized"))
        );
        apply_set_active_nation(&mut state, Some(&id)).unwrap();
        assert_eq!(state.active_nation_id.as_deref(), Some(id.as_str()));
        apply_set_active_nation(&mut state, None).unwrap();
        assert!(state.active_nation_id.is_none());
    }

    #[test]
    fn test_reroll_picks_catalog_options() {
        let catalog = Catalog::standard();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(5);
        let attributes = roll_attributes(&catalog, &mut rng);
        for (category, option) in attributes.selections() {
            assert!(catalog.trait_effect(category, option).is_some());
        }
    }

    #[test]
    fn test_skill_allocation_bounded_by_research() {
        let catalog = Catalog::standard();
        let mut state = tycoon(&catalog);
        let wish = SkillTree {
            crop_time: 2,
            sell_price: 1,
            ..SkillTree::default()
        };
        assert!(apply_allocate_skill_points(&mut state, &wish).is_err());

        state.crop_data.get_mut("apple").unwrap().stats.taste = 2;
        state.crop_data.get_mut("tuna").unwrap().stats.appearance = 1;
        assert_eq!(total_skill_points_earned(&state), 3);
        apply_allocate_skill_points(&mut state, &wish).unwrap();
        assert_eq!(state.skill_tree, wish);
    }

    #[test]
    fn test_reset_costs_money() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = tycoon(&catalog);
        assert_eq!(
            apply_reset_skill_points(&mut state, &ctx),
            Err(Rejection::NothingToDo)
        );
        state.skill_tree.mine_time = 4;
        apply_reset_skill_points(&mut state, &ctx).unwrap();
        assert_eq!(state.skill_tree, SkillTree::default());
        assert_eq!(state.money, 999_000_000);
    }

    #[test]
    fn test_recruiter_items_and_duration() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = tycoon(&catalog);
        state.citizens = 100;
        assert_eq!(recruitment_duration(&state, &catalog), 24 * HOUR);

        apply_buy_recruiter_item(&mut state, &ctx, RecruiterItem::TimeReduction).unwrap();
        assert_eq!(state.citizens, 90);
        assert_eq!(state.recruiter_state.time_reduction_items, 50);
        // 24h - 50 * 30min floors at 1h.
        assert_eq!(recruitment_duration(&state, &catalog), HOUR);
        // Next batch: 10 + 50 * 5.
        assert_eq!(
            recruiter_item_cost(&state, &catalog, RecruiterItem::TimeReduction),
            260
        );
        assert!(apply_buy_recruiter_item(&mut state, &ctx, RecruiterItem::TimeReduction).is_err());
    }

    #[test]
    fn test_recruitment_cycle() {
        let catalog = Catalog::standard();
        let mut state = tycoon(&catalog);
        state.recruiter_state.citizen_increase_items = 50;
        let citizens = state.citizens;
        apply_start_recruitment(&mut state, &TransitionContext::new(&catalog, 0, 0)).unwrap();
        assert!(apply_claim_citizens(&mut state, &TransitionContext::new(&catalog, HOUR, 0)).is_err());
        apply_claim_citizens(&mut state, &TransitionContext::new(&catalog, 24 * HOUR, 0)).unwrap();
        assert_eq!(state.citizens, citizens + 51);
        assert!(!state.recruiter_state.cycle.is_running());
    }

    #[test]
    fn test_recruitment_yield_counts_items_held_at_claim() {
        let catalog = Catalog::standard();
        let mut state = tycoon(&catalog);
        let citizens = state.citizens;
        apply_start_recruitment(&mut state, &TransitionContext::new(&catalog, 0, 0)).unwrap();
        state.recruiter_state.citizen_increase_items = 9;
        apply_claim_citizens(&mut state, &TransitionContext::new(&catalog, 24 * HOUR, 0)).unwrap();
        assert_eq!(state.citizens, citizens + 10);
    }
}
