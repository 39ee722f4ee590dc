/// Farm engine — Facilities and Crops
///
/// Seed purchase, planting (single and batch), harvesting (single and
/// batch), crop sales and quality research.
///
/// Readiness policy: `harvest` is unconditional on timing, `harvest_all`
/// only takes facilities whose grow time has elapsed under the live bonus.

use rand::Rng;

use crate::arithmetic::{checked_mul, floor_scaled, fresh_id, Millis};
use crate::bonus::{self, BonusBundle};
use crate::catalog::{Catalog, Tuning};
use crate::domain::{
    CropDefinition, Facility, GameState, PlantedCrop, QualityStat, UNIDENTIFIED_FRAGMENT,
};
use crate::outcome::Rejection;
use crate::timer::{elapsed_at_least, Cycle, DurationRule};
use crate::transitions::TransitionContext;

// ── Read-side helpers ──────────────────────────────────────────────

/// `floor(baseSellPrice * (1 + statSum * rate))`.
pub fn crop_unit_price(crop: &CropDefinition, tuning: &Tuning) -> i64 {
    let factor = 1.0 + crop.stats.sum() as f64 * tuning.stat_sell_price_multiplier;
    floor_scaled(crop.base_sell_price, factor)
}

/// Live grow duration under the current bonus bundle.
pub fn effective_grow_time(state: &GameState, catalog: &Catalog) -> Millis {
    let bundle = bonus::resolve_for_state(state, catalog);
    DurationRule::for_cycle(
        Cycle::CropGrowth,
        &bundle,
        &state.recruiter_state,
        &catalog.tuning,
    )
    .effective()
}

/// Chance that one harvested facility drops a fragment.
pub fn fragment_chance(bundle: &BonusBundle, tuning: &Tuning) -> f64 {
    tuning.harvest_fragment_chance + bundle.fragment_chance_increase
}

/// Facilities whose planted crop has grown at `now`.
pub fn ready_facility_ids(state: &GameState, catalog: &Catalog, now: Millis) -> Vec<String> {
    let grow = effective_grow_time(state, catalog);
    state
        .facilities
        .iter()
        .filter(|f| {
            f.planted_crop
                .as_ref()
                .map_or(false, |p| elapsed_at_least(p.planted_at, now, grow))
        })
        .map(|f| f.id.clone())
        .collect()
}

/// Whether `crop_id` may go into `facility`.
fn compatible(facility: &Facility, crop: &CropDefinition) -> bool {
    facility.category == crop.crop_type.facility_category()
}

fn crop_definition<'s>(state: &'s GameState, crop_id: &str) -> Result<&'s CropDefinition, Rejection> {
    state
        .crop_data
        .get(crop_id)
        .ok_or_else(|| Rejection::not_found("crop", crop_id))
}

fn positive(quantity: i64) -> Result<(), Rejection> {
    if quantity <= 0 {
        return Err(Rejection::Invalid(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

fn roll_fragment(ctx: &mut TransitionContext, chance: f64) -> bool {
    ctx.rng.gen::<f64>() < chance
}

// ── Purchases ──────────────────────────────────────────────────────

pub(crate) fn apply_buy_seeds(
    state: &mut GameState,
    crop_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    positive(quantity)?;
    let price = crop_definition(state, crop_id)?.buy_price;
    let cost = checked_mul(price, quantity).ok_or(Rejection::Overflow)?;
    state.spend(cost)?;
    state.seeds.credit(crop_id, quantity)
}

pub(crate) fn apply_buy_facility(
    state: &mut GameState,
    ctx: &TransitionContext,
    facility_type: &str,
) -> Result<(), Rejection> {
    let tuning = &ctx.catalog.tuning;
    let template = ctx
        .catalog
        .facilities
        .get(facility_type)
        .ok_or_else(|| Rejection::not_found("facility type", facility_type))?;

    if state.facilities.len() >= tuning.max_facilities {
        return Err(Rejection::CapReached("facility"));
    }
    let same_name = state
        .facilities
        .iter()
        .filter(|f| f.name == template.name)
        .count();
    if same_name >= tuning.max_facilities_per_name {
        return Err(Rejection::CapReached("facility per type"));
    }

    state.spend(template.price)?;
    let id = fresh_id(facility_type, |candidate| {
        state.facilities.iter().any(|f| f.id == candidate)
    });
    state.facilities.push(Facility {
        id,
        name: template.name.clone(),
        category: template.category,
        capacity: template.capacity,
        planted_crop: None,
    });
    Ok(())
}

// ── Planting ───────────────────────────────────────────────────────

pub(crate) fn apply_plant(
    state: &mut GameState,
    ctx: &TransitionContext,
    facility_id: &str,
    crop_id: &str,
) -> Result<(), Rejection> {
    let crop = crop_definition(state, crop_id)?.clone();
    let stock = state.seeds.get(crop_id);
    let facility = state.facility_mut(facility_id)?;
    if facility.planted_crop.is_some() {
        return Err(Rejection::WrongPhase("facility already planted"));
    }
    if !compatible(facility, &crop) {
        return Err(Rejection::Invalid(format!(
            "{} cannot grow in {:?} facility",
            crop_id, facility.category
        )));
    }
    let capacity = facility.capacity;
    if stock < capacity {
        return Err(Rejection::insufficient(crop_id, capacity, stock));
    }
    facility.planted_crop = Some(PlantedCrop {
        crop_id: crop_id.to_string(),
        quantity: capacity,
        planted_at: ctx.now,
    });
    state.seeds.debit(crop_id, capacity)
}

/// Fill empty compatible facilities in order, stopping at the first one
/// the remaining stock cannot fully fill.
pub(crate) fn apply_plant_all(
    state: &mut GameState,
    ctx: &TransitionContext,
    crop_id: &str,
) -> Result<(), Rejection> {
    let crop = crop_definition(state, crop_id)?.clone();
    let mut remaining = state.seeds.get(crop_id);
    let mut planted: i64 = 0;

    for facility in state
        .facilities
        .iter_mut()
        .filter(|f| f.planted_crop.is_none() && compatible(f, &crop))
    {
        if remaining < facility.capacity {
            break;
        }
        remaining -= facility.capacity;
        planted += facility.capacity;
        facility.planted_crop = Some(PlantedCrop {
            crop_id: crop_id.to_string(),
            quantity: facility.capacity,
            planted_at: ctx.now,
        });
    }

    if planted == 0 {
        return Err(Rejection::NothingToDo);
    }
    state.seeds.debit(crop_id, planted)
}

// ── Harvesting ─────────────────────────────────────────────────────

fn harvest_facility(
    state: &mut GameState,
    facility_id: &str,
    drops_fragment: bool,
) -> Result<(), Rejection> {
    let facility = state.facility_mut(facility_id)?;
    let planted = facility
        .planted_crop
        .take()
        .ok_or(Rejection::WrongPhase("facility is empty"))?;
    state.products.credit(&planted.crop_id, planted.quantity)?;
    if drops_fragment {
        state.fragments.credit(UNIDENTIFIED_FRAGMENT, 1)?;
    }
    Ok(())
}

pub(crate) fn apply_harvest(
    state: &mut GameState,
    ctx: &mut TransitionContext,
    facility_id: &str,
) -> Result<(), Rejection> {
    let bundle = bonus::resolve_for_state(state, ctx.catalog);
    let chance = fragment_chance(&bundle, &ctx.catalog.tuning);
    let has_crop = state
        .facilities
        .iter()
        .find(|f| f.id == facility_id)
        .ok_or_else(|| Rejection::not_found("facility", facility_id))?
        .planted_crop
        .is_some();
    if !has_crop {
        return Err(Rejection::WrongPhase("facility is empty"));
    }
    let drops = roll_fragment(ctx, chance);
    harvest_facility(state, facility_id, drops)
}

pub(crate) fn apply_harvest_all(
    state: &mut GameState,
    ctx: &mut TransitionContext,
) -> Result<(), Rejection> {
    let ready = ready_facility_ids(state, ctx.catalog, ctx.now);
    if ready.is_empty() {
        return Err(Rejection::NothingToDo);
    }
    let bundle = bonus::resolve_for_state(state, ctx.catalog);
    let chance = fragment_chance(&bundle, &ctx.catalog.tuning);
    for facility_id in &ready {
        let drops = roll_fragment(ctx, chance);
        harvest_facility(state, facility_id, drops)?;
    }
    Ok(())
}

// ── Market and lab ─────────────────────────────────────────────────

pub(crate) fn apply_sell(
    state: &mut GameState,
    ctx: &TransitionContext,
    crop_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    positive(quantity)?;
    let unit = crop_unit_price(crop_definition(state, crop_id)?, &ctx.catalog.tuning);
    let multiplier = bonus::resolve_for_state(state, ctx.catalog).sell_price_multiplier;
    let gross = checked_mul(unit, quantity).ok_or(Rejection::Overflow)?;
    state.products.debit(crop_id, quantity)?;
    state.earn(floor_scaled(gross, multiplier))
}

/// Pay the research cost, then roll for a +1 on one stat. The cost is
/// kept on failure and when the stat is already capped.
pub(crate) fn apply_research(
    state: &mut GameState,
    ctx: &mut TransitionContext,
    crop_id: &str,
    target: Option<QualityStat>,
) -> Result<(), Rejection> {
    let tuning = &ctx.catalog.tuning;
    crop_definition(state, crop_id)?;
    state.products.debit(crop_id, tuning.research_cost)?;

    let stat = match target {
        Some(stat) => stat,
        None => QualityStat::ALL[ctx.rng.gen_range(0..QualityStat::ALL.len())],
    };
    let succeeded = ctx.rng.gen::<f64>() < tuning.research_success_rate;
    if !succeeded {
        tracing::debug!(crop_id, ?stat, "research attempt failed");
        return Ok(());
    }

    let max = tuning.max_crop_stat;
    if let Some(crop) = state.crop_data.get_mut(crop_id) {
        let value = crop.stats.get_mut(stat);
        if *value < max {
            *value += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::domain::{FacilityCategory, Ledger};
    use crate::state::create_initial_state;
    use crate::transitions::TransitionContext;

    fn field(id: &str) -> Facility {
        Facility {
            id: id.to_string(),
            name: "Field".to_string(),
            category: FacilityCategory::Field,
            capacity: 10,
            planted_crop: None,
        }
    }

    fn three_fields() -> GameState {
        let mut state = create_initial_state(&Catalog::standard());
        state.facilities = vec![field("a"), field("b"), field("c")];
        state
    }

    #[test]
    fn test_plant_all_fills_every_field() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 1_000, 0);
        let mut state = three_fields();
        state.seeds = Ledger::from([("apple", 10_000)]);
        apply_plant_all(&mut state, &ctx, "apple").unwrap();
        assert_eq!(state.seeds.get("apple"), 9_970);
        assert!(state.facilities.iter().all(|f| f.planted_crop.is_some()));
    }

    #[test]
    fn test_plant_all_stops_at_first_unfillable() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = three_fields();
        state.seeds = Ledger::from([("apple", 25)]);
        apply_plant_all(&mut state, &ctx, "apple").unwrap();
        assert_eq!(state.seeds.get("apple"), 5);
        assert!(state.facilities[2].planted_crop.is_none());
    }

    #[test]
    fn test_plant_all_skips_other_categories() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = three_fields();
        state.seeds = Ledger::from([("tuna", 100)]);
        assert_eq!(
            apply_plant_all(&mut state, &ctx, "tuna"),
            Err(Rejection::NothingToDo)
        );
    }

    #[test]
    fn test_plant_requires_full_capacity_of_seeds() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = three_fields();
        state.seeds = Ledger::from([("apple", 9)]);
        let err = apply_plant(&mut state, &ctx, "a", "apple").unwrap_err();
        assert_eq!(err, Rejection::insufficient("apple", 10, 9));
    }

    #[test]
    fn test_harvest_ignores_grow_time() {
        let catalog = Catalog::standard();
        let mut ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = three_fields();
        state.seeds = Ledger::from([("apple", 10)]);
        apply_plant(&mut state, &ctx, "a", "apple").unwrap();
        apply_harvest(&mut state, &mut ctx, "a").unwrap();
        assert_eq!(state.products.get("apple"), 10);
        assert!(state.facilities[0].planted_crop.is_none());
    }

    #[test]
    fn test_harvest_all_only_takes_grown_facilities() {
        let catalog = Catalog::standard();
        let grow = catalog.tuning.grow_time_ms;
        let mut state = three_fields();
        state.seeds = Ledger::from([("apple", 20)]);
        apply_plant(&mut state, &TransitionContext::new(&catalog, 0, 0), "a", "apple").unwrap();
        apply_plant(&mut state, &TransitionContext::new(&catalog, grow, 0), "b", "apple").unwrap();

        let mut ctx = TransitionContext::new(&catalog, grow, 7);
        apply_harvest_all(&mut state, &mut ctx).unwrap();
        assert_eq!(state.products.get("apple"), 10);
        assert!(state.facilities[0].planted_crop.is_none());
        assert!(state.facilities[1].planted_crop.is_some());
    }

    fn catalog_with_fragment_chance(chance: f64) -> Catalog {
        let mut catalog = Catalog::standard();
        catalog.tuning.harvest_fragment_chance = chance;
        catalog
    }

    fn planted_fields(catalog: &Catalog) -> GameState {
        let mut state = three_fields();
        state.seeds = Ledger::from([("apple", 30)]);
        apply_plant_all(&mut state, &TransitionContext::new(catalog, 0, 0), "apple").unwrap();
        state
    }

    #[test]
    fn test_certain_fragment_drops_once_per_facility() {
        let catalog = catalog_with_fragment_chance(1.0);
        let grow = catalog.tuning.grow_time_ms;
        for seed in 0..16 {
            let mut state = planted_fields(&catalog);
            apply_harvest(&mut state, &mut TransitionContext::new(&catalog, 0, seed), "a").unwrap();
            assert_eq!(state.fragments.get(UNIDENTIFIED_FRAGMENT), 1);

            let mut ctx = TransitionContext::new(&catalog, grow, seed);
            apply_harvest_all(&mut state, &mut ctx).unwrap();
            assert_eq!(state.fragments.get(UNIDENTIFIED_FRAGMENT), 3);
        }
    }

    #[test]
    fn test_zero_fragment_chance_never_drops() {
        let catalog = catalog_with_fragment_chance(0.0);
        let grow = catalog.tuning.grow_time_ms;
        for seed in 0..16 {
            let mut state = planted_fields(&catalog);
            apply_harvest(&mut state, &mut TransitionContext::new(&catalog, 0, seed), "a").unwrap();
            apply_harvest_all(&mut state, &mut TransitionContext::new(&catalog, grow, seed)).unwrap();
            assert_eq!(state.products.get("apple"), 30);
            assert_eq!(state.fragments.get(UNIDENTIFIED_FRAGMENT), 0);
        }
    }

    #[test]
    fn test_sell_uses_stats_and_multiplier() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = three_fields();
        // base 200, two stat points -> unit 240; 100 skill points -> x1.1
        state.crop_data.get_mut("apple").unwrap().stats.taste = 2;
        state.products = Ledger::from([("apple", 10)]);
        state.skill_tree.sell_price = 100;
        let before = state.money;
        apply_sell(&mut state, &ctx, "apple", 10).unwrap();
        assert_eq!(state.money - before, 2_640);
        assert_eq!(state.products.get("apple"), 0);
    }

    #[test]
    fn test_research_spends_cost_even_when_capped() {
        let catalog = Catalog::standard();
        let mut state = three_fields();
        state.products = Ledger::from([("apple", 300)]);
        state.crop_data.get_mut("apple").unwrap().stats.taste = 5;
        let mut ctx = TransitionContext::new(&catalog, 0, 1);
        apply_research(&mut state, &mut ctx, "apple", Some(QualityStat::Taste)).unwrap();
        assert_eq!(state.products.get("apple"), 0);
        assert_eq!(state.crop_data["apple"].stats.taste, 5);
    }

    #[test]
    fn test_buy_facility_respects_per_name_cap() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = create_initial_state(&catalog);
        state.money = i64::MAX / 2;
        let cap = catalog.tuning.max_facilities_per_name;
        while state.facilities.iter().filter(|f| f.name == "Field").count() < cap {
            apply_buy_facility(&mut state, &ctx, "field").unwrap();
        }
        assert_eq!(
            apply_buy_facility(&mut state, &ctx, "field"),
            Err(Rejection::CapReached("facility per type"))
        );
        let mut ids: Vec<_> = state.facilities.iter().map(|f| f.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), state.facilities.len());
    }
}
