/// Farm engine — Centralized Transition Logic
///
/// The single reducer. Every action is applied to a clone of the input;
/// if the handler rejects, or the result breaks an invariant, the input
/// comes back untouched. The reducer never panics and never surfaces an
/// error: `TransitionResult` only explains what happened.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::actions::{Action, ActionEnvelope};
use crate::arithmetic::Millis;
use crate::catalog::Catalog;
use crate::domain::GameState;
use crate::invariants::try_validate_invariants;
use crate::outcome::{Rejection, TransitionResult};
use crate::{conquest, economy, farming, mining, progression, ruins, tournament};

/// Everything a handler may read besides the state itself.
pub struct TransitionContext<'a> {
    pub catalog: &'a Catalog,
    /// Caller-sampled clock for this action.
    pub now: Millis,
    /// Per-action stream; the same seed replays the same draws.
    pub rng: ChaCha8Rng,
}

impl<'a> TransitionContext<'a> {
    pub fn new(catalog: &'a Catalog, now: Millis, seed: u64) -> Self {
        Self {
            catalog,
            now,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Apply `envelope` to `state` and return `(new_state, result)`.
/// The input is never mutated; on rejection the returned state equals it.
pub fn apply_action(
    state: &GameState,
    catalog: &Catalog,
    envelope: &ActionEnvelope,
) -> (GameState, TransitionResult) {
    let action_type = envelope.action.action_type().to_string();
    let mut ctx = TransitionContext::new(catalog, envelope.now, envelope.seed);
    let mut new_state = state.clone();

    let outcome = dispatch(&mut new_state, &mut ctx, &envelope.action).and_then(|()| {
        try_validate_invariants(&new_state, catalog).map_err(|msg| {
            tracing::warn!(
                sequence = envelope.sequence,
                action = %action_type,
                violation = %msg,
                "transition broke an invariant; discarded"
            );
            Rejection::Invariant(msg)
        })
    });

    match outcome {
        Ok(()) => (new_state, TransitionResult::applied(&action_type)),
        Err(rejection) => {
            tracing::debug!(
                sequence = envelope.sequence,
                action = %action_type,
                reason = %rejection,
                "action rejected"
            );
            (state.clone(), TransitionResult::rejected(&action_type, rejection))
        }
    }
}

fn dispatch(
    state: &mut GameState,
    ctx: &mut TransitionContext,
    action: &Action,
) -> Result<(), Rejection> {
    match action {
        // ── farming ──
        Action::BuySeeds { crop_id, quantity } => {
            farming::apply_buy_seeds(state, crop_id, *quantity)
        }
        Action::BuyFacility { facility_type } => {
            farming::apply_buy_facility(state, ctx, facility_type)
        }
        Action::Plant {
            facility_id,
            crop_id,
        } => farming::apply_plant(state, ctx, facility_id, crop_id),
        Action::PlantAll { crop_id } => farming::apply_plant_all(state, ctx, crop_id),
        Action::Harvest { facility_id } => farming::apply_harvest(state, ctx, facility_id),
        Action::HarvestAll => farming::apply_harvest_all(state, ctx),
        Action::Sell { crop_id, quantity } => farming::apply_sell(state, ctx, crop_id, *quantity),
        Action::Research {
            crop_id,
            stat_to_upgrade,
        } => farming::apply_research(state, ctx, crop_id, *stat_to_upgrade),

        // ── fragments and ruins ──
        Action::ExchangeFragment { to_fragment } => {
            ruins::apply_exchange_fragment(state, ctx, to_fragment)
        }
        Action::AssembleRuin { ruin_type } => ruins::apply_assemble_ruin(state, ctx, ruin_type),
        Action::StartProfitCollection => ruins::apply_start_profit_collection(state, ctx),
        Action::ClaimProfit => ruins::apply_claim_profit(state, ctx),

        // ── companies and tenants ──
        Action::BuyTenant { name } => economy::apply_buy_tenant(state, ctx, name),
        Action::BuyCompany { type_id } => economy::apply_buy_company(state, ctx, type_id),
        Action::AssignCompanyToTenant {
            company_id,
            tenant_id,
        } => economy::apply_assign_company_to_tenant(state, ctx, company_id, tenant_id),
        Action::RemoveCompanyFromTenant { company_id } => {
            economy::apply_remove_company_from_tenant(state, company_id)
        }
        Action::ProduceProduct {
            company_id,
            product_id,
            quantity,
        } => economy::apply_produce_product(state, ctx, company_id, product_id, *quantity),
        Action::SellCompanyProduct {
            product_id,
            quantity,
        } => economy::apply_sell_company_product(state, ctx, product_id, *quantity),
        Action::AssignCitizens {
            target_id,
            target_type,
            amount,
        } => economy::apply_assign_citizens(state, ctx, target_id, *target_type, *amount),
        Action::WithdrawCitizens {
            target_id,
            target_type,
            amount,
        } => economy::apply_withdraw_citizens(state, target_id, *target_type, *amount),
        Action::StartTenantProfitCollection { tenant_id } => {
            economy::apply_start_tenant_profit(state, ctx, tenant_id)
        }
        Action::ClaimTenantProfit { tenant_id } => {
            economy::apply_claim_tenant_profit(state, ctx, tenant_id)
        }

        // ── mine and smithy ──
        Action::StartMining => mining::apply_start_mining(state, ctx),
        Action::CollectMinerals => mining::apply_collect_minerals(state, ctx),
        Action::SellMineral {
            mineral_id,
            quantity,
        } => mining::apply_sell_mineral(state, ctx, mineral_id, *quantity),
        Action::CraftWeapon { weapon_id } => mining::apply_craft_weapon(state, ctx, weapon_id),
        Action::SellWeapon {
            weapon_id,
            quantity,
        } => mining::apply_sell_weapon(state, ctx, weapon_id, *quantity),

        // ── countries ──
        Action::ConquerCountry { country_id } => conquest::apply_conquer(state, ctx, country_id),
        Action::StartCountryProduction { country_id } => {
            conquest::apply_start_production(state, ctx, country_id)
        }
        Action::CollectCountryProduction { country_id } => {
            conquest::apply_collect_production(state, ctx, country_id)
        }
        Action::UpgradeCountryRank { country_id, rank } => {
            conquest::apply_upgrade_rank(state, ctx, country_id, *rank)
        }
        Action::SellSpecialtyGood {
            specialty_good_id,
            quantity,
        } => conquest::apply_sell_specialty_good(state, ctx, specialty_good_id, *quantity),

        // ── progression ──
        Action::BuyNation { name } => progression::apply_buy_nation(state, ctx, name),
        Action::RerollNationAllAttributes { nation_id } => {
            progression::apply_reroll_nation(state, ctx, nation_id)
        }
        Action::FinalizeNation { nation_id } => {
            progression::apply_finalize_nation(state, nation_id)
        }
        Action::SetActiveNation { nation_id } => {
            progression::apply_set_active_nation(state, nation_id.as_deref())
        }
        Action::AllocateSkillPoints { new_skill_tree } => {
            progression::apply_allocate_skill_points(state, new_skill_tree)
        }
        Action::ResetSkillPoints => progression::apply_reset_skill_points(state, ctx),
        Action::StartRecruitment => progression::apply_start_recruitment(state, ctx),
        Action::ClaimCitizens => progression::apply_claim_citizens(state, ctx),
        Action::BuyRecruiterItem { item_type } => {
            progression::apply_buy_recruiter_item(state, ctx, *item_type)
        }

        // ── sports league ──
        Action::SetNbaTeamName { name } => tournament::apply_set_team_name(state, name),
        Action::HireNbaPlayer { player } => tournament::apply_hire(state, ctx, player),
        Action::FireNbaPlayer { player_id } => tournament::apply_fire(state, player_id),
        Action::SetConferenceStatus { status } => {
            tournament::apply_set_conference_status(state, ctx, *status)
        }
        Action::CreateNbaTournament { selected_players } => {
            tournament::apply_create(state, ctx, selected_players)
        }
        Action::SimulateNbaTournament => tournament::apply_simulate(state, ctx),
        Action::EndNbaTournament => tournament::apply_end(state, ctx),

        // ── misc ──
        Action::LoadGame { new_state } => apply_load_game(state, ctx, new_state),
        Action::CompleteTutorial => apply_complete_tutorial(state),
        Action::Unrecognized { action_type } => Err(Rejection::Unrecognized(action_type.clone())),
    }
}

// ---------------------------------------------------------------------------
// Whole-state handlers (private)
// ---------------------------------------------------------------------------

/// Replace the state wholesale. Absent fields were already defaulted on
/// deserialization; crop definitions missing from an older save are
/// filled from the catalog.
fn apply_load_game(
    state: &mut GameState,
    ctx: &TransitionContext,
    loaded: &GameState,
) -> Result<(), Rejection> {
    let mut next = loaded.clone();
    for (id, crop) in &ctx.catalog.crops {
        next.crop_data.entry(id.clone()).or_insert_with(|| crop.clone());
    }
    *state = next;
    tracing::info!(
        money = state.money,
        facilities = state.facilities.len(),
        "game loaded"
    );
    Ok(())
}

fn apply_complete_tutorial(state: &mut GameState) -> Result<(), Rejection> {
    if state.tutorial_completed {
        return Err(Rejection::NothingToDo);
    }
    state.tutorial_completed = true;
    Ok(())
}
