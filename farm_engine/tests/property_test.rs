//! Property tests over random action sequences and random timings.
//!
//! Run with more cases: PROPTEST_CASES=2000 cargo test --test property_test

use proptest::prelude::*;

use farm_engine::actions::Action;
use farm_engine::bonus;
use farm_engine::catalog::Catalog;
use farm_engine::domain::{
    CitizenTarget, ConferenceStatus, GameState, Ledger, NbaPlayer, PlayerPosition, PlayerStats,
    RecruiterState, SkillTree,
};
use farm_engine::engine::FarmEngine;
use farm_engine::invariants::try_validate_invariants;
use farm_engine::state::create_initial_state;
use farm_engine::timer::{Cycle, DurationRule, Phase, TimedProduction};
use farm_engine::tournament::build_bracket;

fn pick(options: &'static [&'static str]) -> impl Strategy<Value = String> {
    prop::sample::select(options).prop_map(str::to_string)
}

const CROPS: &[&str] = &["apple", "potato", "tuna", "chicken_breast", "unknown"];
const FACILITIES: &[&str] = &["field_1", "ship_2", "ranch_3", "field_4", "missing"];
const FACILITY_TYPES: &[&str] = &["field", "ship", "ranch", "castle"];
const MINERALS: &[&str] = &["iron", "copper", "diamond", "mithril"];
const WEAPONS: &[&str] = &["musket", "charlemagnes_sword"];
const COUNTRIES: &[&str] = &["usa", "canada", "russia", "atlantis"];
const COMPANY_TYPES: &[&str] = &["tokiwa_table", "gemini_foods"];
const COMPANIES: &[&str] = &["tokiwa_table_1", "gemini_foods_1", "nobody_1"];

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (pick(CROPS), -5i64..200).prop_map(|(crop_id, quantity)| Action::BuySeeds { crop_id, quantity }),
        pick(FACILITY_TYPES).prop_map(|facility_type| Action::BuyFacility { facility_type }),
        (pick(FACILITIES), pick(CROPS))
            .prop_map(|(facility_id, crop_id)| Action::Plant { facility_id, crop_id }),
        pick(CROPS).prop_map(|crop_id| Action::PlantAll { crop_id }),
        pick(FACILITIES).prop_map(|facility_id| Action::Harvest { facility_id }),
        Just(Action::HarvestAll),
        (pick(CROPS), -5i64..50).prop_map(|(crop_id, quantity)| Action::Sell { crop_id, quantity }),
        pick(CROPS).prop_map(|crop_id| Action::Research {
            crop_id,
            stat_to_upgrade: None
        }),
        Just(Action::StartMining),
        Just(Action::CollectMinerals),
        (pick(MINERALS), 0i64..10)
            .prop_map(|(mineral_id, quantity)| Action::SellMineral { mineral_id, quantity }),
        pick(WEAPONS).prop_map(|weapon_id| Action::CraftWeapon { weapon_id }),
        pick(COUNTRIES).prop_map(|country_id| Action::ConquerCountry { country_id }),
        pick(COUNTRIES).prop_map(|country_id| Action::StartCountryProduction { country_id }),
        pick(COUNTRIES).prop_map(|country_id| Action::CollectCountryProduction { country_id }),
        pick(COMPANY_TYPES).prop_map(|type_id| Action::BuyCompany { type_id }),
        (pick(COMPANIES), -10i64..4000).prop_map(|(target_id, amount)| Action::AssignCitizens {
            target_id,
            target_type: CitizenTarget::Company,
            amount
        }),
        (pick(COMPANIES), -10i64..4000).prop_map(|(target_id, amount)| Action::WithdrawCitizens {
            target_id,
            target_type: CitizenTarget::Company,
            amount
        }),
        Just(Action::StartProfitCollection),
        Just(Action::ClaimProfit),
        Just(Action::ResetSkillPoints),
        Just(Action::CompleteTutorial),
    ]
}

fn rich_state(catalog: &Catalog) -> GameState {
    let mut state = create_initial_state(catalog);
    state.money = 50_000_000;
    state.citizens = 5_000;
    state.seeds = Ledger::from([("apple", 500), ("tuna", 50)]);
    state.weapons = Ledger::from([("musket", 20)]);
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A rejected action returns a state deep-equal to its input, and
    /// every accepted one leaves all invariants intact.
    #[test]
    fn random_sequences_keep_invariants(
        steps in prop::collection::vec((action_strategy(), 0i64..7_200_000), 1..40),
        master_seed in any::<u64>(),
    ) {
        let catalog = Catalog::standard();
        let state = rich_state(&catalog);
        let mut engine = FarmEngine::with_state(catalog, state, master_seed);
        let mut now = 0i64;

        for (action, advance) in steps {
            now += advance;
            let before = engine.state().clone();
            let (_, result) = engine.dispatch(action, now);
            if !result.applied {
                prop_assert_eq!(engine.state(), &before, "rejected {} mutated state", result.action_type);
            }
            let state = engine.state();
            prop_assert!(state.money >= 0);
            prop_assert!(state.citizens >= 0);
            prop_assert!(state.seeds.iter().all(|(_, v)| v >= 0));
            prop_assert!(try_validate_invariants(state, engine.catalog()).is_ok());
        }
    }

    /// Remaining time on a running cycle falls exactly as fast as the
    /// clock advances while bonuses stay put.
    #[test]
    fn running_timer_counts_down_with_the_clock(
        start in 0i64..1_000_000_000,
        dt1 in 0i64..3_600_000,
        dt2 in 0i64..3_600_000,
        crop_time in 0u32..3_000,
    ) {
        let catalog = Catalog::standard();
        let skills = SkillTree { crop_time, ..SkillTree::default() };
        let bundle = bonus::resolve(None, &skills, &catalog);
        let recruiter = RecruiterState::default();
        let rule = DurationRule::for_cycle(Cycle::CropGrowth, &bundle, &recruiter, &catalog.tuning);
        let timer = TimedProduction { start_time: Some(start) };

        let (t1, t2) = (start + dt1.min(dt2), start + dt1.max(dt2));
        match (timer.phase(t1, &rule), timer.phase(t2, &rule)) {
            (Phase::Running { remaining: r1 }, Phase::Running { remaining: r2 }) => {
                prop_assert_eq!(r1 - r2, t2 - t1);
            }
            (Phase::Ready, later) => prop_assert_eq!(later, Phase::Ready),
            (Phase::Running { .. }, Phase::Ready) => {}
            (a, b) => prop_assert!(false, "unexpected phases {:?} then {:?}", a, b),
        }
        prop_assert_eq!(rule.effective(), DurationRule::for_cycle(
            Cycle::CropGrowth, &bundle, &recruiter, &catalog.tuning).effective());
    }

    /// Empty brackets have log2(N) + 1 levels that halve down to one slot.
    #[test]
    fn bracket_levels_halve(k in 1u32..7) {
        let n = 1usize << k;
        let teams: Vec<String> = (0..n).map(|i| format!("team{}", i)).collect();
        let bracket = build_bracket(teams);
        prop_assert_eq!(bracket.len(), k as usize + 1);
        for (level, slots) in bracket.iter().enumerate() {
            prop_assert_eq!(slots.len(), n >> level);
        }
        prop_assert_eq!(bracket[k as usize].len(), 1);
    }

    /// A full conference on any power-of-two field crowns exactly one
    /// team and records N - 1 matches.
    #[test]
    fn simulated_bracket_has_one_champion(k in 1u32..5, master_seed in any::<u64>()) {
        let mut catalog = Catalog::standard();
        let n = 1usize << k;
        catalog.opponents.truncate(n - 1);
        let mut state = create_initial_state(&catalog);
        state.money = 1_000_000_000;
        let mut engine = FarmEngine::with_state(catalog, state, master_seed);

        let positions = [
            PlayerPosition::Center,
            PlayerPosition::PointGuard,
            PlayerPosition::ShootingGuard,
            PlayerPosition::Forward,
            PlayerPosition::Forward,
        ];
        let ids: Vec<String> = (0..5).map(|i| format!("p{}", i)).collect();
        engine.dispatch(Action::SetNbaTeamName { name: "Growers".to_string() }, 0);
        for (id, position) in ids.iter().zip(positions) {
            let player = NbaPlayer {
                id: id.clone(),
                name: id.clone(),
                position,
                stats: PlayerStats { shooting: 3, dunking: 3, dribbling: 3 },
            };
            engine.dispatch(Action::HireNbaPlayer { player }, 0);
        }
        engine.dispatch(Action::SetConferenceStatus { status: ConferenceStatus::Selecting }, 0);
        let (_, created) = engine.dispatch(Action::CreateNbaTournament { selected_players: ids }, 0);
        prop_assert!(created.applied);
        let (_, simulated) = engine.dispatch(Action::SimulateNbaTournament, 0);
        prop_assert!(simulated.applied);

        let conference = &engine.state().nba_state.conference;
        let tournament = conference.tournament.as_ref().unwrap();
        prop_assert_eq!(tournament.results.len(), n - 1);
        prop_assert_eq!(tournament.bracket.len(), k as usize + 1);
        prop_assert!(tournament.bracket.last().unwrap()[0].is_some());
        let rank = conference.final_rank.unwrap();
        prop_assert!(rank.is_power_of_two() && rank as usize <= n);
    }
}
