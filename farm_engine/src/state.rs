/// Farm engine — Initial State
///
/// A new game: starting balances, one empty facility per starting
/// template, starter seeds and weapons, and a private copy of every
/// crop definition so research can upgrade it in place.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::domain::{
    Facility, GameState, Ledger, NbaState, RecruiterState, SkillTree,
};
use crate::timer::TimedProduction;

pub fn create_initial_state(catalog: &Catalog) -> GameState {
    let kit = &catalog.starting;

    let mut facilities = Vec::with_capacity(kit.facilities.len());
    for key in &kit.facilities {
        if let Some(template) = catalog.facilities.get(key) {
            facilities.push(Facility {
                id: format!("{}_{}", key, facilities.len() + 1),
                name: template.name.clone(),
                category: template.category,
                capacity: template.capacity,
                planted_crop: None,
            });
        }
    }

    GameState {
        money: kit.money,
        facilities,
        products: Ledger::new(),
        seeds: Ledger::from(kit.seeds.clone()),
        crop_data: catalog.crops.clone(),
        fragments: Ledger::new(),
        ruins: Ledger::new(),
        ruin_profit_state: TimedProduction::idle(),
        citizens: kit.citizens,
        tenants: Vec::new(),
        companies: Vec::new(),
        company_products: Ledger::new(),
        tenant_profit_state: BTreeMap::new(),
        minerals: Ledger::new(),
        weapons: Ledger::from(kit.weapons.clone()),
        mine_state: TimedProduction::idle(),
        countries: BTreeMap::new(),
        specialty_goods: Ledger::new(),
        nations: Vec::new(),
        active_nation_id: None,
        skill_tree: SkillTree::default(),
        recruiter_state: RecruiterState::default(),
        nba_state: NbaState::default(),
        tutorial_completed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FacilityCategory;

    #[test]
    fn test_initial_state_matches_starting_kit() {
        let catalog = Catalog::standard();
        let state = create_initial_state(&catalog);
        assert_eq!(state.money, 1_000_000);
        assert_eq!(state.citizens, 10);
        assert_eq!(state.seeds.get("apple"), 10);
        assert_eq!(state.weapons.get("musket"), 1);
        let categories: Vec<_> = state.facilities.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![FacilityCategory::Field, FacilityCategory::Sea, FacilityCategory::Ranch]
        );
        assert!(state.facilities.iter().all(|f| f.planted_crop.is_none()));
        assert!(!state.tutorial_completed);
    }

    #[test]
    fn test_facility_ids_are_unique() {
        let state = create_initial_state(&Catalog::standard());
        let mut ids: Vec<_> = state.facilities.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), state.facilities.len());
    }
}
