/// Farm engine — Invariant Checks
///
/// Run after every accepted transition and on every loaded document.
/// Returns the first violation as a message; the reducer turns it into
/// a rejection and keeps the previous state.

use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::domain::{ConferenceStatus, GameState, Ledger};
use crate::progression::total_skill_points_earned;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn try_validate_invariants(state: &GameState, catalog: &Catalog) -> Result<(), String> {
    check_balances(state)?;
    check_ledgers(state)?;
    check_facilities(state)?;
    check_companies_and_tenants(state, catalog)?;
    check_countries(state, catalog)?;
    check_nations(state)?;
    check_crops(state, catalog)?;
    check_skills(state)?;
    check_league(state, catalog)?;
    Ok(())
}

fn violation(tag: &str, detail: String) -> Result<(), String> {
    Err(format!("[INVARIANT:{}] {}", tag, detail))
}

fn unique<'a>(tag: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return violation(tag, format!("duplicate id {:?}", id));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

fn check_balances(state: &GameState) -> Result<(), String> {
    if state.money < 0 {
        return violation("money", format!("negative balance {}", state.money));
    }
    if state.citizens < 0 {
        return violation("citizens", format!("negative pool {}", state.citizens));
    }
    Ok(())
}

fn check_ledgers(state: &GameState) -> Result<(), String> {
    let ledgers: [(&str, &Ledger); 8] = [
        ("products", &state.products),
        ("seeds", &state.seeds),
        ("fragments", &state.fragments),
        ("ruins", &state.ruins),
        ("company_products", &state.company_products),
        ("minerals", &state.minerals),
        ("weapons", &state.weapons),
        ("specialty_goods", &state.specialty_goods),
    ];
    for (name, ledger) in ledgers {
        if let Some((id, amount)) = ledger.iter().find(|(_, v)| *v < 0) {
            return violation("ledger", format!("{}[{:?}] = {}", name, id, amount));
        }
        if ledger.total().is_none() {
            return violation("ledger", format!("{} total overflows", name));
        }
    }
    Ok(())
}

fn check_facilities(state: &GameState) -> Result<(), String> {
    unique("facility_ids", state.facilities.iter().map(|f| f.id.as_str()))?;
    for f in &state.facilities {
        if f.capacity <= 0 {
            return violation("facility", format!("{:?} has capacity {}", f.id, f.capacity));
        }
        if let Some(p) = &f.planted_crop {
            if p.quantity <= 0 || p.quantity > f.capacity {
                return violation(
                    "facility",
                    format!("{:?} holds {} of capacity {}", f.id, p.quantity, f.capacity),
                );
            }
        }
    }
    Ok(())
}

fn check_companies_and_tenants(state: &GameState, catalog: &Catalog) -> Result<(), String> {
    let tuning = &catalog.tuning;
    unique("company_ids", state.companies.iter().map(|c| c.id.as_str()))?;
    unique("tenant_ids", state.tenants.iter().map(|t| t.id.as_str()))?;

    for c in &state.companies {
        if c.assigned_citizens < 0 || c.assigned_citizens > tuning.max_citizens_per_company {
            return violation(
                "company",
                format!("{:?} has {} citizens", c.id, c.assigned_citizens),
            );
        }
        if c.production_record < 0 {
            return violation("company", format!("{:?} has a negative record", c.id));
        }
        if let Some(tid) = &c.tenant_id {
            if state.tenant(tid).is_none() {
                return violation("company", format!("{:?} points at missing tenant {:?}", c.id, tid));
            }
        }
    }
    for t in &state.tenants {
        if t.assigned_citizens < 0 {
            return violation("tenant", format!("{:?} has negative citizens", t.id));
        }
        let held = state.companies_of_tenant(&t.id).count();
        if held > tuning.tenant_company_capacity {
            return violation("tenant", format!("{:?} holds {} companies", t.id, held));
        }
    }
    for tid in state.tenant_profit_state.keys() {
        if state.tenant(tid).is_none() {
            return violation("tenant_profit", format!("timer for missing tenant {:?}", tid));
        }
    }
    Ok(())
}

fn check_countries(state: &GameState, catalog: &Catalog) -> Result<(), String> {
    let max = catalog.tuning.max_rank;
    for (id, c) in &state.countries {
        if catalog.country(id).is_none() {
            return violation("country", format!("unknown country {:?}", id));
        }
        for level in [c.military_level, c.economic_level, c.political_level] {
            if level < 1 || level > max {
                return violation("country", format!("{:?} has rank {}", id, level));
            }
        }
        if c.bonds < 0 {
            return violation("country", format!("{:?} has negative bonds", id));
        }
    }
    Ok(())
}

fn check_nations(state: &GameState) -> Result<(), String> {
    unique("nation_ids", state.nations.iter().map(|n| n.id.as_str()))?;
    if let Some(active) = &state.active_nation_id {
        match state.nation(active) {
            None => return violation("active_nation", format!("missing nation {:?}", active)),
            Some(n) if !n.is_finalized => {
                return violation("active_nation", format!("{:?} is not finalized", active))
            }
            Some(_) => {}
        }
    }
    for n in &state.nations {
        if n.is_finalized && !n.attributes.is_complete() {
            return violation("nation", format!("{:?} finalized with empty traits", n.id));
        }
    }
    let r = &state.recruiter_state;
    if r.citizen_increase_items < 0 || r.time_reduction_items < 0 {
        return violation("recruiter", "negative item count".to_string());
    }
    Ok(())
}

fn check_crops(state: &GameState, catalog: &Catalog) -> Result<(), String> {
    let max = catalog.tuning.max_crop_stat;
    for (id, crop) in &state.crop_data {
        if crop.stats.max() > max {
            return violation("crop_stats", format!("{:?} has a stat above {}", id, max));
        }
    }
    Ok(())
}

fn check_skills(state: &GameState) -> Result<(), String> {
    let allocated = state.skill_tree.total();
    let earned = total_skill_points_earned(state);
    if allocated > earned {
        return violation(
            "skill_points",
            format!("{} allocated of {} earned", allocated, earned),
        );
    }
    Ok(())
}

fn check_league(state: &GameState, catalog: &Catalog) -> Result<(), String> {
    let nba = &state.nba_state;
    unique("player_ids", nba.roster.iter().map(|p| p.id.as_str()))?;
    if nba.roster.len() > catalog.tuning.nba_roster_limit {
        return violation("roster", format!("{} players", nba.roster.len()));
    }

    let conf = &nba.conference;
    let needs_tournament = matches!(
        conf.status,
        ConferenceStatus::Active | ConferenceStatus::Finished
    );
    if needs_tournament && conf.tournament.is_none() {
        return violation("conference", format!("{:?} without a tournament", conf.status));
    }
    if conf.status == ConferenceStatus::Finished && conf.final_rank.is_none() {
        return violation("conference", "finished without a placement".to_string());
    }
    if let Some(t) = &conf.tournament {
        let first = t.bracket.first().map_or(0, |r| r.len());
        if !first.is_power_of_two() {
            return violation("bracket", format!("{} entrants", first));
        }
        let mut width = first;
        for level in &t.bracket[1..] {
            width /= 2;
            if level.len() != width {
                return violation("bracket", "round sizes do not halve".to_string());
            }
        }
        if width != 1 {
            return violation("bracket", "bracket does not end in a single slot".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Company, ConqueredCountry};
    use crate::state::create_initial_state;

    #[test]
    fn test_initial_state_is_valid() {
        let catalog = Catalog::standard();
        try_validate_invariants(&create_initial_state(&catalog), &catalog).unwrap();
    }

    #[test]
    fn test_negative_ledger_detected() {
        let catalog = Catalog::standard();
        let mut state = create_initial_state(&catalog);
        state.minerals = Ledger::from([("iron", -1)]);
        let err = try_validate_invariants(&state, &catalog).unwrap_err();
        assert!(err.contains("minerals"), "{}", err);
    }

    #[test]
    fn test_dangling_tenant_detected() {
        let catalog = Catalog::standard();
        let mut state = create_initial_state(&catalog);
        state.companies.push(Company {
            id: "gemini_foods_1".to_string(),
            type_id: "gemini_foods".to_string(),
            name: "Gemini Foods".to_string(),
            production_record: 0,
            assigned_citizens: 0,
            tenant_id: Some("tenant_9".to_string()),
        });
        assert!(try_validate_invariants(&state, &catalog).is_err());
    }

    #[test]
    fn test_rank_out_of_range_detected() {
        let catalog = Catalog::standard();
        let mut state = create_initial_state(&catalog);
        let mut country = ConqueredCountry::freshly_conquered();
        country.economic_level = 11;
        state.countries.insert("usa".to_string(), country);
        assert!(try_validate_invariants(&state, &catalog).is_err());
    }

    #[test]
    fn test_overallocated_skills_detected() {
        let catalog = Catalog::standard();
        let mut state = create_initial_state(&catalog);
        state.skill_tree.crop_time = 1;
        let err = try_validate_invariants(&state, &catalog).unwrap_err();
        assert!(err.starts_with("[INVARIANT:skill_points]"));
    }
}
