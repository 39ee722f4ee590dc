/// Farm engine — Readiness
///
/// Pure read-side view of every production cycle at a given instant.
/// Nothing here is stored; a clock tick only recomputes this view.

use std::collections::BTreeMap;

use crate::arithmetic::Millis;
use crate::bonus;
use crate::catalog::Catalog;
use crate::domain::GameState;
use crate::timer::{keyed, Cycle, DurationRule, Phase, TimedProduction};

#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    /// Planted facilities only, keyed by facility id.
    pub crops: BTreeMap<String, Phase>,
    pub mining: Phase,
    pub ruin_profit: Phase,
    pub tenants: BTreeMap<String, Phase>,
    pub countries: BTreeMap<String, Phase>,
    pub recruitment: Phase,
}

impl Readiness {
    pub fn at(state: &GameState, catalog: &Catalog, now: Millis) -> Self {
        let bundle = bonus::resolve_for_state(state, catalog);
        let rule = |cycle| {
            DurationRule::for_cycle(cycle, &bundle, &state.recruiter_state, &catalog.tuning)
        };

        let grow = rule(Cycle::CropGrowth);
        let crops = state
            .facilities
            .iter()
            .filter_map(|f| {
                let planted = f.planted_crop.as_ref()?;
                let timer = TimedProduction {
                    start_time: Some(planted.planted_at),
                };
                Some((f.id.clone(), timer.phase(now, &grow)))
            })
            .collect();

        let tenant_rule = rule(Cycle::TenantProfit);
        let tenants = state
            .tenants
            .iter()
            .map(|t| {
                let timer = keyed(&state.tenant_profit_state, &t.id);
                (t.id.clone(), timer.phase(now, &tenant_rule))
            })
            .collect();

        let country_rule = rule(Cycle::CountryProduction);
        let countries = state
            .countries
            .iter()
            .map(|(id, c)| (id.clone(), c.production_state.phase(now, &country_rule)))
            .collect();

        Self {
            crops,
            mining: state.mine_state.phase(now, &rule(Cycle::Mining)),
            ruin_profit: state.ruin_profit_state.phase(now, &rule(Cycle::RuinProfit)),
            tenants,
            countries,
            recruitment: state
                .recruiter_state
                .cycle
                .phase(now, &rule(Cycle::Recruitment)),
        }
    }

    /// Facilities a harvest-all would take right now.
    pub fn ready_crops(&self) -> impl Iterator<Item = &str> {
        self.crops
            .iter()
            .filter(|(_, p)| **p == Phase::Ready)
            .map(|(id, _)| id.as_str())
    }

    pub fn anything_ready(&self) -> bool {
        let ready = |p: &Phase| *p == Phase::Ready;
        self.crops.values().any(ready)
            || ready(&self.mining)
            || ready(&self.ruin_profit)
            || self.tenants.values().any(ready)
            || self.countries.values().any(ready)
            || ready(&self.recruitment)
    }
}
