//! Drift detection — determinism verification and state comparison.
//!
//! All compared values are integers; the report never touches floats.

use std::collections::BTreeSet;

use thiserror::Error;

use farm_engine::actions::ActionEnvelope;
use farm_engine::catalog::Catalog;
use farm_engine::domain::{GameState, Ledger};
use farm_engine::engine::EngineError;

use crate::replay;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftError {
    #[error("determinism failure: run 1 {first}, run 2 {second}")]
    Nondeterministic { first: String, second: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Replay the same envelopes twice and require identical hashes.
/// Returns the agreed hash.
pub fn verify_determinism(
    catalog: &Catalog,
    envelopes: &[ActionEnvelope],
) -> Result<String, DriftError> {
    let first = replay::rebuild_hash(catalog, envelopes)?;
    let second = replay::rebuild_hash(catalog, envelopes)?;
    if first != second {
        return Err(DriftError::Nondeterministic { first, second });
    }
    Ok(first)
}

/// One ledger entry that differs between two states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDelta {
    pub ledger: &'static str,
    pub id: String,
    pub before: i64,
    pub after: i64,
    pub delta: i64,
}

/// Structured drift report; every numeric field is i64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub money_a: i64,
    pub money_b: i64,
    pub money_delta: i64,
    pub citizens_a: i64,
    pub citizens_b: i64,
    pub citizens_delta: i64,
    pub facility_count_delta: i64,
    pub company_count_delta: i64,
    pub tenant_count_delta: i64,
    pub ledgers: Vec<LedgerDelta>,
    pub added_facilities: Vec<String>,
    pub removed_facilities: Vec<String>,
    pub conquered_countries: Vec<String>,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.money_delta == 0
            && self.citizens_delta == 0
            && self.facility_count_delta == 0
            && self.company_count_delta == 0
            && self.tenant_count_delta == 0
            && self.ledgers.is_empty()
            && self.added_facilities.is_empty()
            && self.removed_facilities.is_empty()
            && self.conquered_countries.is_empty()
    }
}

fn ledgers(state: &GameState) -> [(&'static str, &Ledger); 8] {
    [
        ("products", &state.products),
        ("seeds", &state.seeds),
        ("fragments", &state.fragments),
        ("ruins", &state.ruins),
        ("companyProducts", &state.company_products),
        ("minerals", &state.minerals),
        ("weapons", &state.weapons),
        ("specialtyGoods", &state.specialty_goods),
    ]
}

fn diff_ledger(name: &'static str, a: &Ledger, b: &Ledger, out: &mut Vec<LedgerDelta>) {
    let ids: BTreeSet<&str> = a.iter().chain(b.iter()).map(|(id, _)| id).collect();
    for id in ids {
        let (before, after) = (a.get(id), b.get(id));
        if before != after {
            out.push(LedgerDelta {
                ledger: name,
                id: id.to_string(),
                before,
                after,
                delta: after - before,
            });
        }
    }
}

/// Compare two states: currency, population, counts, and every ledger.
pub fn compare_states(state_a: &GameState, state_b: &GameState) -> DriftReport {
    let mut ledger_deltas = Vec::new();
    for ((name, a), (_, b)) in ledgers(state_a).into_iter().zip(ledgers(state_b)) {
        diff_ledger(name, a, b, &mut ledger_deltas);
    }

    let ids = |s: &GameState| -> BTreeSet<String> {
        s.facilities.iter().map(|f| f.id.clone()).collect()
    };
    let (fac_a, fac_b) = (ids(state_a), ids(state_b));

    let count = |n: usize| n as i64;

    DriftReport {
        money_a: state_a.money,
        money_b: state_b.money,
        money_delta: state_b.money - state_a.money,
        citizens_a: state_a.citizens,
        citizens_b: state_b.citizens,
        citizens_delta: state_b.citizens - state_a.citizens,
        facility_count_delta: count(state_b.facilities.len()) - count(state_a.facilities.len()),
        company_count_delta: count(state_b.companies.len()) - count(state_a.companies.len()),
        tenant_count_delta: count(state_b.tenants.len()) - count(state_a.tenants.len()),
        ledgers: ledger_deltas,
        added_facilities: fac_b.difference(&fac_a).cloned().collect(),
        removed_facilities: fac_a.difference(&fac_b).cloned().collect(),
        conquered_countries: state_b
            .countries
            .keys()
            .filter(|id| !state_a.countries.contains_key(*id))
            .cloned()
            .collect(),
    }
}
