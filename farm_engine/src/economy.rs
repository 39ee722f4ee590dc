/// Farm engine — Companies and Tenants
///
/// Companies turn harvested crops into products and carry a market
/// value; tenants hold up to a fixed number of companies and pay out a
/// share of their combined value on a timed cycle.
///
/// Market value is never stored:
///
///   marketValue = baseMarketValue
///               + productionRecord * productionRecordMultiplier
///               + assignedCitizens * citizenValueMultiplier
///
/// so it holds after every mutation by construction.

use crate::arithmetic::{checked_add, checked_mul, floor_scaled, fresh_id};
use crate::bonus;
use crate::catalog::Catalog;
use crate::domain::{CitizenTarget, Company, GameState, Tenant};
use crate::outcome::Rejection;
use crate::timer::{Cycle, DurationRule};
use crate::transitions::TransitionContext;

// ── Read-side ──────────────────────────────────────────────────────

/// Derived valuation of one company. Unknown types value at the
/// record and citizen terms only.
pub fn market_value(company: &Company, catalog: &Catalog) -> i64 {
    let tuning = &catalog.tuning;
    let base = catalog
        .companies
        .get(&company.type_id)
        .map_or(0, |t| t.base_market_value);
    base.saturating_add(
        company
            .production_record
            .saturating_mul(tuning.production_record_multiplier),
    )
    .saturating_add(
        company
            .assigned_citizens
            .saturating_mul(tuning.citizen_value_multiplier),
    )
}

/// What one tenant cycle pays if claimed with the current assignments.
pub fn tenant_earnings(state: &GameState, tenant: &Tenant, catalog: &Catalog) -> i64 {
    let tuning = &catalog.tuning;
    let combined = state
        .companies_of_tenant(&tenant.id)
        .map(|c| market_value(c, catalog))
        .fold(0i64, i64::saturating_add);
    floor_scaled(combined, tuning.tenant_market_value_rate)
        .saturating_add(tenant.assigned_citizens.saturating_mul(tuning.tenant_citizen_bonus))
}

fn positive(amount: i64) -> Result<(), Rejection> {
    if amount <= 0 {
        return Err(Rejection::Invalid(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}

// ── Purchases ──────────────────────────────────────────────────────

pub(crate) fn apply_buy_tenant(
    state: &mut GameState,
    ctx: &TransitionContext,
    name: &str,
) -> Result<(), Rejection> {
    if name.trim().is_empty() {
        return Err(Rejection::Invalid("tenant name is empty".to_string()));
    }
    state.spend(ctx.catalog.tuning.tenant_cost)?;
    let id = fresh_id("tenant", |candidate| state.tenant(candidate).is_some());
    state.tenant_profit_state.insert(id.clone(), Default::default());
    state.tenants.push(Tenant {
        id,
        name: name.to_string(),
        assigned_citizens: 0,
    });
    Ok(())
}

pub(crate) fn apply_buy_company(
    state: &mut GameState,
    ctx: &TransitionContext,
    type_id: &str,
) -> Result<(), Rejection> {
    let company_type = ctx
        .catalog
        .companies
        .get(type_id)
        .ok_or_else(|| Rejection::not_found("company type", type_id))?;
    let owned = state.companies.iter().filter(|c| c.type_id == type_id).count();
    if owned >= ctx.catalog.tuning.max_companies_per_type {
        return Err(Rejection::CapReached("company per type"));
    }
    state.spend(ctx.catalog.tuning.company_cost)?;
    let id = fresh_id(type_id, |candidate| state.company(candidate).is_some());
    state.companies.push(Company {
        id,
        type_id: type_id.to_string(),
        name: company_type.name.clone(),
        production_record: 0,
        assigned_citizens: 0,
        tenant_id: None,
    });
    Ok(())
}

// ── Tenancy ────────────────────────────────────────────────────────

pub(crate) fn apply_assign_company_to_tenant(
    state: &mut GameState,
    ctx: &TransitionContext,
    company_id: &str,
    tenant_id: &str,
) -> Result<(), Rejection> {
    if state.tenant(tenant_id).is_none() {
        return Err(Rejection::not_found("tenant", tenant_id));
    }
    let current = state
        .company(company_id)
        .ok_or_else(|| Rejection::not_found("company", company_id))?
        .tenant_id
        .clone();
    if current.as_deref() == Some(tenant_id) {
        return Err(Rejection::NothingToDo);
    }
    if state.companies_of_tenant(tenant_id).count() >= ctx.catalog.tuning.tenant_company_capacity {
        return Err(Rejection::CapReached("tenant company"));
    }
    state.company_mut(company_id)?.tenant_id = Some(tenant_id.to_string());
    Ok(())
}

pub(crate) fn apply_remove_company_from_tenant(
    state: &mut GameState,
    company_id: &str,
) -> Result<(), Rejection> {
    let company = state.company_mut(company_id)?;
    if company.tenant_id.take().is_none() {
        return Err(Rejection::NothingToDo);
    }
    Ok(())
}

// ── Production ─────────────────────────────────────────────────────

pub(crate) fn apply_produce_product(
    state: &mut GameState,
    ctx: &TransitionContext,
    company_id: &str,
    product_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    positive(quantity)?;
    let recipe = ctx
        .catalog
        .products
        .get(product_id)
        .ok_or_else(|| Rejection::not_found("product", product_id))?;
    let type_id = state
        .company(company_id)
        .ok_or_else(|| Rejection::not_found("company", company_id))?
        .type_id
        .clone();
    let makes_it = ctx
        .catalog
        .companies
        .get(&type_id)
        .map_or(false, |t| t.products.iter().any(|p| p == product_id));
    if !makes_it {
        return Err(Rejection::Invalid(format!(
            "{} does not produce {}",
            type_id, product_id
        )));
    }

    // Check every ingredient before touching any ledger.
    let mut needs = Vec::with_capacity(recipe.recipe.len());
    for (crop_id, per_unit) in &recipe.recipe {
        let needed = checked_mul(*per_unit, quantity).ok_or(Rejection::Overflow)?;
        let have = state.products.get(crop_id);
        if have < needed {
            return Err(Rejection::insufficient(crop_id.as_str(), needed, have));
        }
        needs.push((crop_id.as_str(), needed));
    }
    for (crop_id, needed) in needs {
        state.products.debit(crop_id, needed)?;
    }
    state.company_products.credit(product_id, quantity)?;

    let company = state.company_mut(company_id)?;
    company.production_record = company.production_record.max(quantity);
    Ok(())
}

pub(crate) fn apply_sell_company_product(
    state: &mut GameState,
    ctx: &TransitionContext,
    product_id: &str,
    quantity: i64,
) -> Result<(), Rejection> {
    positive(quantity)?;
    let price = ctx
        .catalog
        .products
        .get(product_id)
        .ok_or_else(|| Rejection::not_found("product", product_id))?
        .sell_price;
    let multiplier = bonus::resolve_for_state(state, ctx.catalog).sell_price_multiplier;
    let gross = checked_mul(price, quantity).ok_or(Rejection::Overflow)?;
    state.company_products.debit(product_id, quantity)?;
    state.earn(floor_scaled(gross, multiplier))
}

// ── Citizens ───────────────────────────────────────────────────────

pub(crate) fn apply_assign_citizens(
    state: &mut GameState,
    ctx: &TransitionContext,
    target_id: &str,
    target: CitizenTarget,
    amount: i64,
) -> Result<(), Rejection> {
    positive(amount)?;
    if state.citizens < amount {
        return Err(Rejection::insufficient("citizens", amount, state.citizens));
    }
    match target {
        CitizenTarget::Company => {
            let cap = ctx.catalog.tuning.max_citizens_per_company;
            let company = state.company_mut(target_id)?;
            let next = checked_add(company.assigned_citizens, amount).ok_or(Rejection::Overflow)?;
            if next > cap {
                return Err(Rejection::CapReached("citizens per company"));
            }
            company.assigned_citizens = next;
        }
        CitizenTarget::Tenant => {
            let tenant = state.tenant_mut(target_id)?;
            tenant.assigned_citizens =
                checked_add(tenant.assigned_citizens, amount).ok_or(Rejection::Overflow)?;
        }
    }
    state.spend_citizens(amount)
}

/// Returns `min(assigned, amount)` to the pool.
pub(crate) fn apply_withdraw_citizens(
    state: &mut GameState,
    target_id: &str,
    target: CitizenTarget,
    amount: i64,
) -> Result<(), Rejection> {
    positive(amount)?;
    let slot = match target {
        CitizenTarget::Company => &mut state.company_mut(target_id)?.assigned_citizens,
        CitizenTarget::Tenant => &mut state.tenant_mut(target_id)?.assigned_citizens,
    };
    let returned = (*slot).min(amount);
    if returned == 0 {
        return Err(Rejection::NothingToDo);
    }
    *slot -= returned;
    state.gain_citizens(returned)
}

// ── Tenant profit cycle ────────────────────────────────────────────

pub(crate) fn apply_start_tenant_profit(
    state: &mut GameState,
    ctx: &TransitionContext,
    tenant_id: &str,
) -> Result<(), Rejection> {
    if state.tenant(tenant_id).is_none() {
        return Err(Rejection::not_found("tenant", tenant_id));
    }
    state
        .tenant_profit_state
        .entry(tenant_id.to_string())
        .or_default()
        .start(ctx.now)
}

pub(crate) fn apply_claim_tenant_profit(
    state: &mut GameState,
    ctx: &TransitionContext,
    tenant_id: &str,
) -> Result<(), Rejection> {
    let tenant = state
        .tenant(tenant_id)
        .ok_or_else(|| Rejection::not_found("tenant", tenant_id))?;
    let bundle = bonus::resolve_for_state(state, ctx.catalog);
    let rule = DurationRule::for_cycle(
        Cycle::TenantProfit,
        &bundle,
        &state.recruiter_state,
        &ctx.catalog.tuning,
    );
    let mut timer = crate::timer::keyed(&state.tenant_profit_state, tenant_id);
    let earnings = timer.collect(ctx.now, &rule, || {
        Ok(tenant_earnings(state, tenant, ctx.catalog))
    })?;
    state.tenant_profit_state.insert(tenant_id.to_string(), timer);
    state.earn(earnings)
}
