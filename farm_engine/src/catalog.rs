/// Farm engine — Static Catalogs
///
/// Immutable configuration tables the engine reads but never owns:
/// crops, facility templates, recipes, company types, countries in
/// unlock order, nation trait options, the opponent pool, prizes, and
/// every numeric tuning constant.
///
/// `Catalog::standard()` is the built-in table set. A JSON file with the
/// same shape can replace it; `tuning` may be partial.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arithmetic::Millis;
use crate::domain::{CropDefinition, FacilityCategory, TraitCategory};

const STANDARD_CATALOG: &str = include_str!("../data/standard_catalog.json");

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog io: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog invalid: {0}")]
    Invalid(String),
}

// ── Tables ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityTemplate {
    pub name: String,
    pub category: FacilityCategory,
    pub capacity: i64,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecipe {
    pub id: String,
    pub name: String,
    pub sell_price: i64,
    pub recipe: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyType {
    pub id: String,
    pub name: String,
    pub base_market_value: i64,
    pub products: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mineral {
    pub id: String,
    pub name: String,
    pub sell_price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponRecipe {
    pub id: String,
    pub name: String,
    pub sell_price: i64,
    pub recipe: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialtyGood {
    pub id: String,
    pub name: String,
    pub sell_price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryInfo {
    pub id: String,
    pub name: String,
    pub specialty_good_id: String,
    pub conquest_requirements: BTreeMap<String, i64>,
    pub conquest_citizen_reward: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuinInfo {
    pub ruin_type: String,
    pub name: String,
    pub fragment_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NationEffect {
    CountryTime,
    CropTime,
    SellPrice,
    MineTime,
    FragmentChance,
    RuinTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitOption {
    pub id: String,
    pub effect: NationEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartingKit {
    pub money: i64,
    pub citizens: i64,
    /// Facility template keys, planted empty in this order.
    pub facilities: Vec<String>,
    pub seeds: BTreeMap<String, i64>,
    pub weapons: BTreeMap<String, i64>,
}

// ── Tuning ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillRates {
    pub crop_time: f64,
    pub mine_time: f64,
    pub sell_price: f64,
    pub fragment_chance: f64,
    pub country_time: f64,
    pub tenant_time: f64,
}

impl Default for SkillRates {
    fn default() -> Self {
        Self {
            crop_time: 0.0005,
            mine_time: 0.0005,
            sell_price: 0.001,
            fragment_chance: 0.0001,
            country_time: 0.0005,
            tenant_time: 0.0005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NationEffectRates {
    pub country_time: f64,
    pub crop_time: f64,
    pub sell_price: f64,
    pub mine_time: f64,
    pub fragment_chance: f64,
    pub ruin_time: f64,
}

impl NationEffectRates {
    pub fn per_stack(&self, effect: NationEffect) -> f64 {
        match effect {
            NationEffect::CountryTime => self.country_time,
            NationEffect::CropTime => self.crop_time,
            NationEffect::SellPrice => self.sell_price,
            NationEffect::MineTime => self.mine_time,
            NationEffect::FragmentChance => self.fragment_chance,
            NationEffect::RuinTime => self.ruin_time,
        }
    }
}

impl Default for NationEffectRates {
    fn default() -> Self {
        Self {
            country_time: 0.05,
            crop_time: 0.05,
            sell_price: 0.1,
            mine_time: 0.05,
            fragment_chance: 0.01,
            ruin_time: 0.05,
        }
    }
}

/// Every numeric constant the rules use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tuning {
    // crops
    pub grow_time_ms: Millis,
    pub stat_sell_price_multiplier: f64,
    pub research_cost: i64,
    pub research_success_rate: f64,
    pub max_crop_stat: u32,
    pub max_facilities: usize,
    pub max_facilities_per_name: usize,

    // fragments and ruins
    pub harvest_fragment_chance: f64,
    pub fragments_per_ruin: i64,
    pub ruin_profit_duration_ms: Millis,
    pub profit_per_ruin: i64,

    // companies and tenants
    pub company_cost: i64,
    pub max_companies_per_type: usize,
    pub max_citizens_per_company: i64,
    pub production_record_multiplier: i64,
    pub citizen_value_multiplier: i64,
    pub tenant_cost: i64,
    pub tenant_company_capacity: usize,
    pub tenant_profit_duration_ms: Millis,
    pub tenant_market_value_rate: f64,
    pub tenant_citizen_bonus: i64,

    // mine and smithy
    pub mining_duration_ms: Millis,
    pub minerals_per_run: u32,

    // countries
    pub country_production_duration_ms: Millis,
    pub base_goods_per_production: i64,
    pub base_bonds_per_production: i64,
    pub rank_upgrade_base_cost: i64,
    pub max_rank: u32,

    // progression
    pub nation_cost: i64,
    pub nation_reroll_cost: i64,
    pub skill_reset_cost: i64,
    pub skill_rates: SkillRates,
    pub nation_effect_rates: NationEffectRates,
    /// Upper clamp on any summed time-reduction fraction.
    pub max_time_reduction: f64,

    // recruiter
    pub recruitment_base_duration_ms: Millis,
    pub recruitment_min_duration_ms: Millis,
    pub recruitment_base_gain: i64,
    pub recruiter_item_citizen_bonus: i64,
    pub recruiter_item_time_reduction_ms: Millis,
    pub recruiter_item_base_cost: i64,
    pub recruiter_item_cost_increment: i64,
    pub recruiter_items_per_purchase: i64,

    // sports league
    pub nba_player_cost: i64,
    pub nba_roster_limit: usize,
    pub nba_team_size: usize,
    pub nba_conference_cooldown_ms: Millis,
    pub min_player_stat: u32,
    pub max_player_stat: u32,
    pub opponent_strength_min: i64,
    pub opponent_strength_max: i64,
    pub favourite_win_probability: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        const HOUR: Millis = 60 * 60 * 1000;
        Self {
            grow_time_ms: 600 * 1000,
            stat_sell_price_multiplier: 0.1,
            research_cost: 300,
            research_success_rate: 0.2,
            max_crop_stat: 5,
            max_facilities: 300,
            max_facilities_per_name: 30,

            harvest_fragment_chance: 0.05,
            fragments_per_ruin: 1000,
            ruin_profit_duration_ms: 60 * 1000,
            profit_per_ruin: 50_000,

            company_cost: 500_000,
            max_companies_per_type: 10,
            max_citizens_per_company: 3000,
            production_record_multiplier: 500,
            citizen_value_multiplier: 10_000,
            tenant_cost: 1_000_000,
            tenant_company_capacity: 5,
            tenant_profit_duration_ms: HOUR,
            tenant_market_value_rate: 0.05,
            tenant_citizen_bonus: 10_000,

            mining_duration_ms: HOUR,
            minerals_per_run: 20,

            country_production_duration_ms: HOUR,
            base_goods_per_production: 1,
            base_bonds_per_production: 20,
            rank_upgrade_base_cost: 20,
            max_rank: 10,

            nation_cost: 100_000_000,
            nation_reroll_cost: 1_000_000,
            skill_reset_cost: 1_000_000,
            skill_rates: SkillRates::default(),
            nation_effect_rates: NationEffectRates::default(),
            max_time_reduction: 0.95,

            recruitment_base_duration_ms: 24 * HOUR,
            recruitment_min_duration_ms: HOUR,
            recruitment_base_gain: 1,
            recruiter_item_citizen_bonus: 1,
            recruiter_item_time_reduction_ms: 30 * 60 * 1000,
            recruiter_item_base_cost: 10,
            recruiter_item_cost_increment: 5,
            recruiter_items_per_purchase: 50,

            nba_player_cost: 10_000_000,
            nba_roster_limit: 100,
            nba_team_size: 5,
            nba_conference_cooldown_ms: 24 * HOUR,
            min_player_stat: 1,
            max_player_stat: 5,
            opponent_strength_min: 40,
            opponent_strength_max: 100,
            favourite_win_probability: 0.8,
        }
    }
}

// ── Catalog ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub crops: BTreeMap<String, CropDefinition>,
    pub facilities: BTreeMap<String, FacilityTemplate>,
    pub products: BTreeMap<String, ProductRecipe>,
    pub companies: BTreeMap<String, CompanyType>,
    /// Draw order for mining.
    pub minerals: Vec<Mineral>,
    pub weapons: BTreeMap<String, WeaponRecipe>,
    pub specialty_goods: BTreeMap<String, SpecialtyGood>,
    /// Unlock order: each country needs its predecessor conquered.
    pub countries: Vec<CountryInfo>,
    pub ruins: Vec<RuinInfo>,
    pub nation_traits: BTreeMap<TraitCategory, Vec<TraitOption>>,
    pub opponents: Vec<String>,
    /// Placement band -> prize money.
    pub prizes: BTreeMap<u32, i64>,
    pub starting: StartingKit,
    #[serde(default)]
    pub tuning: Tuning,
}

impl Catalog {
    /// The built-in tables.
    pub fn standard() -> Self {
        serde_json::from_str(STANDARD_CATALOG).expect("embedded standard catalog is valid JSON")
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn crop(&self, id: &str) -> Option<&CropDefinition> {
        self.crops.get(id)
    }

    pub fn mineral(&self, id: &str) -> Option<&Mineral> {
        self.minerals.iter().find(|m| m.id == id)
    }

    pub fn country(&self, id: &str) -> Option<&CountryInfo> {
        self.countries.iter().find(|c| c.id == id)
    }

    /// The country that must be conquered before `id`, if any.
    pub fn predecessor(&self, id: &str) -> Option<&CountryInfo> {
        let idx = self.countries.iter().position(|c| c.id == id)?;
        idx.checked_sub(1).map(|p| &self.countries[p])
    }

    pub fn ruin(&self, ruin_type: &str) -> Option<&RuinInfo> {
        self.ruins.iter().find(|r| r.ruin_type == ruin_type)
    }

    pub fn is_fragment(&self, fragment_id: &str) -> bool {
        self.ruins.iter().any(|r| r.fragment_id == fragment_id)
    }

    pub fn trait_effect(&self, category: TraitCategory, option: &str) -> Option<NationEffect> {
        self.nation_traits
            .get(&category)?
            .iter()
            .find(|o| o.id == option)
            .map(|o| o.effect)
    }

    /// Cross-check every table reference.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |msg: String| Err(CatalogError::Invalid(msg));

        for product in self.products.values() {
            for ingredient in product.recipe.keys() {
                if !self.crops.contains_key(ingredient) {
                    return invalid(format!(
                        "product {:?} uses unknown crop {:?}",
                        product.id, ingredient
                    ));
                }
            }
        }
        for company in self.companies.values() {
            for product in &company.products {
                if !self.products.contains_key(product) {
                    return invalid(format!(
                        "company {:?} lists unknown product {:?}",
                        company.id, product
                    ));
                }
            }
        }
        for weapon in self.weapons.values() {
            for mineral in weapon.recipe.keys() {
                if self.mineral(mineral).is_none() {
                    return invalid(format!(
                        "weapon {:?} uses unknown mineral {:?}",
                        weapon.id, mineral
                    ));
                }
            }
        }
        let mut seen = BTreeSet::new();
        for country in &self.countries {
            if !seen.insert(country.id.as_str()) {
                return invalid(format!("duplicate country {:?}", country.id));
            }
            if !self.specialty_goods.contains_key(&country.specialty_good_id) {
                return invalid(format!(
                    "country {:?} produces unknown good {:?}",
                    country.id, country.specialty_good_id
                ));
            }
            for weapon in country.conquest_requirements.keys() {
                if !self.weapons.contains_key(weapon) {
                    return invalid(format!(
                        "country {:?} requires unknown weapon {:?}",
                        country.id, weapon
                    ));
                }
            }
        }
        for category in TraitCategory::ALL {
            if self.nation_traits.get(&category).map_or(true, |o| o.is_empty()) {
                return invalid(format!("no options for trait category {:?}", category));
            }
        }
        for key in &self.starting.facilities {
            if !self.facilities.contains_key(key) {
                return invalid(format!("starting facility {:?} has no template", key));
            }
        }
        if self.minerals.is_empty() {
            return invalid("mineral table is empty".to_string());
        }
        Ok(())
    }
}
