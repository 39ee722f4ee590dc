/// Farm engine — Core Domain Types
///
/// Pure data plus small accessors. No transition logic.
/// Field names serialize in camelCase so saved documents keep the
/// shape players already have on disk.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, checked_debit, Millis};
use crate::outcome::Rejection;
use crate::timer::TimedProduction;

// ── Ledgers ────────────────────────────────────────────────────────

/// Keyed non-negative counter (seeds, products, minerals, ...).
/// Absent keys read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger(BTreeMap<String, i64>);

impl Ledger {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, id: &str) -> i64 {
        self.0.get(id).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, id: &str, amount: i64) -> Result<(), Rejection> {
        let next = checked_add(self.get(id), amount).ok_or(Rejection::Overflow)?;
        self.0.insert(id.to_string(), next);
        Ok(())
    }

    /// Debit `amount`, refusing to go below zero.
    pub fn debit(&mut self, id: &str, amount: i64) -> Result<(), Rejection> {
        let have = self.get(id);
        let next = checked_debit(have, amount)
            .ok_or_else(|| Rejection::insufficient(id, amount, have))?;
        self.0.insert(id.to_string(), next);
        Ok(())
    }

    /// Sum of every entry, `None` on overflow.
    pub fn total(&self) -> Option<i64> {
        self.0.values().try_fold(0i64, |acc, v| acc.checked_add(*v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<const N: usize> From<[(&str, i64); N]> for Ledger {
    fn from(entries: [(&str, i64); N]) -> Self {
        Self(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

impl From<BTreeMap<String, i64>> for Ledger {
    fn from(map: BTreeMap<String, i64>) -> Self {
        Self(map)
    }
}

// ── Crops and facilities ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FacilityCategory {
    Field,
    Sea,
    Ranch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CropType {
    Plant,
    Fish,
    Livestock,
}

impl CropType {
    /// Which facility category grows this kind of crop.
    pub fn facility_category(self) -> FacilityCategory {
        match self {
            CropType::Plant => FacilityCategory::Field,
            CropType::Fish => FacilityCategory::Sea,
            CropType::Livestock => FacilityCategory::Ranch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityStat {
    Taste,
    Durability,
    Appearance,
}

impl QualityStat {
    pub const ALL: [QualityStat; 3] = [
        QualityStat::Taste,
        QualityStat::Durability,
        QualityStat::Appearance,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropStats {
    pub taste: u32,
    pub durability: u32,
    pub appearance: u32,
}

impl CropStats {
    pub fn get(&self, stat: QualityStat) -> u32 {
        match stat {
            QualityStat::Taste => self.taste,
            QualityStat::Durability => self.durability,
            QualityStat::Appearance => self.appearance,
        }
    }

    pub fn get_mut(&mut self, stat: QualityStat) -> &mut u32 {
        match stat {
            QualityStat::Taste => &mut self.taste,
            QualityStat::Durability => &mut self.durability,
            QualityStat::Appearance => &mut self.appearance,
        }
    }

    pub fn sum(&self) -> u64 {
        u64::from(self.taste) + u64::from(self.durability) + u64::from(self.appearance)
    }

    pub fn max(&self) -> u32 {
        self.taste.max(self.durability).max(self.appearance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub buy_price: i64,
    pub base_sell_price: i64,
    #[serde(default)]
    pub stats: CropStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantedCrop {
    pub crop_id: String,
    pub quantity: i64,
    pub planted_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub category: FacilityCategory,
    pub capacity: i64,
    #[serde(default)]
    pub planted_crop: Option<PlantedCrop>,
}

// ── Companies and tenants ──────────────────────────────────────────

/// A company instance. Market value is derived, see `economy::market_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub type_id: String,
    pub name: String,
    #[serde(default)]
    pub production_record: i64,
    #[serde(default)]
    pub assigned_citizens: i64,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub assigned_citizens: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CitizenTarget {
    Company,
    Tenant,
}

// ── Countries ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RankKind {
    MilitaryLevel,
    EconomicLevel,
    PoliticalLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConqueredCountry {
    pub military_level: u32,
    pub economic_level: u32,
    pub political_level: u32,
    pub bonds: i64,
    #[serde(default)]
    pub production_state: TimedProduction,
}

impl ConqueredCountry {
    pub fn freshly_conquered() -> Self {
        Self {
            military_level: 1,
            economic_level: 1,
            political_level: 1,
            bonds: 0,
            production_state: TimedProduction::idle(),
        }
    }

    pub fn rank(&self, kind: RankKind) -> u32 {
        match kind {
            RankKind::MilitaryLevel => self.military_level,
            RankKind::EconomicLevel => self.economic_level,
            RankKind::PoliticalLevel => self.political_level,
        }
    }

    pub fn rank_mut(&mut self, kind: RankKind) -> &mut u32 {
        match kind {
            RankKind::MilitaryLevel => &mut self.military_level,
            RankKind::EconomicLevel => &mut self.economic_level,
            RankKind::PoliticalLevel => &mut self.political_level,
        }
    }

    pub fn total_levels(&self) -> u32 {
        self.military_level + self.economic_level + self.political_level
    }
}

// ── Nations ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitCategory {
    Ideology,
    Leader,
    Hero,
    Agriculture,
    Industry,
    Terrain,
    Entertainment,
}

impl TraitCategory {
    pub const ALL: [TraitCategory; 7] = [
        TraitCategory::Ideology,
        TraitCategory::Leader,
        TraitCategory::Hero,
        TraitCategory::Agriculture,
        TraitCategory::Industry,
        TraitCategory::Terrain,
        TraitCategory::Entertainment,
    ];
}

/// Seven optional trait selections, one per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NationAttributes {
    pub ideology: Option<String>,
    pub leader: Option<String>,
    pub hero: Option<String>,
    pub agriculture: Option<String>,
    pub industry: Option<String>,
    pub terrain: Option<String>,
    pub entertainment: Option<String>,
}

impl NationAttributes {
    pub fn get(&self, category: TraitCategory) -> Option<&str> {
        let slot = match category {
            TraitCategory::Ideology => &self.ideology,
            TraitCategory::Leader => &self.leader,
            TraitCategory::Hero => &self.hero,
            TraitCategory::Agriculture => &self.agriculture,
            TraitCategory::Industry => &self.industry,
            TraitCategory::Terrain => &self.terrain,
            TraitCategory::Entertainment => &self.entertainment,
        };
        slot.as_deref()
    }

    pub fn set(&mut self, category: TraitCategory, option: Option<String>) {
        let slot = match category {
            TraitCategory::Ideology => &mut self.ideology,
            TraitCategory::Leader => &mut self.leader,
            TraitCategory::Hero => &mut self.hero,
            TraitCategory::Agriculture => &mut self.agriculture,
            TraitCategory::Industry => &mut self.industry,
            TraitCategory::Terrain => &mut self.terrain,
            TraitCategory::Entertainment => &mut self.entertainment,
        };
        *slot = option;
    }

    /// Populated slots in category order.
    pub fn selections(&self) -> impl Iterator<Item = (TraitCategory, &str)> + '_ {
        TraitCategory::ALL
            .into_iter()
            .filter_map(move |c| self.get(c).map(|opt| (c, opt)))
    }

    pub fn is_complete(&self) -> bool {
        TraitCategory::ALL.iter().all(|c| self.get(*c).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: NationAttributes,
    #[serde(default)]
    pub is_finalized: bool,
}

// ── Skills and recruiter ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillTree {
    pub crop_time: u32,
    pub mine_time: u32,
    pub sell_price: u32,
    pub fragment_chance: u32,
    pub country_time: u32,
    pub tenant_time: u32,
}

impl SkillTree {
    pub fn total(&self) -> u64 {
        [
            self.crop_time,
            self.mine_time,
            self.sell_price,
            self.fragment_chance,
            self.country_time,
            self.tenant_time,
        ]
        .iter()
        .map(|p| u64::from(*p))
        .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecruiterItem {
    CitizenIncrease,
    TimeReduction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecruiterState {
    #[serde(flatten)]
    pub cycle: TimedProduction,
    pub citizen_increase_items: i64,
    pub time_reduction_items: i64,
}

// ── Sports league ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerPosition {
    Center,
    #[serde(rename = "Point Guard")]
    PointGuard,
    #[serde(rename = "Shooting Guard")]
    ShootingGuard,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub shooting: u32,
    pub dunking: u32,
    pub dribbling: u32,
}

impl PlayerStats {
    pub fn sum(&self) -> i64 {
        i64::from(self.shooting) + i64::from(self.dunking) + i64::from(self.dribbling)
    }
}

/// A scouted or hired player. Scouting happens outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NbaPlayer {
    pub id: String,
    pub name: String,
    pub position: PlayerPosition,
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentTeam {
    pub name: String,
    pub strength: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub match_id: u32,
    /// 1-based round number.
    pub round: u32,
    pub teams: [String; 2],
    pub winner: String,
    pub is_player_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_team_strength: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_team_strength: Option<i64>,
}

/// Round levels, widest first. Empty slots are `None` until simulated.
pub type Bracket = Vec<Vec<Option<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub bracket: Bracket,
    #[serde(default)]
    pub results: Vec<MatchResult>,
    pub player_team_strength: i64,
    pub opponents: Vec<OpponentTeam>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConferenceStatus {
    #[default]
    Idle,
    Selecting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conference {
    pub tournament: Option<Tournament>,
    pub status: ConferenceStatus,
    pub final_rank: Option<u32>,
    pub last_played: Option<Millis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NbaState {
    pub team_name: Option<String>,
    pub roster: Vec<NbaPlayer>,
    pub trophies: u32,
    pub conference: Conference,
}

// ── Aggregate root ─────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// Ledger key for fragments that drop from harvests before exchange.
/// The odd name is what saved documents already use.
pub const UNIDENTIFIED_FRAGMENT: &str = "something";

/// The whole game. Every transition produces a new value.
///
/// Only `money` and `facilities` are required when deserializing; every
/// other field falls back to its empty default so older saves load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub money: i64,
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub products: Ledger,
    #[serde(default)]
    pub seeds: Ledger,
    #[serde(default)]
    pub crop_data: BTreeMap<String, CropDefinition>,
    #[serde(default)]
    pub fragments: Ledger,
    #[serde(default)]
    pub ruins: Ledger,
    #[serde(default)]
    pub ruin_profit_state: TimedProduction,
    #[serde(default)]
    pub citizens: i64,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub company_products: Ledger,
    #[serde(default)]
    pub tenant_profit_state: BTreeMap<String, TimedProduction>,
    #[serde(default)]
    pub minerals: Ledger,
    #[serde(default)]
    pub weapons: Ledger,
    #[serde(default)]
    pub mine_state: TimedProduction,
    #[serde(default)]
    pub countries: BTreeMap<String, ConqueredCountry>,
    #[serde(default)]
    pub specialty_goods: Ledger,
    #[serde(default)]
    pub nations: Vec<Nation>,
    #[serde(default)]
    pub active_nation_id: Option<String>,
    #[serde(default)]
    pub skill_tree: SkillTree,
    #[serde(default)]
    pub recruiter_state: RecruiterState,
    #[serde(default)]
    pub nba_state: NbaState,
    #[serde(default = "default_true")]
    pub tutorial_completed: bool,
}

impl GameState {
    /// Debit currency; rejected if the balance would go negative.
    pub fn spend(&mut self, amount: i64) -> Result<(), Rejection> {
        self.money = checked_debit(self.money, amount)
            .ok_or_else(|| Rejection::insufficient("money", amount, self.money))?;
        Ok(())
    }

    pub fn earn(&mut self, amount: i64) -> Result<(), Rejection> {
        self.money = checked_add(self.money, amount).ok_or(Rejection::Overflow)?;
        Ok(())
    }

    /// Debit population; rejected if the pool would go negative.
    pub fn spend_citizens(&mut self, amount: i64) -> Result<(), Rejection> {
        self.citizens = checked_debit(self.citizens, amount)
            .ok_or_else(|| Rejection::insufficient("citizens", amount, self.citizens))?;
        Ok(())
    }

    pub fn gain_citizens(&mut self, amount: i64) -> Result<(), Rejection> {
        self.citizens = checked_add(self.citizens, amount).ok_or(Rejection::Overflow)?;
        Ok(())
    }

    pub fn facility_mut(&mut self, id: &str) -> Result<&mut Facility, Rejection> {
        self.facilities
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Rejection::not_found("facility", id))
    }

    pub fn company(&self, id: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }

    pub fn company_mut(&mut self, id: &str) -> Result<&mut Company, Rejection> {
        self.companies
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Rejection::not_found("company", id))
    }

    pub fn tenant(&self, id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.id == id)
    }

    pub fn tenant_mut(&mut self, id: &str) -> Result<&mut Tenant, Rejection> {
        self.tenants
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Rejection::not_found("tenant", id))
    }

    pub fn nation(&self, id: &str) -> Option<&Nation> {
        self.nations.iter().find(|n| n.id == id)
    }

    pub fn nation_mut(&mut self, id: &str) -> Result<&mut Nation, Rejection> {
        self.nations
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Rejection::not_found("nation", id))
    }

    /// Companies currently assigned to `tenant_id`.
    pub fn companies_of_tenant<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> impl Iterator<Item = &'a Company> + 'a {
        self.companies
            .iter()
            .filter(move |c| c.tenant_id.as_deref() == Some(tenant_id))
    }
}
