/// Farm engine — Actions
///
/// The closed set of transitions the reducer accepts, plus the envelope
/// that carries one action through the log.
///
/// JSON shape: `{"type": "PLANT_ALL", "payload": {"cropId": "apple"}}`.
/// Parsing is total: an unknown type or a malformed payload becomes
/// `Action::Unrecognized`, which the reducer rejects.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::arithmetic::Millis;
use crate::domain::{
    CitizenTarget, ConferenceStatus, GameState, NbaPlayer, QualityStat, RankKind,
    RecruiterItem, SkillTree,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    // ── farming ──
    #[serde(rename_all = "camelCase")]
    BuySeeds { crop_id: String, quantity: i64 },
    #[serde(rename_all = "camelCase")]
    BuyFacility { facility_type: String },
    #[serde(rename_all = "camelCase")]
    Plant { facility_id: String, crop_id: String },
    #[serde(rename_all = "camelCase")]
    PlantAll { crop_id: String },
    #[serde(rename_all = "camelCase")]
    Harvest { facility_id: String },
    HarvestAll,
    #[serde(rename_all = "camelCase")]
    Sell { crop_id: String, quantity: i64 },
    #[serde(rename_all = "camelCase")]
    Research {
        crop_id: String,
        #[serde(default)]
        stat_to_upgrade: Option<QualityStat>,
    },

    // ── fragments and ruins ──
    #[serde(rename_all = "camelCase")]
    ExchangeFragment { to_fragment: String },
    #[serde(rename_all = "camelCase")]
    AssembleRuin { ruin_type: String },
    StartProfitCollection,
    ClaimProfit,

    // ── companies and tenants ──
    #[serde(rename_all = "camelCase")]
    BuyTenant { name: String },
    #[serde(rename_all = "camelCase")]
    BuyCompany { type_id: String },
    #[serde(rename_all = "camelCase")]
    AssignCompanyToTenant { company_id: String, tenant_id: String },
    #[serde(rename_all = "camelCase")]
    RemoveCompanyFromTenant { company_id: String },
    #[serde(rename_all = "camelCase")]
    ProduceProduct {
        company_id: String,
        product_id: String,
        quantity: i64,
    },
    #[serde(rename_all = "camelCase")]
    SellCompanyProduct { product_id: String, quantity: i64 },
    #[serde(rename_all = "camelCase")]
    AssignCitizens {
        target_id: String,
        target_type: CitizenTarget,
        amount: i64,
    },
    #[serde(rename_all = "camelCase")]
    WithdrawCitizens {
        target_id: String,
        target_type: CitizenTarget,
        amount: i64,
    },
    #[serde(rename_all = "camelCase")]
    StartTenantProfitCollection { tenant_id: String },
    #[serde(rename_all = "camelCase")]
    ClaimTenantProfit { tenant_id: String },

    // ── mine and smithy ──
    StartMining,
    CollectMinerals,
    #[serde(rename_all = "camelCase")]
    SellMineral { mineral_id: String, quantity: i64 },
    #[serde(rename_all = "camelCase")]
    CraftWeapon { weapon_id: String },
    #[serde(rename_all = "camelCase")]
    SellWeapon { weapon_id: String, quantity: i64 },

    // ── countries ──
    #[serde(rename_all = "camelCase")]
    ConquerCountry { country_id: String },
    #[serde(rename_all = "camelCase")]
    StartCountryProduction { country_id: String },
    #[serde(rename_all = "camelCase")]
    CollectCountryProduction { country_id: String },
    #[serde(rename_all = "camelCase")]
    UpgradeCountryRank { country_id: String, rank: RankKind },
    #[serde(rename_all = "camelCase")]
    SellSpecialtyGood {
        specialty_good_id: String,
        quantity: i64,
    },

    // ── nation builder ──
    #[serde(rename_all = "camelCase")]
    BuyNation { name: String },
    #[serde(rename_all = "camelCase")]
    RerollNationAllAttributes { nation_id: String },
    #[serde(rename_all = "camelCase")]
    FinalizeNation { nation_id: String },
    #[serde(rename_all = "camelCase")]
    SetActiveNation { nation_id: Option<String> },

    // ── skill tree ──
    #[serde(rename_all = "camelCase")]
    AllocateSkillPoints { new_skill_tree: SkillTree },
    ResetSkillPoints,

    // ── recruiter ──
    StartRecruitment,
    ClaimCitizens,
    #[serde(rename_all = "camelCase")]
    BuyRecruiterItem { item_type: RecruiterItem },

    // ── sports league ──
    #[serde(rename = "SET_NBA_TEAM_NAME", rename_all = "camelCase")]
    SetNbaTeamName { name: String },
    #[serde(rename = "HIRE_NBA_PLAYER", rename_all = "camelCase")]
    HireNbaPlayer { player: NbaPlayer },
    #[serde(rename = "FIRE_NBA_PLAYER", rename_all = "camelCase")]
    FireNbaPlayer { player_id: String },
    #[serde(rename_all = "camelCase")]
    SetConferenceStatus { status: ConferenceStatus },
    /// Five roster ids.
    #[serde(rename = "CREATE_NBA_TOURNAMENT", rename_all = "camelCase")]
    CreateNbaTournament { selected_players: Vec<String> },
    #[serde(rename = "SIMULATE_NBA_TOURNAMENT")]
    SimulateNbaTournament,
    #[serde(rename = "END_NBA_TOURNAMENT")]
    EndNbaTournament,

    // ── misc ──
    #[serde(rename_all = "camelCase")]
    LoadGame { new_state: Box<GameState> },
    CompleteTutorial,

    /// Anything outside the catalog above. Never produced by serde.
    #[serde(skip)]
    Unrecognized { action_type: String },
}

impl Action {
    /// Parse an action document. Never fails.
    pub fn from_value(value: &Value) -> Action {
        match serde_json::from_value::<Action>(value.clone()) {
            Ok(action) => action,
            Err(_) => Action::Unrecognized {
                action_type: value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string(),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Action::Unrecognized { action_type } => json!({ "type": action_type }),
            other => serde_json::to_value(other)
                .unwrap_or_else(|_| json!({ "type": other.action_type() })),
        }
    }

    /// The wire name of this action.
    pub fn action_type(&self) -> &str {
        match self {
            Action::BuySeeds { .. } => "BUY_SEEDS",
            Action::BuyFacility { .. } => "BUY_FACILITY",
            Action::Plant { .. } => "PLANT",
            Action::PlantAll { .. } => "PLANT_ALL",
            Action::Harvest { .. } => "HARVEST",
            Action::HarvestAll => "HARVEST_ALL",
            Action::Sell { .. } => "SELL",
            Action::Research { .. } => "RESEARCH",
            Action::ExchangeFragment { .. } => "EXCHANGE_FRAGMENT",
            Action::AssembleRuin { .. } => "ASSEMBLE_RUIN",
            Action::StartProfitCollection => "START_PROFIT_COLLECTION",
            Action::ClaimProfit => "CLAIM_PROFIT",
            Action::BuyTenant { .. } => "BUY_TENANT",
            Action::BuyCompany { .. } => "BUY_COMPANY",
            Action::AssignCompanyToTenant { .. } => "ASSIGN_COMPANY_TO_TENANT",
            Action::RemoveCompanyFromTenant { .. } => "REMOVE_COMPANY_FROM_TENANT",
            Action::ProduceProduct { .. } => "PRODUCE_PRODUCT",
            Action::SellCompanyProduct { .. } => "SELL_COMPANY_PRODUCT",
            Action::AssignCitizens { .. } => "ASSIGN_CITIZENS",
            Action::WithdrawCitizens { .. } => "WITHDRAW_CITIZENS",
            Action::StartTenantProfitCollection { .. } => "START_TENANT_PROFIT_COLLECTION",
            Action::ClaimTenantProfit { .. } => "CLAIM_TENANT_PROFIT",
            Action::StartMining => "START_MINING",
            Action::CollectMinerals => "COLLECT_MINERALS",
            Action::SellMineral { .. } => "SELL_MINERAL",
            Action::CraftWeapon { .. } => "CRAFT_WEAPON",
            Action::SellWeapon { .. } => "SELL_WEAPON",
            Action::ConquerCountry { .. } => "CONQUER_COUNTRY",
            Action::StartCountryProduction { .. } => "START_COUNTRY_PRODUCTION",
            Action::CollectCountryProduction { .. } => "COLLECT_COUNTRY_PRODUCTION",
            Action::UpgradeCountryRank { .. } => "UPGRADE_COUNTRY_RANK",
            Action::SellSpecialtyGood { .. } => "SELL_SPECIALTY_GOOD",
            Action::BuyNation { .. } => "BUY_NATION",
            Action::RerollNationAllAttributes { .. } => "REROLL_NATION_ALL_ATTRIBUTES",
            Action::FinalizeNation { .. } => "FINALIZE_NATION",
            Action::SetActiveNation { .. } => "SET_ACTIVE_NATION",
            Action::AllocateSkillPoints { .. } => "ALLOCATE_SKILL_POINTS",
            Action::ResetSkillPoints => "RESET_SKILL_POINTS",
            Action::StartRecruitment => "START_RECRUITMENT",
            Action::ClaimCitizens => "CLAIM_CITIZENS",
            Action::BuyRecruiterItem { .. } => "BUY_RECRUITER_ITEM",
            Action::SetNbaTeamName { .. } => "SET_NBA_TEAM_NAME",
            Action::HireNbaPlayer { .. } => "HIRE_NBA_PLAYER",
            Action::FireNbaPlayer { .. } => "FIRE_NBA_PLAYER",
            Action::SetConferenceStatus { .. } => "SET_CONFERENCE_STATUS",
            Action::CreateNbaTournament { .. } => "CREATE_NBA_TOURNAMENT",
            Action::SimulateNbaTournament => "SIMULATE_NBA_TOURNAMENT",
            Action::EndNbaTournament => "END_NBA_TOURNAMENT",
            Action::LoadGame { .. } => "LOAD_GAME",
            Action::CompleteTutorial => "COMPLETE_TUTORIAL",
            Action::Unrecognized { action_type } => action_type,
        }
    }
}

/// One action as recorded in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEnvelope {
    /// 1-based, strictly increasing, no gaps.
    pub sequence: u64,
    /// Caller-sampled clock.
    pub now: Millis,
    /// Seeds this action's RNG so replays draw identically.
    pub seed: u64,
    pub action: Action,
}

impl ActionEnvelope {
    pub fn to_value(&self) -> Value {
        json!({
            "sequence": self.sequence,
            "now": self.now,
            "seed": self.seed,
            "action": self.action.to_value(),
        })
    }

    /// Build from a JSON object. Missing numeric fields read as 0.
    pub fn from_value(v: &Value) -> Self {
        Self {
            sequence: v.get("sequence").and_then(|x| x.as_u64()).unwrap_or(0),
            now: v.get("now").and_then(|x| x.as_i64()).unwrap_or(0),
            seed: v.get("seed").and_then(|x| x.as_u64()).unwrap_or(0),
            action: Action::from_value(v.get("action").unwrap_or(&Value::Null)),
        }
    }
}
