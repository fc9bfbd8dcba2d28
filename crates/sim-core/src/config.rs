//! Validated, read-only shop configuration consumed by the simulation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::effect::{EffectTemplate, EffectType};
use crate::metric::Metric;
use crate::requirement::Requirement;
use crate::{ValidationError, TICKS_PER_SECOND};

/// A service customers come in for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDef {
    pub id: String,
    pub name: String,
    /// Revenue credited when a customer completes this service (> 0).
    pub price: Decimal,
    /// Unscaled service time in game seconds (> 0).
    pub duration_seconds: f64,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

/// One purchasable level of an upgrade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeLevel {
    /// 1-based level number.
    pub level: u32,
    pub cost: Decimal,
    /// Owner hours spent when buying this level.
    #[serde(default)]
    pub time_cost: f64,
    #[serde(default)]
    pub effects: Vec<EffectTemplate>,
}

/// An upgrade line. Only the purchased level's effects are active.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeDef {
    pub id: String,
    pub name: String,
    pub levels: Vec<UpgradeLevel>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

impl UpgradeDef {
    pub fn level(&self, level: u32) -> Option<&UpgradeLevel> {
        self.levels.iter().find(|l| l.level == level)
    }

    pub fn max_level(&self) -> u32 {
        self.levels.iter().map(|l| l.level).max().unwrap_or(0)
    }
}

/// A staff role that can be hired any number of times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRole {
    pub id: String,
    pub name: String,
    /// Weekly salary, added to recurring expenses while employed.
    pub salary: Decimal,
    #[serde(default)]
    pub effects: Vec<EffectTemplate>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

/// A time-limited marketing campaign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub cost: Decimal,
    #[serde(default)]
    pub time_cost: f64,
    /// Lifetime of every effect the campaign starts (> 0).
    pub duration_ticks: u64,
    pub effects: Vec<EffectTemplate>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

/// A one-time cash grant or charge, resolved when the event fires.
///
/// At the configuration boundary it is either a plain number, an expression
/// `"expenses*N"` (N times the current weekly expenses), or the tagged form
/// `{kind: literal, value}` / `{kind: scaledExpense, multiplier}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDynamicCash", into = "RawDynamicCash")]
pub enum DynamicCash {
    Literal { value: f64 },
    ScaledExpense { multiplier: f64 },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDynamicCash {
    Number(f64),
    Expression(String),
    Tagged(TaggedDynamicCash),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum TaggedDynamicCash {
    Literal { value: f64 },
    ScaledExpense { multiplier: f64 },
}

impl TryFrom<RawDynamicCash> for DynamicCash {
    type Error = ValidationError;

    fn try_from(raw: RawDynamicCash) -> Result<Self, Self::Error> {
        match raw {
            RawDynamicCash::Number(value) => Ok(DynamicCash::Literal { value }),
            RawDynamicCash::Expression(s) => s.parse(),
            RawDynamicCash::Tagged(TaggedDynamicCash::Literal { value }) => {
                Ok(DynamicCash::Literal { value })
            }
            RawDynamicCash::Tagged(TaggedDynamicCash::ScaledExpense { multiplier }) => {
                Ok(DynamicCash::ScaledExpense { multiplier })
            }
        }
    }
}

impl From<DynamicCash> for RawDynamicCash {
    fn from(d: DynamicCash) -> Self {
        match d {
            DynamicCash::Literal { value } => RawDynamicCash::Number(value),
            DynamicCash::ScaledExpense { multiplier } => {
                RawDynamicCash::Expression(format!("expenses*{multiplier}"))
            }
        }
    }
}

impl std::str::FromStr for DynamicCash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let bad = || ValidationError::InvalidCashExpression(s.to_string());
        if let Ok(value) = compact.parse::<f64>() {
            return Ok(DynamicCash::Literal { value });
        }
        let (sign, body) = match compact.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, compact.as_str()),
        };
        let multiplier = if body == "expenses" {
            1.0
        } else if let Some(n) = body.strip_prefix("expenses*") {
            n.parse::<f64>().map_err(|_| bad())?
        } else if let Some(n) = body.strip_suffix("*expenses") {
            n.parse::<f64>().map_err(|_| bad())?
        } else {
            return Err(bad());
        };
        if !multiplier.is_finite() {
            return Err(bad());
        }
        Ok(DynamicCash::ScaledExpense {
            multiplier: sign * multiplier,
        })
    }
}

/// A game event and its consequences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub id: String,
    pub name: String,
    /// One-time cash consequence, applied directly.
    #[serde(default)]
    pub cash: Option<DynamicCash>,
    /// One-time experience consequence, applied directly.
    #[serde(default)]
    pub experience: Option<f64>,
    #[serde(default)]
    pub set_flags: BTreeMap<String, bool>,
    /// Persistent or timed metric effects, routed through the registry.
    #[serde(default)]
    pub effects: Vec<EffectTemplate>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

/// Rewards granted once when the player first reaches `level`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReward {
    pub level: u32,
    pub effects: Vec<EffectTemplate>,
}

/// Base values of the persistent metrics before any effect applies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseMetrics {
    pub spawn_interval_seconds: f64,
    pub service_speed_multiplier: f64,
    pub service_rooms: f64,
    pub reputation_multiplier: f64,
    pub happy_probability: f64,
    pub weekly_expenses: f64,
    pub time_capacity: f64,
    pub leveraged_time: f64,
}

impl Default for BaseMetrics {
    fn default() -> Self {
        Self {
            spawn_interval_seconds: 4.0,
            service_speed_multiplier: 1.0,
            service_rooms: 1.0,
            reputation_multiplier: 1.0,
            happy_probability: 0.7,
            weekly_expenses: 280.0,
            time_capacity: 40.0,
            leveraged_time: 0.0,
        }
    }
}

impl BaseMetrics {
    /// Base value of `metric`. Spendable resources have no base and return 0.
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SpawnIntervalSeconds => self.spawn_interval_seconds,
            Metric::ServiceSpeedMultiplier => self.service_speed_multiplier,
            Metric::ServiceRooms => self.service_rooms,
            Metric::ReputationMultiplier => self.reputation_multiplier,
            Metric::HappyProbability => self.happy_probability,
            Metric::WeeklyExpenses => self.weekly_expenses,
            Metric::TimeCapacity => self.time_capacity,
            Metric::LeveragedTime => self.leveraged_time,
            Metric::Cash | Metric::Time | Metric::Experience | Metric::GenerateLeads => 0.0,
        }
    }
}

fn default_angry_exit_ticks() -> u32 {
    TICKS_PER_SECOND
}

/// Everything the simulation needs to run one shop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopConfig {
    pub starting_cash: Decimal,
    #[serde(default)]
    pub starting_experience: f64,
    /// Length of one accounting period (a week) in game seconds.
    pub period_seconds: u64,
    #[serde(default)]
    pub base: BaseMetrics,
    /// How long a waiting customer stays before leaving angry.
    pub customer_patience_seconds: f64,
    /// Ticks an angry customer lingers before removal.
    #[serde(default = "default_angry_exit_ticks")]
    pub angry_exit_ticks: u32,
    /// Experience gained per happy customer, before the reputation multiplier.
    pub happy_experience_gain: f64,
    /// Experience lost per customer who leaves angry.
    pub angry_experience_penalty: f64,
    #[serde(default)]
    pub rng_seed: u64,
    pub services: Vec<ServiceDef>,
    pub upgrades: Vec<UpgradeDef>,
    #[serde(default)]
    pub staff_roles: Vec<StaffRole>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    /// Experience needed for level 2, 3, ... in ascending order.
    #[serde(default)]
    pub level_thresholds: Vec<f64>,
    #[serde(default)]
    pub level_rewards: Vec<LevelReward>,
}

impl ShopConfig {
    pub fn service(&self, id: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    pub fn staff_role(&self, id: &str) -> Option<&StaffRole> {
        self.staff_roles.iter().find(|r| r.id == id)
    }

    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&GameEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn rewards_for_level(&self, level: u32) -> impl Iterator<Item = &LevelReward> {
        self.level_rewards.iter().filter(move |r| r.level == level)
    }

    pub fn patience_ticks(&self) -> u32 {
        let ticks = (self.customer_patience_seconds * f64::from(TICKS_PER_SECOND)).round();
        // validate_config guarantees a positive, finite patience.
        ticks.clamp(1.0, f64::from(u32::MAX)) as u32
    }
}

/// Validate the whole configuration. Must pass before a session starts.
pub fn validate_config(cfg: &ShopConfig) -> Result<(), ValidationError> {
    if cfg.period_seconds == 0 {
        return Err(ValidationError::NonPositive("periodSeconds".into()));
    }
    if !(cfg.customer_patience_seconds.is_finite() && cfg.customer_patience_seconds > 0.0) {
        return Err(ValidationError::NonPositive("customerPatienceSeconds".into()));
    }
    for (name, v) in [
        ("startingExperience", cfg.starting_experience),
        ("happyExperienceGain", cfg.happy_experience_gain),
        ("angryExperiencePenalty", cfg.angry_experience_penalty),
    ] {
        if !v.is_finite() {
            return Err(ValidationError::NonFinite(name.into()));
        }
    }
    for m in Metric::ALL {
        if !cfg.base.value(m).is_finite() {
            return Err(ValidationError::NonFinite(format!("base.{m}")));
        }
    }

    if cfg.services.is_empty() {
        return Err(ValidationError::MissingCatalog("services"));
    }
    if cfg.upgrades.is_empty() {
        return Err(ValidationError::MissingCatalog("upgrades"));
    }

    unique_ids("service", cfg.services.iter().map(|s| s.id.as_str()))?;
    unique_ids("upgrade", cfg.upgrades.iter().map(|u| u.id.as_str()))?;
    unique_ids("staff role", cfg.staff_roles.iter().map(|r| r.id.as_str()))?;
    unique_ids("campaign", cfg.campaigns.iter().map(|c| c.id.as_str()))?;
    unique_ids("event", cfg.events.iter().map(|e| e.id.as_str()))?;

    for s in &cfg.services {
        if s.price <= Decimal::ZERO {
            return Err(ValidationError::NegativeMoney(format!("service {}", s.id)));
        }
        if !(s.duration_seconds.is_finite() && s.duration_seconds > 0.0) {
            return Err(ValidationError::NonPositive(format!("service {} duration", s.id)));
        }
    }

    for u in &cfg.upgrades {
        if u.levels.is_empty() {
            return Err(ValidationError::UpgradeLevels(u.id.clone()));
        }
        let mut numbers: Vec<u32> = u.levels.iter().map(|l| l.level).collect();
        numbers.sort_unstable();
        if numbers.iter().zip(1u32..).any(|(n, expected)| *n != expected) {
            return Err(ValidationError::UpgradeLevels(u.id.clone()));
        }
        for l in &u.levels {
            if l.cost < Decimal::ZERO {
                return Err(ValidationError::NegativeMoney(format!("upgrade {}", u.id)));
            }
            let owner = format!("upgrade {} level {}", u.id, l.level);
            check_time_cost(&owner, l.time_cost)?;
            check_effects(&owner, &l.effects, EffectScope::Modifier)?;
        }
    }

    for r in &cfg.staff_roles {
        if r.salary < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney(format!("staff role {}", r.id)));
        }
        check_effects(&format!("staff role {}", r.id), &r.effects, EffectScope::Modifier)?;
    }

    for c in &cfg.campaigns {
        if c.cost < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney(format!("campaign {}", c.id)));
        }
        if c.duration_ticks == 0 {
            return Err(ValidationError::NonPositive(format!("campaign {} duration", c.id)));
        }
        check_time_cost(&format!("campaign {}", c.id), c.time_cost)?;
        check_effects(&format!("campaign {}", c.id), &c.effects, EffectScope::Modifier)?;
    }

    for e in &cfg.events {
        if let Some(x) = e.experience {
            if !x.is_finite() {
                return Err(ValidationError::NonFinite(format!("event {} experience", e.id)));
            }
        }
        match e.cash {
            Some(DynamicCash::Literal { value: v })
            | Some(DynamicCash::ScaledExpense { multiplier: v })
                if !v.is_finite() =>
            {
                return Err(ValidationError::NonFinite(format!("event {} cash", e.id)));
            }
            _ => {}
        }
        check_effects(&format!("event {}", e.id), &e.effects, EffectScope::Grant)?;
    }

    if cfg
        .level_thresholds
        .iter()
        .any(|t| !t.is_finite())
        || cfg.level_thresholds.windows(2).any(|w| w[0] >= w[1])
    {
        return Err(ValidationError::LevelThresholds);
    }
    // Rewards for one level share a registry source, so check them together.
    let mut rewards: BTreeMap<u32, Vec<&EffectTemplate>> = BTreeMap::new();
    for r in &cfg.level_rewards {
        if r.level < 2 {
            return Err(ValidationError::NonPositive(format!("level reward level {}", r.level)));
        }
        rewards.entry(r.level).or_default().extend(r.effects.iter());
    }
    for (level, effects) in rewards {
        check_effects(&format!("level {level} rewards"), effects, EffectScope::Grant)?;
    }
    Ok(())
}

fn unique_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId(kind));
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn check_time_cost(what: &str, t: f64) -> Result<(), ValidationError> {
    if !(t.is_finite() && t >= 0.0) {
        return Err(ValidationError::NonFinite(format!("{what} time cost")));
    }
    Ok(())
}

/// How a template list is consumed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum EffectScope {
    /// Every template lands in the registry (upgrades, staff, campaigns).
    Modifier,
    /// `Add` on a spendable is paid out once; the rest lands in the registry.
    Grant,
}

fn check_effects<'a>(
    owner: &str,
    effects: impl IntoIterator<Item = &'a EffectTemplate>,
    scope: EffectScope,
) -> Result<(), ValidationError> {
    let mut targeted = BTreeSet::new();
    for e in effects {
        if !e.value.is_finite() {
            return Err(ValidationError::NonFinite(format!("{owner} effect on {}", e.metric)));
        }
        if e.metric.is_spendable() {
            if scope == EffectScope::Grant && e.kind == EffectType::Add {
                continue;
            }
            return Err(ValidationError::InertEffect {
                owner: owner.to_string(),
                metric: e.metric,
            });
        }
        if !targeted.insert(e.metric) {
            return Err(ValidationError::DuplicateEffectMetric {
                owner: owner.to_string(),
                metric: e.metric,
            });
        }
    }
    Ok(())
}
