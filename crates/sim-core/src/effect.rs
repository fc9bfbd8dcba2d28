//! Effect algebra: how a single typed effect modifies a metric value and the
//! canonical order for combining many effects on the same metric.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::metric::Metric;
use crate::ValidationError;

/// How an effect's value is applied to the incoming metric value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    /// `value + v`
    Add,
    /// `value * (1 + v)`; `v` is a fractional delta, 0.1 = +10%.
    Percent,
    /// `value * v`
    Multiply,
    /// `v`, ignoring the incoming value.
    Set,
}

impl EffectType {
    /// Position of this type in the combination order Set, Add, Percent, Multiply.
    pub fn rank(self) -> u8 {
        match self {
            EffectType::Set => 0,
            EffectType::Add => 1,
            EffectType::Percent => 2,
            EffectType::Multiply => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            EffectType::Add => "Add",
            EffectType::Percent => "Percent",
            EffectType::Multiply => "Multiply",
            EffectType::Set => "Set",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Add" | "add" => Ok(EffectType::Add),
            "Percent" | "percent" => Ok(EffectType::Percent),
            "Multiply" | "multiply" => Ok(EffectType::Multiply),
            "Set" | "set" => Ok(EffectType::Set),
            other => Err(ValidationError::UnknownEffectType(other.to_string())),
        }
    }
}

/// Which kind of game object owns an effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceCategory {
    Upgrade,
    Staff,
    Marketing,
    Event,
    LevelReward,
}

impl SourceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceCategory::Upgrade => "upgrade",
            SourceCategory::Staff => "staff",
            SourceCategory::Marketing => "marketing",
            SourceCategory::Event => "event",
            SourceCategory::LevelReward => "levelReward",
        }
    }
}

/// Owner of an effect. `(category, id)` is the single-instance key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectSource {
    pub category: SourceCategory,
    pub id: String,
    pub name: String,
}

impl EffectSource {
    pub fn new(category: SourceCategory, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
            name: name.into(),
        }
    }

    /// True when both sources share the same `(category, id)` key.
    pub fn same_key(&self, other: &EffectSource) -> bool {
        self.category == other.category && self.id == other.id
    }
}

/// Unique effect identifier. Re-adding an effect with the same id replaces it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectId(pub String);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed, sourced, possibly time-limited modification to a metric.
///
/// Effects are immutable once created; updating one means adding a new effect
/// with the same id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub id: EffectId,
    pub source: EffectSource,
    pub metric: Metric,
    #[serde(rename = "type")]
    pub kind: EffectType,
    pub value: f64,
    /// Lower priorities apply first within a type group. Missing = 0.
    #[serde(default)]
    pub priority: Option<i32>,
    /// `None` means permanent.
    #[serde(default)]
    pub duration_ticks: Option<u64>,
    pub created_at_tick: u64,
}

impl Effect {
    /// Whether the effect's duration has elapsed at `current_tick`.
    pub fn is_expired(&self, current_tick: u64) -> bool {
        match self.duration_ticks {
            None => false,
            Some(d) => current_tick.saturating_sub(self.created_at_tick) >= d,
        }
    }

    fn priority_or_default(&self) -> i32 {
        self.priority.unwrap_or(0)
    }
}

/// Configuration-side description of an effect, before it is bound to a
/// source and a creation tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectTemplate {
    pub metric: Metric,
    #[serde(rename = "type")]
    pub kind: EffectType,
    pub value: f64,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub duration_ticks: Option<u64>,
}

impl EffectTemplate {
    pub fn new(metric: Metric, kind: EffectType, value: f64) -> Self {
        Self {
            metric,
            kind,
            value,
            priority: None,
            duration_ticks: None,
        }
    }

    /// Bind the template to its owner. `index` disambiguates several templates
    /// of one source; the resulting id is `category:sourceId:metric:index`.
    pub fn instantiate(&self, source: &EffectSource, index: usize, tick: u64) -> Effect {
        Effect {
            id: EffectId(format!(
                "{}:{}:{}:{}",
                source.category.as_str(),
                source.id,
                self.metric,
                index
            )),
            source: source.clone(),
            metric: self.metric,
            kind: self.kind,
            value: self.value,
            priority: self.priority,
            duration_ticks: self.duration_ticks,
            created_at_tick: tick,
        }
    }

    /// Same as [`EffectTemplate::instantiate`] with the duration overridden.
    pub fn instantiate_for(
        &self,
        source: &EffectSource,
        index: usize,
        tick: u64,
        duration_ticks: Option<u64>,
    ) -> Effect {
        let mut effect = self.instantiate(source, index, tick);
        effect.duration_ticks = duration_ticks;
        effect
    }
}

/// Apply a single effect to `value`.
pub fn apply_effect(value: f64, effect: &Effect) -> f64 {
    match effect.kind {
        EffectType::Add => value + effect.value,
        EffectType::Percent => value * (1.0 + effect.value),
        EffectType::Multiply => value * effect.value,
        EffectType::Set => effect.value,
    }
}

/// Combine `effects` against `base` in canonical order: grouped by type
/// (Set, Add, Percent, Multiply), then ascending priority, then the order in
/// which they appear in the slice. No clamping happens here.
pub fn combine<'a, I>(base: f64, effects: I) -> f64
where
    I: IntoIterator<Item = &'a Effect>,
{
    let mut ordered: Vec<&Effect> = effects.into_iter().collect();
    // sort_by_key is stable, so ties keep insertion order.
    ordered.sort_by_key(|e| (e.kind.rank(), e.priority_or_default()));
    ordered.into_iter().fold(base, apply_effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eff(kind: EffectType, value: f64, priority: Option<i32>) -> Effect {
        let source = EffectSource::new(SourceCategory::Upgrade, "u", "U");
        let mut e = EffectTemplate::new(Metric::SpawnIntervalSeconds, kind, value)
            .instantiate(&source, 0, 0);
        e.priority = priority;
        e
    }

    #[test]
    fn single_effects() {
        assert_eq!(apply_effect(10.0, &eff(EffectType::Add, 5.0, None)), 15.0);
        assert_eq!(apply_effect(10.0, &eff(EffectType::Percent, 0.5, None)), 15.0);
        assert_eq!(apply_effect(10.0, &eff(EffectType::Multiply, 2.0, None)), 20.0);
        assert_eq!(apply_effect(10.0, &eff(EffectType::Set, 3.0, None)), 3.0);
    }

    #[test]
    fn set_establishes_floor_before_add() {
        // Listed Add first on purpose: order comes from the type, not the list.
        let effects = [eff(EffectType::Add, 2.0, None), eff(EffectType::Set, 7.0, None)];
        assert_eq!(combine(100.0, &effects), 9.0);
    }

    #[test]
    fn add_before_percent_before_multiply() {
        let effects = [
            eff(EffectType::Multiply, 2.0, None),
            eff(EffectType::Percent, -0.5, None),
            eff(EffectType::Add, 10.0, None),
        ];
        // ((10 + 10) * 0.5) * 2
        assert_eq!(combine(10.0, &effects), 20.0);
    }

    #[test]
    fn priority_orders_within_group_and_ties_keep_insertion() {
        let a = eff(EffectType::Set, 1.0, Some(5));
        let b = eff(EffectType::Set, 2.0, Some(1));
        // b applies first (priority 1), a last: result is a's value.
        assert_eq!(combine(0.0, [&a, &b]), 1.0);

        let c = eff(EffectType::Set, 3.0, None);
        let d = eff(EffectType::Set, 4.0, None);
        assert_eq!(combine(0.0, [&c, &d]), 4.0);
        assert_eq!(combine(0.0, [&d, &c]), 3.0);
    }

    #[test]
    fn instantiate_builds_stable_id() {
        let source = EffectSource::new(SourceCategory::Staff, "staff-3", "Barista");
        let t = EffectTemplate::new(Metric::WeeklyExpenses, EffectType::Add, 120.0);
        let e = t.instantiate(&source, 1, 42);
        assert_eq!(e.id.0, "staff:staff-3:weeklyExpenses:1");
        assert_eq!(e.created_at_tick, 42);
        assert!(!e.is_expired(u64::MAX));
    }

    #[test]
    fn expiry_uses_elapsed_ticks() {
        let mut e = eff(EffectType::Add, 1.0, None);
        e.created_at_tick = 10;
        e.duration_ticks = Some(5);
        assert!(!e.is_expired(14));
        assert!(e.is_expired(15));
    }

    #[test]
    fn effect_type_parsing_rejects_unknown() {
        assert_eq!("Percent".parse::<EffectType>().unwrap(), EffectType::Percent);
        assert!(matches!(
            "Exponent".parse::<EffectType>(),
            Err(ValidationError::UnknownEffectType(_))
        ));
    }

    #[test]
    fn template_deserializes_from_json() {
        let t: EffectTemplate = serde_json::from_str(
            r#"{"metric": "serviceSpeedMultiplier", "type": "Multiply",
                "value": 1.5, "durationTicks": 600}"#,
        )
        .unwrap();
        assert_eq!(t.metric, Metric::ServiceSpeedMultiplier);
        assert_eq!(t.kind, EffectType::Multiply);
        assert_eq!(t.duration_ticks, Some(600));
        assert!(serde_json::from_str::<EffectTemplate>(
            r#"{"metric":"luck","type":"Add","value":1}"#
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn single_add_is_base_plus_value(base in -1.0e6f64..1.0e6, v in -1.0e6f64..1.0e6) {
            let e = eff(EffectType::Add, v, None);
            prop_assert_eq!(combine(base, [&e]), base + v);
        }

        #[test]
        fn set_plus_add_ignores_base(
            base in -1.0e6f64..1.0e6,
            s in -1.0e3f64..1.0e3,
            a in -1.0e3f64..1.0e3,
        ) {
            let effects = [eff(EffectType::Add, a, None), eff(EffectType::Set, s, None)];
            prop_assert_eq!(combine(base, &effects), s + a);
        }
    }
}
