//! Experience-derived levels and reward classification.

use serde::{Deserialize, Serialize};
use sim_core::{EffectTemplate, EffectType};

/// How a level reward effect is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RewardKind {
    /// Applied directly to the economic snapshot, once.
    OneTime,
    /// Routed through the effect registry.
    Persistent,
}

/// `Add` on a spendable resource is a one-time bonus; everything else persists.
pub fn classify_reward(effect: &EffectTemplate) -> RewardKind {
    if effect.kind == EffectType::Add && effect.metric.is_spendable() {
        RewardKind::OneTime
    } else {
        RewardKind::Persistent
    }
}

/// Level for `experience` given ascending thresholds for level 2, 3, ...
/// Level 1 needs no experience.
pub fn level_for_experience(thresholds: &[f64], experience: f64) -> u32 {
    let reached = thresholds.iter().take_while(|t| experience >= **t).count();
    u32::try_from(reached).unwrap_or(u32::MAX - 1) + 1
}
