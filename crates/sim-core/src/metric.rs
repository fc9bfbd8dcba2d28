//! Metric identifiers and their per-metric valid ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ValidationError, TICKS_PER_SECOND};

/// Lowest service speed multiplier a combination of effects may produce.
pub const MIN_SERVICE_SPEED: f64 = 0.01;

/// A named numeric game parameter subject to effect composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Spendable cash. Only one-time grants target it.
    Cash,
    /// Spendable owner time (hours) in the current period.
    Time,
    /// Accumulated experience; drives the player level.
    Experience,
    /// Extra customers to spawn on the next tick.
    GenerateLeads,
    /// Seconds between two regular customer spawns.
    SpawnIntervalSeconds,
    /// Divisor applied to service durations.
    ServiceSpeedMultiplier,
    /// Number of rooms able to serve customers in parallel.
    ServiceRooms,
    /// Scales experience gained from happy customers.
    ReputationMultiplier,
    /// Probability in [0,1] that a served customer leaves happy.
    HappyProbability,
    /// Recurring expenses charged at each weekly close-out.
    WeeklyExpenses,
    /// Owner hours available per period.
    TimeCapacity,
    /// Hours per period freed up by staff and tooling.
    LeveragedTime,
}

impl Metric {
    /// Every metric, in declaration order.
    pub const ALL: [Metric; 12] = [
        Metric::Cash,
        Metric::Time,
        Metric::Experience,
        Metric::GenerateLeads,
        Metric::SpawnIntervalSeconds,
        Metric::ServiceSpeedMultiplier,
        Metric::ServiceRooms,
        Metric::ReputationMultiplier,
        Metric::HappyProbability,
        Metric::WeeklyExpenses,
        Metric::TimeCapacity,
        Metric::LeveragedTime,
    ];

    /// Stable camelCase name used at the configuration boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cash => "cash",
            Metric::Time => "time",
            Metric::Experience => "experience",
            Metric::GenerateLeads => "generateLeads",
            Metric::SpawnIntervalSeconds => "spawnIntervalSeconds",
            Metric::ServiceSpeedMultiplier => "serviceSpeedMultiplier",
            Metric::ServiceRooms => "serviceRooms",
            Metric::ReputationMultiplier => "reputationMultiplier",
            Metric::HappyProbability => "happyProbability",
            Metric::WeeklyExpenses => "weeklyExpenses",
            Metric::TimeCapacity => "timeCapacity",
            Metric::LeveragedTime => "leveragedTime",
        }
    }

    /// Spendable resources are consumed directly rather than modified over time.
    /// An `Add` on one of them is a one-time grant.
    pub fn is_spendable(self) -> bool {
        matches!(
            self,
            Metric::Cash | Metric::Time | Metric::Experience | Metric::GenerateLeads
        )
    }

    /// Clamp a combined value into this metric's valid range.
    ///
    /// Non-finite input collapses to the lower bound of the range (or zero for
    /// unbounded metrics).
    pub fn clamp(self, raw: f64) -> Clamped {
        let value = match self {
            Metric::HappyProbability => finite_or(raw, 0.0).clamp(0.0, 1.0),
            Metric::SpawnIntervalSeconds => {
                let min = 1.0 / f64::from(TICKS_PER_SECOND);
                finite_or(raw, min).max(min)
            }
            Metric::ServiceSpeedMultiplier => {
                finite_or(raw, MIN_SERVICE_SPEED).max(MIN_SERVICE_SPEED)
            }
            Metric::ServiceRooms => finite_or(raw, 1.0).round().max(1.0),
            Metric::ReputationMultiplier
            | Metric::WeeklyExpenses
            | Metric::TimeCapacity
            | Metric::LeveragedTime => finite_or(raw, 0.0).max(0.0),
            Metric::Cash | Metric::Time | Metric::Experience | Metric::GenerateLeads => {
                finite_or(raw, 0.0)
            }
        };
        // Rounding room counts is expected and does not count as an anomaly.
        let adjusted = if self == Metric::ServiceRooms {
            !raw.is_finite() || raw.round() < 1.0
        } else {
            value.to_bits() != raw.to_bits()
        };
        Clamped { value, adjusted }
    }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Result of clamping a metric value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clamped {
    /// Value inside the metric's range.
    pub value: f64,
    /// Whether the input was outside the range and had to be moved.
    pub adjusted: bool,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownMetric(s.to_string()))
    }
}
