//! Per-tick bundle of derived metrics read from the effect registry.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{BaseMetrics, EffectRegistry, Metric, TICKS_PER_SECOND};
use sim_econ::to_money;

/// Current values of every persistent metric, computed once per tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub spawn_interval_seconds: f64,
    /// Always >= 1.
    pub spawn_interval_ticks: u64,
    /// Always > 0.
    pub service_speed: f64,
    /// Always >= 1.
    pub service_rooms: u32,
    pub reputation_multiplier: f64,
    pub happy_probability: f64,
    pub weekly_expenses: Decimal,
    pub time_capacity: f64,
    pub leveraged_time: f64,
}

impl DerivedMetrics {
    /// Read every metric from `registry` against `base`. Out-of-range values
    /// are clamped; this never fails.
    pub fn compute(registry: &EffectRegistry, base: &BaseMetrics) -> Self {
        Self::compute_tracked(registry, base).0
    }

    /// Like [`DerivedMetrics::compute`], also returning the metrics whose
    /// combined value had to be clamped, in catalogue order.
    pub fn compute_tracked(
        registry: &EffectRegistry,
        base: &BaseMetrics,
    ) -> (Self, Vec<Metric>) {
        let mut clamped = Vec::new();
        let mut read = |metric: Metric| {
            let c = registry.current_clamped(metric, base.value(metric));
            if c.adjusted {
                clamped.push(metric);
            }
            c.value
        };

        let spawn_interval_seconds = read(Metric::SpawnIntervalSeconds);
        let spawn_interval_ticks =
            (spawn_interval_seconds * f64::from(TICKS_PER_SECOND)).round().max(1.0) as u64;
        let service_speed = read(Metric::ServiceSpeedMultiplier);
        let service_rooms = read(Metric::ServiceRooms).min(f64::from(u32::MAX)) as u32;
        let reputation_multiplier = read(Metric::ReputationMultiplier);
        let happy_probability = read(Metric::HappyProbability);
        let weekly = read(Metric::WeeklyExpenses);
        let time_capacity = read(Metric::TimeCapacity);
        let leveraged_time = read(Metric::LeveragedTime);
        let weekly_expenses = match to_money(weekly) {
            Ok(m) => m,
            Err(_) => {
                clamped.push(Metric::WeeklyExpenses);
                Decimal::ZERO
            }
        };
        clamped.sort_unstable();
        clamped.dedup();

        let derived = Self {
            spawn_interval_seconds,
            spawn_interval_ticks,
            service_speed,
            service_rooms,
            reputation_multiplier,
            happy_probability,
            weekly_expenses,
            time_capacity,
            leveraged_time,
        };
        (derived, clamped)
    }

    /// Owner hours available at the start of a period.
    pub fn period_time_budget(&self) -> f64 {
        self.time_capacity + self.leveraged_time
    }

    /// Every derived metric paired with its value, for requirement snapshots.
    pub fn named(&self) -> [(Metric, f64); 8] {
        [
            (Metric::SpawnIntervalSeconds, self.spawn_interval_seconds),
            (Metric::ServiceSpeedMultiplier, self.service_speed),
            (Metric::ServiceRooms, f64::from(self.service_rooms)),
            (Metric::ReputationMultiplier, self.reputation_multiplier),
            (Metric::HappyProbability, self.happy_probability),
            (
                Metric::WeeklyExpenses,
                sim_econ::money_to_f64(self.weekly_expenses).unwrap_or(0.0),
            ),
            (Metric::TimeCapacity, self.time_capacity),
            (Metric::LeveragedTime, self.leveraged_time),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{EffectSource, EffectTemplate, EffectType, SourceCategory};

    fn add(reg: &mut EffectRegistry, id: &str, metric: Metric, kind: EffectType, v: f64) {
        let src = EffectSource::new(SourceCategory::Upgrade, id, id);
        reg.add(EffectTemplate::new(metric, kind, v).instantiate(&src, 0, 0))
            .unwrap();
    }

    #[test]
    fn defaults_from_base() {
        let d = DerivedMetrics::compute(&EffectRegistry::new(), &BaseMetrics::default());
        assert_eq!(d.spawn_interval_ticks, 40);
        assert_eq!(d.service_rooms, 1);
        assert_eq!(d.weekly_expenses, Decimal::new(280, 0));
        assert_eq!(d.period_time_budget(), 40.0);
    }

    #[test]
    fn halved_spawn_interval() {
        let mut reg = EffectRegistry::new();
        add(&mut reg, "ads", Metric::SpawnIntervalSeconds, EffectType::Percent, -0.5);
        let d = DerivedMetrics::compute(&reg, &BaseMetrics::default());
        assert_eq!(d.spawn_interval_seconds, 2.0);
        assert_eq!(d.spawn_interval_ticks, 20);
    }

    #[test]
    fn degenerate_values_clamp_instead_of_failing() {
        let mut reg = EffectRegistry::new();
        add(&mut reg, "a", Metric::SpawnIntervalSeconds, EffectType::Set, 0.0);
        add(&mut reg, "b", Metric::ServiceSpeedMultiplier, EffectType::Multiply, 0.0);
        add(&mut reg, "c", Metric::ServiceRooms, EffectType::Set, -2.0);
        add(&mut reg, "d", Metric::WeeklyExpenses, EffectType::Set, -10.0);
        let d = DerivedMetrics::compute(&reg, &BaseMetrics::default());
        assert_eq!(d.spawn_interval_ticks, 1);
        assert!(d.service_speed > 0.0);
        assert_eq!(d.service_rooms, 1);
        assert_eq!(d.weekly_expenses, Decimal::ZERO);
    }

    #[test]
    fn tracked_compute_lists_each_clamped_metric_once() {
        let mut reg = EffectRegistry::new();
        let (_, clamped) = DerivedMetrics::compute_tracked(&reg, &BaseMetrics::default());
        assert!(clamped.is_empty());

        add(&mut reg, "a", Metric::WeeklyExpenses, EffectType::Set, -10.0);
        add(&mut reg, "b", Metric::HappyProbability, EffectType::Add, 5.0);
        let (d, clamped) = DerivedMetrics::compute_tracked(&reg, &BaseMetrics::default());
        assert_eq!(clamped, vec![Metric::HappyProbability, Metric::WeeklyExpenses]);
        assert_eq!(d, DerivedMetrics::compute(&reg, &BaseMetrics::default()));
    }
}
