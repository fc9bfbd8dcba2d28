//! Tick scheduler: clock, spawning, customer updates and period rollover.
//!
//! [`advance`] performs one logical tick against an already computed
//! [`DerivedMetrics`] bundle. It touches nothing but the [`SimState`] it is
//! handed; effect expiry, level rewards and close-out are sequenced around it
//! by [`crate::GameSession`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{ServiceDef, ShopConfig, TICKS_PER_SECOND};
use sim_econ::OneTimeCost;
use std::collections::BTreeMap;
use tracing::debug;

use crate::customer::{step_customers, Customer, CustomerContext, CustomerId, ServedCustomer};
use crate::derive_seed;
use crate::derived::DerivedMetrics;

/// Upper bound on queued leads turned into customers in a single tick. The
/// remainder stays queued for later ticks.
pub const MAX_LEADS_PER_TICK: u32 = 64;

/// Logical clock. Advanced exactly once per scheduler invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clock {
    pub tick: u64,
    pub time_seconds: u64,
    /// 1-based number of the period in progress.
    pub current_period: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            tick: 0,
            time_seconds: 0,
            current_period: 1,
        }
    }
}

impl Clock {
    /// Step one tick and return the game time before the step.
    pub fn step(&mut self) -> u64 {
        let prev = self.time_seconds;
        self.tick += 1;
        if self.tick % u64::from(TICKS_PER_SECOND) == 0 {
            self.time_seconds += 1;
        }
        prev
    }
}

/// True when moving from `prev_seconds` to `now_seconds` crosses a period
/// boundary.
pub fn crossed_period(prev_seconds: u64, now_seconds: u64, period_seconds: u64) -> bool {
    period_seconds > 0 && now_seconds / period_seconds > prev_seconds / period_seconds
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub instance_id: String,
    pub role_id: String,
    pub hired_at_tick: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCampaign {
    pub campaign_id: String,
    pub started_at_tick: u64,
    pub ends_at_tick: u64,
}

/// Per-game economic and operational snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimState {
    pub clock: Clock,
    pub cash: Decimal,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    /// Revenue of the period in progress.
    pub weekly_revenue: Decimal,
    /// Recurring expense rate as of the last tick.
    pub weekly_expenses: Decimal,
    /// Charged at the next close-out.
    pub one_time_costs: Vec<OneTimeCost>,
    pub experience: f64,
    pub period_start_experience: f64,
    pub level: u32,
    pub time_available: f64,
    pub pending_leads: u32,
    pub customers: Vec<Customer>,
    pub next_customer_id: u64,
    pub flags: BTreeMap<String, bool>,
    pub upgrade_levels: BTreeMap<String, u32>,
    pub staff: Vec<StaffMember>,
    pub next_staff_id: u64,
    pub active_campaign: Option<ActiveCampaign>,
    pub customers_served: u64,
    pub customers_lost: u64,
}

impl SimState {
    pub fn new(config: &ShopConfig, derived: &DerivedMetrics, level: u32) -> Self {
        Self {
            clock: Clock::default(),
            cash: config.starting_cash,
            total_revenue: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            weekly_revenue: Decimal::ZERO,
            weekly_expenses: derived.weekly_expenses,
            one_time_costs: Vec::new(),
            experience: config.starting_experience,
            period_start_experience: config.starting_experience,
            level,
            time_available: derived.period_time_budget(),
            pending_leads: 0,
            customers: Vec::new(),
            next_customer_id: 1,
            flags: BTreeMap::new(),
            upgrade_levels: BTreeMap::new(),
            staff: Vec::new(),
            next_staff_id: 1,
            active_campaign: None,
            customers_served: 0,
            customers_lost: 0,
        }
    }

    pub fn pending_one_time_total(&self) -> Decimal {
        sim_econ::sum_costs(&self.one_time_costs)
    }

    /// Cash left once queued one-time costs are charged.
    pub fn spendable_cash(&self) -> Decimal {
        self.cash - self.pending_one_time_total()
    }

    /// Hired headcount per role id.
    pub fn staff_counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for s in &self.staff {
            *counts.entry(s.role_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// What happened during one call to [`advance`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    pub spawned: Vec<CustomerId>,
    pub served: Vec<ServedCustomer>,
    pub angered: Vec<CustomerId>,
    pub departed: Vec<CustomerId>,
    pub revenue: Decimal,
    pub experience_delta: f64,
    /// A period boundary was crossed and close-out is due.
    pub period_rollover: bool,
}

/// Advance `state` by exactly one tick.
///
/// `services` are the services whose requirements currently pass; spawned
/// customers pick one uniformly. No customer spawns when it is empty.
pub fn advance(
    state: &mut SimState,
    derived: &DerivedMetrics,
    config: &ShopConfig,
    services: &[&ServiceDef],
) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    let prev_seconds = state.clock.step();
    let tick = state.clock.tick;
    state.weekly_expenses = derived.weekly_expenses;

    let interval = derived.spawn_interval_ticks.max(1);
    let due = u32::from(tick % interval == 0);
    let wanted = due + state.pending_leads.min(MAX_LEADS_PER_TICK);
    let mut made = 0;
    while made < wanted {
        match spawn(state, config, services, tick) {
            Some(id) => outcome.spawned.push(id),
            None => {
                debug!(tick, "no eligible service, spawn skipped");
                break;
            }
        }
        made += 1;
    }
    // The interval spawn is served first; whatever is left came from leads.
    state.pending_leads -= made.saturating_sub(due);

    let ctx = CustomerContext {
        tick,
        service_rooms: derived.service_rooms,
        service_speed: derived.service_speed,
        happy_probability: derived.happy_probability,
        reputation_multiplier: derived.reputation_multiplier,
        happy_experience_gain: config.happy_experience_gain,
        angry_experience_penalty: config.angry_experience_penalty,
        angry_exit_ticks: config.angry_exit_ticks,
        rng_seed: config.rng_seed,
    };
    let step = step_customers(&state.customers, &ctx);
    state.customers = step.active;
    state.cash += step.revenue;
    state.total_revenue += step.revenue;
    state.weekly_revenue += step.revenue;
    state.experience += step.experience_delta;
    state.customers_served += step.served.len() as u64;
    state.customers_lost += step.angered.len() as u64;

    outcome.served = step.served;
    outcome.angered = step.angered;
    outcome.departed = step.departed;
    outcome.revenue = step.revenue;
    outcome.experience_delta = step.experience_delta;
    outcome.period_rollover =
        crossed_period(prev_seconds, state.clock.time_seconds, config.period_seconds);
    outcome
}

fn spawn(
    state: &mut SimState,
    config: &ShopConfig,
    services: &[&ServiceDef],
    tick: u64,
) -> Option<CustomerId> {
    if services.is_empty() {
        return None;
    }
    let id = CustomerId(state.next_customer_id);
    let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(config.rng_seed, tick, id.0));
    let service = services[rng.gen_range(0..services.len())];
    state.next_customer_id += 1;
    state
        .customers
        .push(Customer::new(id, service.into(), config.patience_ticks(), tick));
    debug!(customer = id.0, service = %service.id, tick, "customer spawned");
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{BaseMetrics, EffectRegistry};

    fn config() -> ShopConfig {
        serde_yaml::from_str(
            r#"
startingCash: 1000
periodSeconds: 30
base:
  spawnIntervalSeconds: 20
  happyProbability: 0
customerPatienceSeconds: 30
happyExperienceGain: 2
angryExperiencePenalty: 1
services:
  - { id: massage, name: Massage, price: 150, durationSeconds: 5 }
upgrades:
  - id: rooms
    name: Rooms
    levels:
      - { level: 1, cost: 100, effects: [] }
"#,
        )
        .unwrap()
    }

    fn derived(cfg: &ShopConfig) -> DerivedMetrics {
        DerivedMetrics::compute(&EffectRegistry::new(), &cfg.base)
    }

    #[test]
    fn clock_counts_seconds_every_ten_ticks() {
        let mut clock = Clock::default();
        for _ in 0..9 {
            clock.step();
        }
        assert_eq!(clock.time_seconds, 0);
        assert_eq!(clock.step(), 0);
        assert_eq!(clock.time_seconds, 1);
        assert_eq!(clock.tick, 10);
    }

    #[test]
    fn rollover_detection() {
        assert!(!crossed_period(28, 29, 30));
        assert!(crossed_period(29, 30, 30));
        assert!(!crossed_period(30, 30, 30));
        assert!(crossed_period(59, 60, 30));
        assert!(!crossed_period(5, 6, 0));
    }

    #[test]
    fn spawns_on_interval_only() {
        let cfg = config();
        let d = derived(&cfg);
        assert_eq!(d.spawn_interval_ticks, 200);
        let mut state = SimState::new(&cfg, &d, 1);
        let services: Vec<&ServiceDef> = cfg.services.iter().collect();
        let mut spawned = 0;
        for _ in 0..199 {
            spawned += advance(&mut state, &d, &cfg, &services).spawned.len();
        }
        assert_eq!(spawned, 0);
        let out = advance(&mut state, &d, &cfg, &services);
        assert_eq!(out.spawned, vec![CustomerId(1)]);
        assert_eq!(state.customers.len(), 1);
    }

    #[test]
    fn pending_leads_spawn_next_tick() {
        let cfg = config();
        let d = derived(&cfg);
        let mut state = SimState::new(&cfg, &d, 1);
        state.pending_leads = 3;
        let services: Vec<&ServiceDef> = cfg.services.iter().collect();
        let out = advance(&mut state, &d, &cfg, &services);
        assert_eq!(out.spawned.len(), 3);
        assert_eq!(state.pending_leads, 0);
    }

    #[test]
    fn leads_wait_when_no_service_is_eligible() {
        let cfg = config();
        let d = derived(&cfg);
        let mut state = SimState::new(&cfg, &d, 1);
        state.pending_leads = 2;
        let out = advance(&mut state, &d, &cfg, &[]);
        assert!(out.spawned.is_empty());
        assert_eq!(state.pending_leads, 2);
    }

    #[test]
    fn lead_backlog_drains_in_bounded_batches() {
        let cfg = config();
        let d = derived(&cfg);
        let mut state = SimState::new(&cfg, &d, 1);
        state.pending_leads = u32::MAX;
        let services: Vec<&ServiceDef> = cfg.services.iter().collect();
        let out = advance(&mut state, &d, &cfg, &services);
        assert_eq!(out.spawned.len(), MAX_LEADS_PER_TICK as usize);
        assert_eq!(state.pending_leads, u32::MAX - MAX_LEADS_PER_TICK);

        // An interval tick adds its own customer on top of the batch.
        while state.clock.tick % d.spawn_interval_ticks != d.spawn_interval_ticks - 1 {
            state.clock.step();
        }
        let before = state.pending_leads;
        let out = advance(&mut state, &d, &cfg, &services);
        assert_eq!(out.spawned.len(), MAX_LEADS_PER_TICK as usize + 1);
        assert_eq!(state.pending_leads, before - MAX_LEADS_PER_TICK);
    }

    #[test]
    fn revenue_is_credited_on_completion() {
        let cfg = config();
        let d = derived(&cfg);
        let mut state = SimState::new(&cfg, &d, 1);
        let services: Vec<&ServiceDef> = cfg.services.iter().collect();
        // Spawn at tick 200, service starts the same tick, 50 ticks of work.
        for _ in 0..250 {
            advance(&mut state, &d, &cfg, &services);
        }
        assert_eq!(state.cash, Decimal::new(1150, 0));
        assert_eq!(state.weekly_revenue, Decimal::new(150, 0));
        assert_eq!(state.customers_served, 1);
    }

    #[test]
    fn rollover_flag_raised_at_period_end() {
        let cfg = config();
        let d = derived(&cfg);
        let mut state = SimState::new(&cfg, &d, 1);
        let mut rollovers = Vec::new();
        for _ in 0..600 {
            if advance(&mut state, &d, &cfg, &[]).period_rollover {
                rollovers.push(state.clock.tick);
            }
        }
        assert_eq!(rollovers, vec![300, 600]);
    }

    #[test]
    fn default_base_has_positive_budget() {
        let d = DerivedMetrics::compute(&EffectRegistry::new(), &BaseMetrics::default());
        assert!(d.period_time_budget() > 0.0);
    }
}
