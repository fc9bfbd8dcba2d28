//! The per-game context object that owns every piece of mutable simulation
//! state and sequences a tick.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    evaluate_all, validate_config, Effect, EffectId, EffectRegistry, EffectSource, Metric,
    RequirementSnapshot, ServiceDef, ShopConfig, SourceCategory, ValidationError,
};
use sim_econ::{
    classify_reward, close_out_period, level_for_experience, money_to_f64, Ledger,
    PeriodLedgerEntry, RewardKind,
};
use tracing::{debug, info, warn};

use crate::actions::apply_one_time;
use crate::customer::{CustomerId, ServedCustomer};
use crate::derived::DerivedMetrics;
use crate::scheduler::{self, SimState};

/// Everything one call to [`GameSession::tick`] did.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub tick: u64,
    pub time_seconds: u64,
    pub expired_effects: Vec<EffectId>,
    /// Metrics whose combined value was clamped when this tick read them.
    pub clamped: Vec<Metric>,
    pub spawned: Vec<CustomerId>,
    pub served: Vec<ServedCustomer>,
    pub angered: Vec<CustomerId>,
    pub departed: Vec<CustomerId>,
    pub revenue: Decimal,
    /// Levels newly reached this tick, ascending.
    pub level_ups: Vec<u32>,
    pub closed_period: Option<PeriodLedgerEntry>,
}

/// Read-only view for rendering.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot<'a> {
    pub state: &'a SimState,
    pub derived: DerivedMetrics,
    pub effects: Vec<&'a Effect>,
}

/// One running game. Create a new session, or [`GameSession::reset`] this
/// one, to start over; nothing is shared between sessions.
#[derive(Clone, Debug)]
pub struct GameSession {
    pub(crate) config: ShopConfig,
    pub(crate) registry: EffectRegistry,
    pub(crate) state: SimState,
    pub(crate) ledger: Ledger,
}

impl GameSession {
    /// Validate `config` and build the starting state.
    pub fn new(config: ShopConfig) -> Result<Self, ValidationError> {
        validate_config(&config)?;
        let registry = EffectRegistry::new();
        let state = starting_state(&config, &registry);
        info!(
            services = config.services.len(),
            upgrades = config.upgrades.len(),
            seed = config.rng_seed,
            "session created"
        );
        Ok(Self {
            config,
            registry,
            state,
            ledger: Ledger::new(),
        })
    }

    /// Drop all progress and effects and return to the starting state.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.state = starting_state(&self.config, &self.registry);
        self.ledger = Ledger::new();
        info!("session reset");
    }

    /// Advance exactly one logical tick. Never replays missed ticks.
    pub fn tick(&mut self) -> TickReport {
        let next_tick = self.state.clock.tick + 1;
        let expired = self.registry.expire(next_tick);
        if let Some(c) = &self.state.active_campaign {
            if c.ends_at_tick <= next_tick {
                debug!(campaign = %c.campaign_id, tick = next_tick, "campaign ended");
                self.state.active_campaign = None;
            }
        }

        let (derived, clamped) = DerivedMetrics::compute_tracked(&self.registry, &self.config.base);
        for metric in &clamped {
            warn!(tick = next_tick, metric = %metric, "derived metric clamped");
        }
        let snapshot = self.requirement_snapshot_with(&derived);
        let eligible: Vec<&ServiceDef> = self
            .config
            .services
            .iter()
            .filter(|s| evaluate_all(Some(s.requirements.as_slice()), &snapshot))
            .collect();

        let outcome = scheduler::advance(&mut self.state, &derived, &self.config, &eligible);
        let level_ups = self.apply_level_ups();
        let closed_period = if !outcome.period_rollover {
            None
        } else if level_ups.is_empty() {
            Some(self.close_out(&derived))
        } else {
            // Level rewards may have changed the registry since `derived`.
            let fresh = self.derived();
            Some(self.close_out(&fresh))
        };

        TickReport {
            tick: self.state.clock.tick,
            time_seconds: self.state.clock.time_seconds,
            expired_effects: expired.into_iter().map(|e| e.id).collect(),
            clamped,
            spawned: outcome.spawned,
            served: outcome.served,
            angered: outcome.angered,
            departed: outcome.departed,
            revenue: outcome.revenue,
            level_ups,
            closed_period,
        }
    }

    /// Tick until `periods` more periods have closed. Returns the new entries.
    pub fn run_periods(&mut self, periods: u64) -> Vec<PeriodLedgerEntry> {
        let mut closed = Vec::new();
        while (closed.len() as u64) < periods {
            if let Some(entry) = self.tick().closed_period {
                closed.push(entry);
            }
        }
        closed
    }

    /// Derived metrics as of the registry's current contents.
    pub fn derived(&self) -> DerivedMetrics {
        DerivedMetrics::compute(&self.registry, &self.config.base)
    }

    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot {
            state: &self.state,
            derived: self.derived(),
            effects: self.registry.iter().collect(),
        }
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// True once a close-out has left cash below zero.
    pub fn is_bankrupt(&self) -> bool {
        self.ledger
            .last()
            .is_some_and(|e| e.cash_after < Decimal::ZERO)
    }

    pub fn requirement_snapshot(&self) -> RequirementSnapshot {
        self.requirement_snapshot_with(&self.derived())
    }

    fn requirement_snapshot_with(&self, derived: &DerivedMetrics) -> RequirementSnapshot {
        let s = &self.state;
        let mut metrics = std::collections::BTreeMap::new();
        metrics.insert("cash".to_string(), money_to_f64(s.cash).unwrap_or(0.0));
        metrics.insert(
            "totalRevenue".to_string(),
            money_to_f64(s.total_revenue).unwrap_or(0.0),
        );
        metrics.insert("experience".to_string(), s.experience);
        metrics.insert("level".to_string(), f64::from(s.level));
        metrics.insert("time".to_string(), s.time_available);
        for (metric, value) in derived.named() {
            metrics.insert(metric.as_str().to_string(), value);
        }
        RequirementSnapshot {
            flags: s.flags.clone(),
            metrics,
            upgrades: s.upgrade_levels.clone(),
            staff: s.staff_counts(),
        }
    }

    /// Apply rewards for every level reached since the last check. One-time
    /// experience grants can push further; each level is rewarded once.
    fn apply_level_ups(&mut self) -> Vec<u32> {
        let mut reached = Vec::new();
        loop {
            let level = level_for_experience(&self.config.level_thresholds, self.state.experience);
            if level <= self.state.level {
                break;
            }
            for n in self.state.level + 1..=level {
                self.grant_level_rewards(n);
                reached.push(n);
            }
            self.state.level = level;
            info!(level, experience = self.state.experience, "level up");
        }
        reached
    }

    fn grant_level_rewards(&mut self, level: u32) {
        let tick = self.state.clock.tick;
        let source = EffectSource::new(
            SourceCategory::LevelReward,
            format!("level-{level}"),
            format!("Level {level}"),
        );
        let templates: Vec<_> = self
            .config
            .rewards_for_level(level)
            .flat_map(|r| r.effects.iter().cloned())
            .collect();
        for (i, t) in templates.iter().enumerate() {
            let applied = match classify_reward(t) {
                RewardKind::OneTime => {
                    apply_one_time(&mut self.state, t).map_err(|e| e.to_string())
                }
                RewardKind::Persistent => self
                    .registry
                    .add(t.instantiate(&source, i, tick))
                    .map_err(|e| e.to_string()),
            };
            if let Err(error) = applied {
                warn!(level, metric = %t.metric, %error, "level reward skipped");
            }
        }
    }

    /// Settle the period that just ended and open the next one with the
    /// expenses and time budget from `derived`.
    fn close_out(&mut self, derived: &DerivedMetrics) -> PeriodLedgerEntry {
        let costs = std::mem::take(&mut self.state.one_time_costs);
        let out = close_out_period(
            self.state.cash,
            self.state.weekly_revenue,
            self.state.weekly_expenses,
            &costs,
        );
        let entry = self
            .ledger
            .record(
                self.state.clock.current_period,
                self.state.weekly_revenue,
                costs,
                &out,
                self.state.period_start_experience,
                self.state.experience,
            )
            .clone();

        let s = &mut self.state;
        s.cash = out.cash;
        s.total_expenses += out.total_expenses;
        s.weekly_revenue = Decimal::ZERO;
        s.weekly_expenses = derived.weekly_expenses;
        s.period_start_experience = s.experience;
        s.time_available = derived.period_time_budget();
        s.clock.current_period += 1;
        if out.cash < Decimal::ZERO {
            warn!(period = entry.period, cash = %out.cash, "cash negative after close-out");
        }
        entry
    }
}

fn starting_state(config: &ShopConfig, registry: &EffectRegistry) -> SimState {
    let derived = DerivedMetrics::compute(registry, &config.base);
    let level = level_for_experience(&config.level_thresholds, config.starting_experience);
    SimState::new(config, &derived, level)
}
