//! Player actions on a running session: upgrades, staff, campaigns, events.
//!
//! Every action checks requirements and affordability before touching any
//! state, so a rejected action leaves the session unchanged.

use rust_decimal::Decimal;
use sim_core::{
    first_failure, Effect, EffectSource, EffectTemplate, EffectType, Metric, OnFail,
    RegistryError, Requirement, SourceCategory,
};
use sim_econ::{
    classify_reward, money_to_f64, resolve_cash, to_money, EconError, OneTimeCost, RewardKind,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::scheduler::{ActiveCampaign, SimState, StaffMember};
use crate::session::GameSession;

/// Why a player action was refused.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("unknown {kind}: {id}")]
    UnknownId { kind: &'static str, id: String },
    #[error("requirements not met for {kind} {id}")]
    RequirementsNotMet {
        kind: &'static str,
        id: String,
        /// Policy of the first failing requirement, for the caller's UI.
        on_fail: Option<OnFail>,
    },
    #[error("upgrade {0} is already at its maximum level")]
    MaxLevel(String),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("insufficient time: need {needed}, have {available}")]
    InsufficientTime { needed: f64, available: f64 },
    #[error("campaign {0} is still running")]
    CampaignActive(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Econ(#[from] EconError),
}

/// Result of firing an event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventOutcome {
    pub cash: Decimal,
    pub experience: f64,
    pub effects_added: usize,
}

impl GameSession {
    /// Buy the next level of `upgrade_id`. Returns the new level.
    ///
    /// The previous level's effects are replaced and the cost is charged at
    /// the next close-out.
    pub fn purchase_upgrade(&mut self, upgrade_id: &str) -> Result<u32, ActionError> {
        let def = self
            .config
            .upgrade(upgrade_id)
            .ok_or_else(|| unknown("upgrade", upgrade_id))?;
        self.check_requirements("upgrade", upgrade_id, &def.requirements)?;
        let current = self.state.upgrade_levels.get(upgrade_id).copied().unwrap_or(0);
        let next = current + 1;
        let level = def
            .level(next)
            .ok_or_else(|| ActionError::MaxLevel(upgrade_id.to_string()))?;
        check_affordable(&self.state, level.cost, level.time_cost)?;

        let source = EffectSource::new(SourceCategory::Upgrade, &def.id, &def.name);
        let effects = instantiate(&level.effects, &source, self.state.clock.tick, None)?;
        let label = format!("{} L{}", def.name, next);
        let (cost, time_cost) = (level.cost, level.time_cost);

        self.registry.remove_by_source(SourceCategory::Upgrade, upgrade_id);
        install(&mut self.registry, effects)?;
        self.state.one_time_costs.push(OneTimeCost::new(label, cost));
        self.state.time_available -= time_cost;
        self.state.upgrade_levels.insert(upgrade_id.to_string(), next);
        info!(upgrade = upgrade_id, level = next, cost = %cost, "upgrade purchased");
        Ok(next)
    }

    /// Hire one member of `role_id`. Returns the new staff instance id.
    pub fn hire_staff(&mut self, role_id: &str) -> Result<String, ActionError> {
        let role = self
            .config
            .staff_role(role_id)
            .ok_or_else(|| unknown("staff role", role_id))?;
        self.check_requirements("staff role", role_id, &role.requirements)?;

        let instance_id = format!("staff-{}", self.state.next_staff_id);
        let source = EffectSource::new(SourceCategory::Staff, &instance_id, &role.name);
        // The salary gets its own source so a role effect on weeklyExpenses
        // stacks with it instead of replacing it.
        let payroll =
            EffectSource::new(SourceCategory::Staff, salary_key(&instance_id), &role.name);
        let tick = self.state.clock.tick;
        let salary = EffectTemplate::new(
            Metric::WeeklyExpenses,
            EffectType::Add,
            money_to_f64(role.salary)?,
        );
        let mut effects = vec![salary.instantiate(&payroll, 0, tick)];
        effects.extend(instantiate(&role.effects, &source, tick, None)?);
        install(&mut self.registry, effects)?;

        self.state.next_staff_id += 1;
        self.state.staff.push(StaffMember {
            instance_id: instance_id.clone(),
            role_id: role_id.to_string(),
            hired_at_tick: tick,
        });
        info!(role = role_id, staff = %instance_id, salary = %role.salary, "staff hired");
        Ok(instance_id)
    }

    /// Let go of a staff instance and remove all of its effects.
    pub fn fire_staff(&mut self, instance_id: &str) -> Result<StaffMember, ActionError> {
        let pos = self
            .state
            .staff
            .iter()
            .position(|s| s.instance_id == instance_id)
            .ok_or_else(|| unknown("staff member", instance_id))?;
        let member = self.state.staff.remove(pos);
        let mut removed = self
            .registry
            .remove_by_source(SourceCategory::Staff, instance_id);
        removed.extend(
            self.registry
                .remove_by_source(SourceCategory::Staff, &salary_key(instance_id)),
        );
        info!(
            staff = instance_id,
            role = %member.role_id,
            effects = removed.len(),
            "staff fired"
        );
        Ok(member)
    }

    /// Start a marketing campaign. Only one campaign may run at a time.
    pub fn start_campaign(&mut self, campaign_id: &str) -> Result<(), ActionError> {
        if let Some(active) = &self.state.active_campaign {
            return Err(ActionError::CampaignActive(active.campaign_id.clone()));
        }
        let campaign = self
            .config
            .campaign(campaign_id)
            .ok_or_else(|| unknown("campaign", campaign_id))?;
        self.check_requirements("campaign", campaign_id, &campaign.requirements)?;
        check_affordable(&self.state, campaign.cost, campaign.time_cost)?;

        let tick = self.state.clock.tick;
        let source = EffectSource::new(SourceCategory::Marketing, &campaign.id, &campaign.name);
        let effects = instantiate(
            &campaign.effects,
            &source,
            tick,
            Some(campaign.duration_ticks),
        )?;
        install(&mut self.registry, effects)?;
        self.state
            .one_time_costs
            .push(OneTimeCost::new(campaign.name.clone(), campaign.cost));
        self.state.time_available -= campaign.time_cost;
        self.state.active_campaign = Some(ActiveCampaign {
            campaign_id: campaign_id.to_string(),
            started_at_tick: tick,
            ends_at_tick: tick + campaign.duration_ticks,
        });
        info!(campaign = campaign_id, until = tick + campaign.duration_ticks, "campaign started");
        Ok(())
    }

    /// Fire an event: one-time cash and experience grants and flags are
    /// applied directly, metric effects go through the registry.
    pub fn apply_event(&mut self, event_id: &str) -> Result<EventOutcome, ActionError> {
        let event = self
            .config
            .event(event_id)
            .ok_or_else(|| unknown("event", event_id))?;
        self.check_requirements("event", event_id, &event.requirements)?;

        let cash = match event.cash {
            Some(dc) => resolve_cash(dc, self.state.weekly_expenses)?,
            None => Decimal::ZERO,
        };
        let tick = self.state.clock.tick;
        let source = EffectSource::new(SourceCategory::Event, &event.id, &event.name);
        let (one_time, persistent): (Vec<_>, Vec<_>) = event
            .effects
            .iter()
            .enumerate()
            .partition(|(_, t)| classify_reward(t) == RewardKind::OneTime);
        let effects: Vec<Effect> = persistent
            .iter()
            .map(|(i, t)| t.instantiate(&source, *i, tick))
            .collect();
        check_finite(&effects)?;
        // Convert up front so a bad grant cannot leave a half-applied event.
        for (_, t) in &one_time {
            if t.metric == Metric::Cash {
                to_money(t.value)?;
            }
        }

        let mut outcome = EventOutcome {
            cash,
            experience: event.experience.unwrap_or(0.0),
            effects_added: effects.len(),
        };
        self.state.cash += cash;
        self.state.experience += outcome.experience;
        for (k, v) in &event.set_flags {
            self.state.flags.insert(k.clone(), *v);
        }
        for (_, t) in &one_time {
            apply_one_time(&mut self.state, t)?;
            match t.metric {
                Metric::Cash => outcome.cash += to_money(t.value)?,
                Metric::Experience => outcome.experience += t.value,
                _ => {}
            }
        }
        install(&mut self.registry, effects)?;
        info!(
            event = event_id,
            cash = %outcome.cash,
            experience = outcome.experience,
            "event applied"
        );
        Ok(outcome)
    }

    fn check_requirements(
        &self,
        kind: &'static str,
        id: &str,
        requirements: &[Requirement],
    ) -> Result<(), ActionError> {
        let snapshot = self.requirement_snapshot();
        match first_failure(requirements, &snapshot) {
            None => Ok(()),
            Some(failed) => {
                debug!(kind, id, requirement = ?failed.kind, "requirement failed");
                Err(ActionError::RequirementsNotMet {
                    kind,
                    id: id.to_string(),
                    on_fail: failed.on_fail,
                })
            }
        }
    }
}

/// Apply an `Add` on a spendable resource straight to the state.
pub(crate) fn apply_one_time(
    state: &mut SimState,
    template: &EffectTemplate,
) -> Result<(), EconError> {
    match template.metric {
        Metric::Cash => state.cash += to_money(template.value)?,
        Metric::Time => state.time_available += template.value,
        Metric::Experience => state.experience += template.value,
        Metric::GenerateLeads => {
            let leads = template.value.round().clamp(0.0, f64::from(u32::MAX)) as u32;
            state.pending_leads = state.pending_leads.saturating_add(leads);
        }
        other => debug!(metric = %other, "not a spendable resource, ignored"),
    }
    Ok(())
}

fn salary_key(instance_id: &str) -> String {
    format!("{instance_id}/salary")
}

fn unknown(kind: &'static str, id: &str) -> ActionError {
    ActionError::UnknownId {
        kind,
        id: id.to_string(),
    }
}

fn check_affordable(state: &SimState, cost: Decimal, time_cost: f64) -> Result<(), ActionError> {
    let available = state.spendable_cash();
    if available < cost {
        return Err(ActionError::InsufficientFunds {
            needed: cost,
            available,
        });
    }
    if state.time_available < time_cost {
        return Err(ActionError::InsufficientTime {
            needed: time_cost,
            available: state.time_available,
        });
    }
    Ok(())
}

fn instantiate(
    templates: &[EffectTemplate],
    source: &EffectSource,
    tick: u64,
    duration_ticks: Option<u64>,
) -> Result<Vec<Effect>, RegistryError> {
    let effects: Vec<Effect> = templates
        .iter()
        .enumerate()
        .map(|(i, t)| match duration_ticks {
            Some(d) => t.instantiate_for(source, i, tick, Some(d)),
            None => t.instantiate(source, i, tick),
        })
        .collect();
    check_finite(&effects)?;
    Ok(effects)
}

fn check_finite(effects: &[Effect]) -> Result<(), RegistryError> {
    match effects.iter().find(|e| !e.value.is_finite()) {
        Some(e) => Err(RegistryError::NonFiniteValue(e.id.clone())),
        None => Ok(()),
    }
}

fn install(
    registry: &mut sim_core::EffectRegistry,
    effects: Vec<Effect>,
) -> Result<(), RegistryError> {
    check_finite(&effects)?;
    for e in effects {
        registry.add(e)?;
    }
    Ok(())
}
