//! Time-aware collection of active effects keyed by metric.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::effect::{combine, Effect, EffectId, SourceCategory};
use crate::metric::{Clamped, Metric};
use crate::ValidationError;

/// Reasons an effect is refused at insertion.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// Effect value is NaN or infinite.
    #[error("effect {0} has a non-finite value")]
    NonFiniteValue(EffectId),
    /// Metric or effect type could not be recognised at the boundary.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Active effects grouped per metric, in insertion order.
///
/// Expiry is not lazy: [`EffectRegistry::expire`] must run once per tick
/// before metrics are read.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EffectRegistry {
    by_metric: BTreeMap<Metric, Vec<Effect>>,
    #[serde(skip)]
    owner: HashMap<EffectId, Metric>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `effect`. An effect with the same id, or from the same
    /// `(category, id)` source on the same metric, is replaced in place.
    pub fn add(&mut self, effect: Effect) -> Result<(), RegistryError> {
        if !effect.value.is_finite() {
            return Err(RegistryError::NonFiniteValue(effect.id));
        }
        // Same id on a different metric: drop the stale copy first.
        if let Some(prev_metric) = self.owner.get(&effect.id).copied() {
            if prev_metric != effect.metric {
                self.remove(&effect.id);
            }
        }
        let list = self.by_metric.entry(effect.metric).or_default();
        let slot = list
            .iter()
            .position(|e| e.id == effect.id || e.source.same_key(&effect.source));
        debug!(
            id = %effect.id,
            metric = %effect.metric,
            kind = %effect.kind,
            value = effect.value,
            "effect added"
        );
        self.owner.insert(effect.id.clone(), effect.metric);
        match slot {
            Some(i) => {
                let old = std::mem::replace(&mut list[i], effect);
                if old.id != list[i].id {
                    self.owner.remove(&old.id);
                }
            }
            None => list.push(effect),
        }
        Ok(())
    }

    /// Remove the effect with `id`. Returns it if it was present.
    pub fn remove(&mut self, id: &EffectId) -> Option<Effect> {
        let metric = self.owner.remove(id)?;
        let list = self.by_metric.get_mut(&metric)?;
        let pos = list.iter().position(|e| &e.id == id)?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.by_metric.remove(&metric);
        }
        Some(removed)
    }

    /// Remove every effect owned by `(category, id)` across all metrics.
    pub fn remove_by_source(&mut self, category: SourceCategory, id: &str) -> Vec<Effect> {
        self.drain_where(|e| e.source.category == category && e.source.id == id)
    }

    /// Remove all effects whose duration has elapsed at `current_tick`.
    /// Calling it again at the same tick removes nothing.
    pub fn expire(&mut self, current_tick: u64) -> Vec<Effect> {
        let expired = self.drain_where(|e| e.is_expired(current_tick));
        for e in &expired {
            debug!(id = %e.id, tick = current_tick, "effect expired");
        }
        expired
    }

    /// `base` transformed by every effect targeting `metric`, clamped to the
    /// metric's range. Returns `base` (clamped) when nothing targets it.
    pub fn current_value(&self, metric: Metric, base: f64) -> f64 {
        self.current_clamped(metric, base).value
    }

    /// Like [`EffectRegistry::current_value`] but reports whether clamping
    /// moved the value.
    pub fn current_clamped(&self, metric: Metric, base: f64) -> Clamped {
        let raw = match self.by_metric.get(&metric) {
            Some(list) => combine(base, list),
            None => base,
        };
        metric.clamp(raw)
    }

    /// Effects currently targeting `metric`, in insertion order.
    pub fn effects_for(&self, metric: Metric) -> &[Effect] {
        self.by_metric
            .get(&metric)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, id: &EffectId) -> Option<&Effect> {
        let metric = self.owner.get(id)?;
        self.by_metric.get(metric)?.iter().find(|e| &e.id == id)
    }

    pub fn has_source(&self, category: SourceCategory, id: &str) -> bool {
        self.iter()
            .any(|e| e.source.category == category && e.source.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.by_metric.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_metric.clear();
        self.owner.clear();
    }

    fn drain_where<F>(&mut self, mut pred: F) -> Vec<Effect>
    where
        F: FnMut(&Effect) -> bool,
    {
        let mut removed = Vec::new();
        for list in self.by_metric.values_mut() {
            let mut kept = Vec::with_capacity(list.len());
            for e in list.drain(..) {
                if pred(&e) {
                    removed.push(e);
                } else {
                    kept.push(e);
                }
            }
            *list = kept;
        }
        self.by_metric.retain(|_, list| !list.is_empty());
        for e in &removed {
            self.owner.remove(&e.id);
        }
        removed
    }
}
