#![deny(warnings)]

//! Core domain model for Shop Tycoon.
//!
//! This crate defines the metric catalogue, the effect algebra and the
//! time-aware effect registry, the requirement evaluator, and the validated
//! configuration the simulation consumes. Nothing here performs I/O.

use thiserror::Error;

pub mod config;
pub mod effect;
pub mod metric;
pub mod registry;
pub mod requirement;

pub use config::{
    validate_config, BaseMetrics, Campaign, DynamicCash, GameEvent, LevelReward, ServiceDef,
    ShopConfig, StaffRole, UpgradeDef, UpgradeLevel,
};
pub use effect::{
    apply_effect, combine, Effect, EffectId, EffectSource, EffectTemplate, EffectType,
    SourceCategory,
};
pub use metric::{Clamped, Metric};
pub use registry::{EffectRegistry, RegistryError};
pub use requirement::{
    evaluate, evaluate_all, first_failure, OnFail, Operator, Requirement, RequirementKind,
    RequirementSnapshot,
};

/// Logical ticks per game second. One scheduler invocation advances one tick.
pub const TICKS_PER_SECOND: u32 = 10;

/// Validation errors for configuration and effect boundaries.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Metric name not in the catalogue.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    /// Effect type other than Add, Percent, Multiply or Set.
    #[error("unknown effect type: {0}")]
    UnknownEffectType(String),
    /// Numeric field must be finite.
    #[error("non-finite numeric value in {0}")]
    NonFinite(String),
    /// Field must be strictly positive.
    #[error("{0} must be > 0")]
    NonPositive(String),
    /// Price or cost out of range.
    #[error("invalid monetary value for {0}")]
    NegativeMoney(String),
    /// A catalogue the simulation cannot run without is empty.
    #[error("configuration has no {0}")]
    MissingCatalog(&'static str),
    /// Blank identifier.
    #[error("{0} with empty id")]
    EmptyId(&'static str),
    /// Two entries of one catalogue share an id.
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    /// Upgrade levels must be numbered 1..=N without gaps.
    #[error("upgrade {0} levels must be numbered 1..=N")]
    UpgradeLevels(String),
    /// Level thresholds must be finite and strictly ascending.
    #[error("level thresholds must be strictly ascending")]
    LevelThresholds,
    /// Cash expression is neither a number nor `expenses*N`.
    #[error("invalid cash expression: {0}")]
    InvalidCashExpression(String),
    /// Two templates of one source target the same registry metric; the
    /// registry keys effects by source and metric, so one would shadow the
    /// other.
    #[error("{owner} has more than one effect on {metric}")]
    DuplicateEffectMetric { owner: String, metric: Metric },
    /// Template on a spendable resource that nothing would ever read.
    /// Spendables only take one-time `Add` grants from events and level
    /// rewards.
    #[error("{owner}: {metric} effect has no lasting target")]
    InertEffect { owner: String, metric: Metric },
}
