#![deny(warnings)]

//! Economic close-out for Shop Tycoon.
//!
//! This crate provides:
//! - Period settlement of recurring expenses and one-time costs
//! - The append-only period ledger
//! - Resolution of dynamic cash grants against current expenses
//! - Level derivation and one-time/persistent reward classification

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::DynamicCash;
use thiserror::Error;

pub mod ledger;
pub mod rewards;

pub use ledger::{Ledger, LedgerSummary, PeriodLedgerEntry};
pub use rewards::{classify_reward, level_for_experience, RewardKind};

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Numeric conversion between floating point and money failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Convert a metric value to money, rounded to cents.
///
/// Example:
/// let m = to_money(280.004).unwrap();
/// assert_eq!(m, Decimal::new(28000, 2));
pub fn to_money(value: f64) -> Result<Decimal, EconError> {
    if !value.is_finite() {
        return Err(EconError::NonFinite);
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or(EconError::NonFinite)
}

/// Convert money back to a metric value.
pub fn money_to_f64(value: Decimal) -> Result<f64, EconError> {
    value.to_f64().ok_or(EconError::NonFinite)
}

/// A single non-recurring cost charged at the next close-out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeCost {
    pub label: String,
    pub amount: Decimal,
}

impl OneTimeCost {
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

/// Sum of all one-time cost amounts.
pub fn sum_costs(costs: &[OneTimeCost]) -> Decimal {
    costs.iter().map(|c| c.amount).sum()
}

/// Outcome of settling one period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOut {
    /// Cash after expenses. May be negative.
    pub cash: Decimal,
    /// Period revenue minus total expenses.
    pub profit: Decimal,
    /// Recurring plus one-time expenses.
    pub total_expenses: Decimal,
    /// Recurring expenses of the period.
    pub base_expenses: Decimal,
    /// One-time costs of the period.
    pub additional_expenses: Decimal,
}

/// Settle a period.
///
/// `period_expenses` already includes the recurring base costs and is not
/// added a second time. Revenue was credited to cash as customers completed
/// service, so it only enters the profit figure here. Negative cash is a
/// valid result and is not clamped.
///
/// Example:
/// let out = close_out_period(Decimal::new(1150,0), Decimal::new(150,0), Decimal::new(280,0), &[]);
/// assert_eq!(out.cash, Decimal::new(870,0));
/// assert_eq!(out.profit, Decimal::new(-130,0));
pub fn close_out_period(
    cash: Decimal,
    period_revenue: Decimal,
    period_expenses: Decimal,
    one_time_costs: &[OneTimeCost],
) -> CloseOut {
    let additional = sum_costs(one_time_costs);
    let total = period_expenses + additional;
    CloseOut {
        cash: cash - total,
        profit: period_revenue - total,
        total_expenses: total,
        base_expenses: period_expenses,
        additional_expenses: additional,
    }
}

/// Resolve a dynamic cash grant against the current weekly expenses.
///
/// Example:
/// let double = DynamicCash::ScaledExpense { multiplier: 2.0 };
/// let g = resolve_cash(double, Decimal::new(280, 0)).unwrap();
/// assert_eq!(g, Decimal::new(560, 0));
pub fn resolve_cash(cash: DynamicCash, weekly_expenses: Decimal) -> Result<Decimal, EconError> {
    match cash {
        DynamicCash::Literal { value } => to_money(value),
        DynamicCash::ScaledExpense { multiplier } => {
            let m = Decimal::from_f64(multiplier).ok_or(EconError::NonFinite)?;
            Ok((weekly_expenses * m).round_dp(2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn revenue_credited_earlier_is_not_readded() {
        // 1000 start, one 150 service credited mid-period.
        let out = close_out_period(d(1150), d(150), d(280), &[]);
        assert_eq!(out.cash, d(870));
        assert_eq!(out.profit, d(-130));
        assert_eq!(out.total_expenses, d(280));
        assert_eq!(out.base_expenses, d(280));
        assert_eq!(out.additional_expenses, Decimal::ZERO);
    }

    #[test]
    fn base_expenses_not_double_counted() {
        let costs = [OneTimeCost::new("chairs L1", d(300))];
        let out = close_out_period(d(2000), d(500), d(280), &costs);
        assert_eq!(out.total_expenses, d(580));
        assert_eq!(out.cash, d(1420));
        assert_eq!(out.profit, d(-80));
    }

    #[test]
    fn negative_cash_is_kept() {
        let out = close_out_period(d(100), Decimal::ZERO, d(280), &[]);
        assert_eq!(out.cash, d(-180));
    }

    #[test]
    fn to_money_rounds_to_cents() {
        assert_eq!(to_money(280.004).unwrap(), Decimal::new(28000, 2));
        assert_eq!(to_money(f64::NAN), Err(EconError::NonFinite));
        assert_eq!(to_money(f64::INFINITY), Err(EconError::NonFinite));
    }

    #[test]
    fn dynamic_cash_resolution() {
        assert_eq!(
            resolve_cash(DynamicCash::Literal { value: -75.5 }, d(280)).unwrap(),
            Decimal::new(-7550, 2)
        );
        assert_eq!(
            resolve_cash(DynamicCash::ScaledExpense { multiplier: 0.5 }, d(280)).unwrap(),
            d(140)
        );
    }

    proptest! {
        #[test]
        fn profit_identity(cash in -1_000_000i64..1_000_000,
                           rev in 0i64..1_000_000,
                           exp in 0i64..1_000_000,
                           costs in proptest::collection::vec(0i64..10_000, 0..5)) {
            let costs: Vec<OneTimeCost> = costs
                .into_iter()
                .enumerate()
                .map(|(i, c)| OneTimeCost::new(format!("c{i}"), Decimal::new(c, 2)))
                .collect();
            let cash = Decimal::new(cash, 2);
            let rev = Decimal::new(rev, 2);
            let exp = Decimal::new(exp, 2);
            let out = close_out_period(cash, rev, exp, &costs);
            prop_assert_eq!(out.profit, rev - (exp + sum_costs(&costs)));
            prop_assert_eq!(out.cash, cash - out.total_expenses);
        }
    }
}
