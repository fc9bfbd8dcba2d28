//! Append-only history of settled periods.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{sum_costs, CloseOut, OneTimeCost};

/// One settled period. Never mutated after it is appended.
///
/// Invariant: `profit == revenue - (expenses + sum(one_time_costs))`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodLedgerEntry {
    /// 1-based period number.
    pub period: u64,
    pub revenue: Decimal,
    /// Recurring expenses charged for the period.
    pub expenses: Decimal,
    pub one_time_costs: Vec<OneTimeCost>,
    pub profit: Decimal,
    /// Cash after settlement.
    pub cash_after: Decimal,
    pub experience_after: f64,
    pub experience_change: f64,
}

impl PeriodLedgerEntry {
    pub fn one_time_total(&self) -> Decimal {
        sum_costs(&self.one_time_costs)
    }

    /// Whether the profit identity holds for this entry.
    pub fn is_balanced(&self) -> bool {
        self.profit == self.revenue - (self.expenses + self.one_time_total())
    }
}

/// Aggregates over the whole ledger, e.g. for leaderboard submission.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub periods: u64,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub total_profit: Decimal,
    pub best_profit: Option<Decimal>,
    pub worst_profit: Option<Decimal>,
}

/// Period ledger owned by a game session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<PeriodLedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entry for a settled period and return it.
    pub fn record(
        &mut self,
        period: u64,
        revenue: Decimal,
        one_time_costs: Vec<OneTimeCost>,
        close_out: &CloseOut,
        experience_before: f64,
        experience_after: f64,
    ) -> &PeriodLedgerEntry {
        let entry = PeriodLedgerEntry {
            period,
            revenue,
            expenses: close_out.base_expenses,
            one_time_costs,
            profit: close_out.profit,
            cash_after: close_out.cash,
            experience_after,
            experience_change: experience_after - experience_before,
        };
        debug_assert!(entry.is_balanced());
        info!(
            period,
            revenue = %entry.revenue,
            expenses = %close_out.total_expenses,
            profit = %entry.profit,
            cash = %entry.cash_after,
            "period closed"
        );
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[PeriodLedgerEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&PeriodLedgerEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut s = LedgerSummary {
            periods: self.entries.len() as u64,
            ..LedgerSummary::default()
        };
        for e in &self.entries {
            s.total_revenue += e.revenue;
            s.total_expenses += e.expenses + e.one_time_total();
            s.total_profit += e.profit;
            s.best_profit = Some(s.best_profit.map_or(e.profit, |b| b.max(e.profit)));
            s.worst_profit = Some(s.worst_profit.map_or(e.profit, |w| w.min(e.profit)));
        }
        s
    }
}
