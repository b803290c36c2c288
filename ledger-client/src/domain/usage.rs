use serde::{Deserialize, Serialize};
use time::Date;

use crate::month::MonthYear;

/// Total consumption for one (user, calendar day). Replaced on every report
/// for that day, never accumulated and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyUsageRecord {
    pub user_id: i64,
    pub usage_date: Date,
    pub total_kwh: f64,
}

/// The system of record for monthly limit enforcement, unique per
/// (user, month).
///
/// `consumed_kwh` is always a full re-derivation from the daily rows of the
/// month, never an increment, so redundant or racing recomputes converge on
/// the same value. `carryover_to_next` is written only by month close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyUsageRecord {
    pub user_id: i64,
    pub month: MonthYear,
    pub allocated_kwh: f64,
    pub consumed_kwh: f64,
    pub remaining_kwh: f64,
    pub carryover_from_previous: f64,
    pub carryover_to_next: f64,
    pub exceeded: bool,
    pub excess_amount: f64,
    pub notification_sent: bool,
}

impl MonthlyUsageRecord {
    /// Fresh record for a month with nothing consumed yet.
    pub fn open(user_id: i64, month: MonthYear, limit_kwh: f64, carryover: f64) -> Self {
        let allocated = limit_kwh + carryover;
        Self {
            user_id,
            month,
            allocated_kwh: allocated,
            consumed_kwh: 0.0,
            remaining_kwh: allocated,
            carryover_from_previous: carryover,
            carryover_to_next: 0.0,
            exceeded: false,
            excess_amount: 0.0,
            notification_sent: false,
        }
    }

    /// Re-derive the consumption-dependent fields from a fresh monthly sum.
    pub fn with_consumed(mut self, consumed_kwh: f64) -> Self {
        let remaining = self.allocated_kwh - consumed_kwh;
        self.consumed_kwh = consumed_kwh;
        self.remaining_kwh = remaining;
        self.exceeded = remaining < 0.0;
        self.excess_amount = if remaining < 0.0 { -remaining } else { 0.0 };
        self
    }

    pub fn usage_percentage(&self) -> f64 {
        if self.allocated_kwh <= 0.0 {
            0.0
        } else {
            self.consumed_kwh / self.allocated_kwh * 100.0
        }
    }
}

/// Serializable summary returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: String,
    pub allocated: f64,
    pub consumed: f64,
    pub remaining: f64,
    pub carryover_from_previous: f64,
    pub carryover_to_next: f64,
    pub exceeded: bool,
    pub excess_amount: f64,
    pub usage_percentage: f64,
    pub recent_alerts: Vec<crate::domain::UsageAlert>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_consumed_derives_excess_only_when_over() {
        let m = "2025-04".parse().unwrap();
        let rec = MonthlyUsageRecord::open(1, m, 300.0, 20.0);
        assert_eq!(rec.allocated_kwh, 320.0);
        assert_eq!(rec.remaining_kwh, 320.0);

        let under = rec.clone().with_consumed(200.0);
        assert!(!under.exceeded);
        assert_eq!(under.excess_amount, 0.0);
        assert_eq!(under.remaining_kwh, 120.0);

        let over = rec.with_consumed(350.0);
        assert!(over.exceeded);
        assert!((over.excess_amount - 30.0).abs() < 1e-9);
    }

    #[test]
    fn percentage_guards_zero_allocation() {
        let m = "2025-04".parse().unwrap();
        let rec = MonthlyUsageRecord::open(1, m, 0.0, 0.0).with_consumed(5.0);
        assert_eq!(rec.usage_percentage(), 0.0);
    }
}
