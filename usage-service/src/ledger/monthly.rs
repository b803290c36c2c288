use std::sync::Arc;

use ledger_client::domain::{MonthlySummary, MonthlyUsageRecord};
use ledger_client::{MonthYear, StoreError};
use time::OffsetDateTime;

use crate::alerts::ThresholdEngine;
use crate::store::UsageStore;

/// Fraction of unused quota rolled into the next month at close.
const CARRYOVER_FRACTION: f64 = 0.5;

/// Number of alerts attached to a monthly summary.
const SUMMARY_ALERT_COUNT: usize = 5;

/// The per-month system of record. Exclusively owns `consumed_kwh` and
/// `remaining_kwh`: both are always re-derived from the daily rows, never
/// incremented, so concurrent recomputes converge. `carryover_to_next` is
/// written only by [`MonthlyLedger::close_month`].
pub struct MonthlyLedger {
    store: Arc<dyn UsageStore>,
    thresholds: ThresholdEngine,
    default_limit_kwh: f64,
}

impl MonthlyLedger {
    pub fn new(
        store: Arc<dyn UsageStore>,
        thresholds: ThresholdEngine,
        default_limit_kwh: f64,
    ) -> Self {
        Self {
            store,
            thresholds,
            default_limit_kwh,
        }
    }

    /// Return the record for (user, month), opening one if absent. A new
    /// record is allocated the user's monthly limit (default when unset) plus
    /// the previous month's carryover.
    pub async fn get_or_create(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<MonthlyUsageRecord, StoreError> {
        if let Some(existing) = self.store.monthly_usage(user_id, month).await? {
            return Ok(existing);
        }

        let limit = self
            .store
            .monthly_limit(user_id)
            .await?
            .map(|l| l.monthly_limit_kwh)
            .unwrap_or(self.default_limit_kwh);

        let carryover = self
            .store
            .monthly_usage(user_id, month.previous())
            .await?
            .map(|prev| prev.carryover_to_next)
            .unwrap_or(0.0);

        let record = MonthlyUsageRecord::open(user_id, month, limit, carryover);
        self.store.insert_monthly_usage(&record).await?;
        tracing::info!(user_id, month = %month, allocated = record.allocated_kwh, "opened monthly usage record");

        // A concurrent creator may have won the insert; read back the row
        // that actually landed.
        Ok(self
            .store
            .monthly_usage(user_id, month)
            .await?
            .unwrap_or(record))
    }

    /// Re-derive the month's consumption from the daily rows and run the
    /// threshold check. Called after every daily-total write for the month;
    /// safe to call redundantly or out of order. Threshold evaluation is
    /// best-effort: the ledger write is the durable fact and a failing alert
    /// path never rolls it back.
    pub async fn recompute(
        &self,
        user_id: i64,
        month: MonthYear,
        now: OffsetDateTime,
    ) -> Result<MonthlyUsageRecord, StoreError> {
        let record = self.get_or_create(user_id, month).await?;

        let consumed = self
            .store
            .sum_daily_range(user_id, month.first_day(), month.last_day())
            .await?;

        let updated = record.with_consumed(consumed);
        self.store.update_monthly_consumption(&updated).await?;
        metrics::counter!("monthly_recomputes_total").increment(1);

        if let Err(e) = self.thresholds.check_monthly(&updated, now).await {
            metrics::counter!("monthly_threshold_check_failures_total").increment(1);
            tracing::warn!(user_id, month = %month, error = %e, "threshold check failed after recompute");
        }

        Ok(updated)
    }

    /// Month-close rollover: half the unused quota carries into the next
    /// month, nothing carries when the month was exceeded. Idempotent; the
    /// carryover is re-derived from the stored record on every run, so a
    /// restart near the month boundary can safely re-run it.
    pub async fn close_month(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<f64, StoreError> {
        let record = self.get_or_create(user_id, month).await?;

        let carryover = if record.exceeded {
            0.0
        } else {
            record.remaining_kwh * CARRYOVER_FRACTION
        };

        self.store.set_carryover(user_id, month, carryover).await?;
        metrics::counter!("months_closed_total").increment(1);
        tracing::info!(user_id, month = %month, carryover, "month closed");
        Ok(carryover)
    }

    pub async fn summary(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<MonthlySummary, StoreError> {
        let record = self.get_or_create(user_id, month).await?;
        let recent_alerts = self
            .store
            .recent_alerts(user_id, SUMMARY_ALERT_COUNT)
            .await?;

        Ok(MonthlySummary {
            month: month.to_string(),
            allocated: record.allocated_kwh,
            consumed: record.consumed_kwh,
            remaining: record.remaining_kwh,
            carryover_from_previous: record.carryover_from_previous,
            carryover_to_next: record.carryover_to_next,
            exceeded: record.exceeded,
            excess_amount: record.excess_amount,
            usage_percentage: record.usage_percentage(),
            recent_alerts,
        })
    }
}
