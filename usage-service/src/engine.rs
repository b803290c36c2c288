use std::sync::Arc;

use ledger_client::domain::{
    DailyUsageRecord, MonthlyLimit, MonthlySummary, MonthlyUsageRecord, PowerLimitSettings,
    Reading, UsageAlert,
};
use ledger_client::{MonthYear, StoreError};
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};

use crate::alerts::{FiredThreshold, ThresholdEngine};
use crate::anomaly::{AnomalyDetector, AnomalyReport};
use crate::config::PolicyConfig;
use crate::error::EngineError;
use crate::ingest::{self, RawSample};
use crate::ledger::{DailyLedger, MonthlyLedger};
use crate::outbox::AlertOutbox;
use crate::store::UsageStore;

/// Days of history behind the usage forecast.
const FORECAST_LOOKBACK_DAYS: i64 = 7;

/// Assumed daily usage when a user has no history yet, in kWh.
const FORECAST_FALLBACK_DAILY_KWH: f64 = 10.0;

/// Result of ingesting one reading.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedReading {
    pub reading: Reading,
    pub daily: DailyUsageRecord,
    pub monthly: MonthlyUsageRecord,
    pub power_alert: Option<FiredThreshold>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyStats {
    pub total_days: usize,
    pub average_daily: f64,
    pub max_daily: f64,
    pub min_daily: f64,
    pub trend: Vec<DailyUsageRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageForecast {
    pub average_daily_usage: f64,
    pub remaining_days_in_month: i64,
    pub current_consumption: f64,
    pub monthly_limit: f64,
    pub projected_usage: f64,
    pub projected_remaining: f64,
    pub will_exceed: bool,
    pub projected_excess: f64,
}

/// The facade over the accounting core: ingest, ledgers, threshold alerts,
/// anomaly detection. All methods take the current time explicitly; the
/// transport layer supplies the wall clock.
pub struct UsageEngine {
    store: Arc<dyn UsageStore>,
    daily: DailyLedger,
    monthly: MonthlyLedger,
    thresholds: ThresholdEngine,
    anomalies: AnomalyDetector,
    policy: PolicyConfig,
}

impl UsageEngine {
    pub fn new(store: Arc<dyn UsageStore>, outbox: AlertOutbox, policy: PolicyConfig) -> Self {
        let thresholds = ThresholdEngine::new(store.clone(), outbox.clone());
        let monthly = MonthlyLedger::new(
            store.clone(),
            thresholds.clone(),
            policy.default_monthly_limit_kwh,
        );
        Self {
            daily: DailyLedger::new(store.clone()),
            monthly,
            thresholds,
            anomalies: AnomalyDetector::new(store.clone(), outbox),
            store,
            policy,
        }
    }

    /// Ingest one raw sample: validate and normalize, append the reading,
    /// replace the day's total with the sample's cumulative energy, recompute
    /// the month, then run the instantaneous power check. The power alert is
    /// best-effort; the ledger writes are not.
    pub async fn record_reading(
        &self,
        raw: RawSample,
        now: OffsetDateTime,
    ) -> Result<RecordedReading, EngineError> {
        let reading = ingest::normalize(raw, now)?;
        metrics::counter!("readings_ingested_total").increment(1);

        self.store.insert_reading(&reading).await?;

        let date = reading.recorded_at.date();
        let daily = self
            .daily
            .record_daily_total(reading.user_id, date, reading.energy)
            .await?;
        let monthly = self
            .monthly
            .recompute(reading.user_id, MonthYear::containing(date), now)
            .await?;

        let settings = self.power_settings(reading.user_id).await?;
        let power_alert = self
            .thresholds
            .check_power_limit(
                reading.user_id,
                reading.power,
                settings.daily_power_limit_watts,
                now,
            )
            .await;

        Ok(RecordedReading {
            reading,
            daily,
            monthly,
            power_alert,
        })
    }

    /// Record a day's cumulative total directly and recompute its month.
    pub async fn record_daily_total(
        &self,
        user_id: i64,
        usage_date: Date,
        total_kwh: f64,
        now: OffsetDateTime,
    ) -> Result<MonthlyUsageRecord, EngineError> {
        self.daily
            .record_daily_total(user_id, usage_date, total_kwh)
            .await?;
        let record = self
            .monthly
            .recompute(user_id, MonthYear::containing(usage_date), now)
            .await?;
        Ok(record)
    }

    pub async fn monthly_summary(
        &self,
        user_id: i64,
        month: Option<MonthYear>,
        now: OffsetDateTime,
    ) -> Result<MonthlySummary, StoreError> {
        let month = month.unwrap_or_else(|| MonthYear::containing(now.date()));
        self.monthly.summary(user_id, month).await
    }

    pub async fn close_month(&self, user_id: i64, month: MonthYear) -> Result<f64, StoreError> {
        self.monthly.close_month(user_id, month).await
    }

    /// Close the given month for every user that has a ledger record in it.
    /// Per-user failures are logged and skipped so one bad row cannot wedge
    /// the rollover; returns the number of users closed.
    pub async fn close_month_for_all(&self, month: MonthYear) -> Result<usize, StoreError> {
        let users = self.store.users_with_month(month).await?;
        let mut closed = 0;
        for user_id in users {
            match self.monthly.close_month(user_id, month).await {
                Ok(_) => closed += 1,
                Err(e) => {
                    tracing::error!(user_id, month = %month, error = %e, "month close failed for user");
                }
            }
        }
        Ok(closed)
    }

    pub async fn daily_stats(
        &self,
        user_id: i64,
        days: i64,
        today: Date,
    ) -> Result<DailyStats, StoreError> {
        let start = today - Duration::days(days);
        let trend = self.store.daily_totals_since(user_id, start).await?;

        let total_days = trend.len();
        let sum: f64 = trend.iter().map(|r| r.total_kwh).sum();
        let average_daily = if total_days == 0 {
            0.0
        } else {
            sum / total_days as f64
        };
        let max_daily = trend.iter().map(|r| r.total_kwh).fold(0.0, f64::max);
        let min_daily = trend
            .iter()
            .map(|r| r.total_kwh)
            .fold(f64::INFINITY, f64::min);
        let min_daily = if min_daily.is_finite() { min_daily } else { 0.0 };

        Ok(DailyStats {
            total_days,
            average_daily,
            max_daily,
            min_daily,
            trend,
        })
    }

    /// Project the month's consumption from the trailing week's average.
    pub async fn usage_forecast(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<UsageForecast, StoreError> {
        let today = now.date();
        let recent = self
            .store
            .daily_totals_since(user_id, today - Duration::days(FORECAST_LOOKBACK_DAYS))
            .await?;
        let average_daily_usage = if recent.is_empty() {
            FORECAST_FALLBACK_DAILY_KWH
        } else {
            recent.iter().map(|r| r.total_kwh).sum::<f64>() / recent.len() as f64
        };

        let month = MonthYear::containing(today);
        let record = self.monthly.get_or_create(user_id, month).await?;
        let remaining_days = month.days_remaining_after(today);

        let projected_usage = record.consumed_kwh + average_daily_usage * remaining_days as f64;
        let projected_remaining = record.allocated_kwh - projected_usage;
        let will_exceed = projected_remaining < 0.0;

        Ok(UsageForecast {
            average_daily_usage,
            remaining_days_in_month: remaining_days,
            current_consumption: record.consumed_kwh,
            monthly_limit: record.allocated_kwh,
            projected_usage,
            projected_remaining,
            will_exceed,
            projected_excess: if will_exceed { -projected_remaining } else { 0.0 },
        })
    }

    pub async fn check_anomalies(
        &self,
        user_id: i64,
        voltage: f64,
        current: f64,
        power: f64,
        now: OffsetDateTime,
    ) -> AnomalyReport {
        self.anomalies
            .check(user_id, voltage, current, power, now)
            .await
    }

    pub async fn monthly_limit(&self, user_id: i64) -> Result<f64, StoreError> {
        Ok(self
            .store
            .monthly_limit(user_id)
            .await?
            .map(|l| l.monthly_limit_kwh)
            .unwrap_or(self.policy.default_monthly_limit_kwh))
    }

    pub async fn set_monthly_limit(
        &self,
        user_id: i64,
        monthly_limit_kwh: f64,
    ) -> Result<MonthlyLimit, StoreError> {
        self.store.set_monthly_limit(user_id, monthly_limit_kwh).await
    }

    /// Power settings with the documented defaults when the user has none.
    pub async fn power_settings(&self, user_id: i64) -> Result<PowerLimitSettings, StoreError> {
        Ok(self
            .store
            .power_settings(user_id)
            .await?
            .unwrap_or_else(|| PowerLimitSettings {
                user_id,
                daily_power_limit_watts: self.policy.default_daily_power_limit_watts,
                alert_threshold: ledger_client::domain::limits::DEFAULT_ALERT_THRESHOLD,
            }))
    }

    pub async fn set_power_limit(
        &self,
        user_id: i64,
        daily_power_limit_watts: f64,
    ) -> Result<PowerLimitSettings, StoreError> {
        self.store
            .set_power_limit(user_id, daily_power_limit_watts)
            .await
    }

    pub async fn recent_alerts(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<UsageAlert>, StoreError> {
        self.store.recent_alerts(user_id, limit).await
    }

    pub async fn resolve_alert(&self, alert_id: i64) -> Result<bool, StoreError> {
        self.store.resolve_alert(alert_id).await
    }
}
