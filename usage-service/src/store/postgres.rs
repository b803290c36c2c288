use ledger_client::db::{
    alert_queries, daily_usage_queries, limit_queries, monthly_usage_queries, reading_queries,
};
use ledger_client::domain::{
    AnomalyEvent, DailyUsageRecord, MonthlyLimit, MonthlyUsageRecord, PowerLimitSettings, Reading,
    UsageAlert,
};
use ledger_client::{MonthYear, StoreError};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use super::{NewUsageAlert, UsageStore};

/// Postgres-backed store, delegating to the `ledger-client` query modules.
/// The pool carries a bounded acquire timeout so a saturated database
/// surfaces as `StoreError::Timeout` instead of hanging callers.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl UsageStore for PgStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        reading_queries::insert_reading(&self.pool, reading).await
    }

    async fn recent_power_since(
        &self,
        user_id: i64,
        since: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<f64>, StoreError> {
        reading_queries::recent_power_since(&self.pool, user_id, since, limit as i64).await
    }

    async fn avg_power_since(
        &self,
        user_id: i64,
        since: OffsetDateTime,
    ) -> Result<Option<f64>, StoreError> {
        reading_queries::avg_power_since(&self.pool, user_id, since).await
    }

    async fn upsert_daily_total(
        &self,
        user_id: i64,
        usage_date: Date,
        total_kwh: f64,
    ) -> Result<DailyUsageRecord, StoreError> {
        daily_usage_queries::upsert_daily_total(&self.pool, user_id, usage_date, total_kwh).await
    }

    async fn sum_daily_range(
        &self,
        user_id: i64,
        start: Date,
        end: Date,
    ) -> Result<f64, StoreError> {
        daily_usage_queries::sum_daily_range(&self.pool, user_id, start, end).await
    }

    async fn daily_totals_since(
        &self,
        user_id: i64,
        start: Date,
    ) -> Result<Vec<DailyUsageRecord>, StoreError> {
        daily_usage_queries::daily_totals_since(&self.pool, user_id, start).await
    }

    async fn monthly_usage(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<Option<MonthlyUsageRecord>, StoreError> {
        monthly_usage_queries::get_monthly(&self.pool, user_id, month).await
    }

    async fn insert_monthly_usage(&self, record: &MonthlyUsageRecord) -> Result<(), StoreError> {
        monthly_usage_queries::insert_monthly(&self.pool, record).await
    }

    async fn update_monthly_consumption(
        &self,
        record: &MonthlyUsageRecord,
    ) -> Result<(), StoreError> {
        monthly_usage_queries::update_consumption(&self.pool, record).await
    }

    async fn set_carryover(
        &self,
        user_id: i64,
        month: MonthYear,
        carryover_to_next: f64,
    ) -> Result<(), StoreError> {
        monthly_usage_queries::set_carryover(&self.pool, user_id, month, carryover_to_next).await
    }

    async fn try_mark_notification_sent(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<bool, StoreError> {
        monthly_usage_queries::try_mark_notification_sent(&self.pool, user_id, month).await
    }

    async fn users_with_month(&self, month: MonthYear) -> Result<Vec<i64>, StoreError> {
        monthly_usage_queries::user_ids_for_month(&self.pool, month).await
    }

    async fn monthly_limit(&self, user_id: i64) -> Result<Option<MonthlyLimit>, StoreError> {
        limit_queries::get_monthly_limit(&self.pool, user_id).await
    }

    async fn set_monthly_limit(
        &self,
        user_id: i64,
        monthly_limit_kwh: f64,
    ) -> Result<MonthlyLimit, StoreError> {
        limit_queries::upsert_monthly_limit(&self.pool, user_id, monthly_limit_kwh).await
    }

    async fn power_settings(
        &self,
        user_id: i64,
    ) -> Result<Option<PowerLimitSettings>, StoreError> {
        limit_queries::get_power_settings(&self.pool, user_id).await
    }

    async fn set_power_limit(
        &self,
        user_id: i64,
        daily_power_limit_watts: f64,
    ) -> Result<PowerLimitSettings, StoreError> {
        limit_queries::upsert_power_limit(&self.pool, user_id, daily_power_limit_watts).await
    }

    async fn insert_alert(&self, alert: NewUsageAlert) -> Result<UsageAlert, StoreError> {
        alert_queries::insert_alert(
            &self.pool,
            alert.user_id,
            alert.scope,
            alert.month,
            alert.alert_type,
            alert.threshold_percentage,
            alert.current_usage,
            alert.limit_kwh,
            &alert.message,
            alert.created_at,
        )
        .await
    }

    async fn recent_alerts(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<UsageAlert>, StoreError> {
        alert_queries::recent_alerts(&self.pool, user_id, limit as i64).await
    }

    async fn alerted_thresholds(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<Vec<i32>, StoreError> {
        alert_queries::monthly_thresholds_for_month(&self.pool, user_id, month).await
    }

    async fn resolve_alert(&self, alert_id: i64) -> Result<bool, StoreError> {
        alert_queries::resolve_alert(&self.pool, alert_id).await
    }

    async fn insert_anomaly(&self, event: &AnomalyEvent) -> Result<(), StoreError> {
        alert_queries::insert_anomaly(&self.pool, event).await
    }
}
