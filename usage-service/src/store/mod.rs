pub mod memory;
pub mod postgres;

use ledger_client::domain::{
    AlertScope, AlertType, AnomalyEvent, DailyUsageRecord, MonthlyLimit, MonthlyUsageRecord,
    PowerLimitSettings, UsageAlert,
};
use ledger_client::{MonthYear, StoreError};
use time::{Date, OffsetDateTime};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A usage alert before the store assigns it an id. `month` is the ledger
/// month the alert belongs to, independent of `created_at`.
#[derive(Debug, Clone)]
pub struct NewUsageAlert {
    pub user_id: i64,
    pub scope: AlertScope,
    pub month: MonthYear,
    pub alert_type: AlertType,
    pub threshold_percentage: i32,
    pub current_usage: f64,
    pub limit_kwh: f64,
    pub message: String,
    pub created_at: OffsetDateTime,
}

/// The relational store the engine runs against. The engine only assumes
/// atomic upserts and aggregate queries; everything else is derived in the
/// ledger. All state is partitioned by `user_id`, so no implementation needs
/// cross-user coordination.
#[async_trait::async_trait]
pub trait UsageStore: Send + Sync {
    // Readings (append-only)
    async fn insert_reading(
        &self,
        reading: &ledger_client::domain::Reading,
    ) -> Result<(), StoreError>;
    async fn recent_power_since(
        &self,
        user_id: i64,
        since: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<f64>, StoreError>;
    async fn avg_power_since(
        &self,
        user_id: i64,
        since: OffsetDateTime,
    ) -> Result<Option<f64>, StoreError>;

    // Daily ledger
    async fn upsert_daily_total(
        &self,
        user_id: i64,
        usage_date: Date,
        total_kwh: f64,
    ) -> Result<DailyUsageRecord, StoreError>;
    async fn sum_daily_range(
        &self,
        user_id: i64,
        start: Date,
        end: Date,
    ) -> Result<f64, StoreError>;
    async fn daily_totals_since(
        &self,
        user_id: i64,
        start: Date,
    ) -> Result<Vec<DailyUsageRecord>, StoreError>;

    // Monthly ledger
    async fn monthly_usage(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<Option<MonthlyUsageRecord>, StoreError>;
    async fn insert_monthly_usage(&self, record: &MonthlyUsageRecord) -> Result<(), StoreError>;
    async fn update_monthly_consumption(
        &self,
        record: &MonthlyUsageRecord,
    ) -> Result<(), StoreError>;
    async fn set_carryover(
        &self,
        user_id: i64,
        month: MonthYear,
        carryover_to_next: f64,
    ) -> Result<(), StoreError>;
    /// Compare-and-set; true only for the caller that flipped the flag.
    async fn try_mark_notification_sent(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<bool, StoreError>;
    async fn users_with_month(&self, month: MonthYear) -> Result<Vec<i64>, StoreError>;

    // Limits
    async fn monthly_limit(&self, user_id: i64) -> Result<Option<MonthlyLimit>, StoreError>;
    async fn set_monthly_limit(
        &self,
        user_id: i64,
        monthly_limit_kwh: f64,
    ) -> Result<MonthlyLimit, StoreError>;
    async fn power_settings(
        &self,
        user_id: i64,
    ) -> Result<Option<PowerLimitSettings>, StoreError>;
    async fn set_power_limit(
        &self,
        user_id: i64,
        daily_power_limit_watts: f64,
    ) -> Result<PowerLimitSettings, StoreError>;

    // Alerts & anomalies
    async fn insert_alert(&self, alert: NewUsageAlert) -> Result<UsageAlert, StoreError>;
    async fn recent_alerts(&self, user_id: i64, limit: usize)
        -> Result<Vec<UsageAlert>, StoreError>;
    /// Distinct monthly-scope ladder rungs already recorded against the
    /// user's ledger month, keyed by the alert's own month tag.
    async fn alerted_thresholds(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<Vec<i32>, StoreError>;
    async fn resolve_alert(&self, alert_id: i64) -> Result<bool, StoreError>;
    async fn insert_anomaly(&self, event: &AnomalyEvent) -> Result<(), StoreError>;
}
