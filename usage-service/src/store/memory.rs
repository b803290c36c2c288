use std::collections::HashMap;

use ledger_client::domain::{
    AnomalyEvent, DailyUsageRecord, MonthlyLimit, MonthlyUsageRecord, PowerLimitSettings, Reading,
    UsageAlert,
};
use ledger_client::{MonthYear, StoreError};
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use super::{NewUsageAlert, UsageStore};

#[derive(Default)]
struct Inner {
    readings: Vec<Reading>,
    daily: HashMap<(i64, Date), f64>,
    monthly: HashMap<(i64, MonthYear), MonthlyUsageRecord>,
    monthly_limits: HashMap<i64, f64>,
    power_settings: HashMap<i64, PowerLimitSettings>,
    alerts: Vec<UsageAlert>,
    anomalies: Vec<AnomalyEvent>,
    next_alert_id: i64,
}

/// In-memory store with the same upsert and compare-and-set semantics as the
/// Postgres implementation. Backs the integration tests and local runs
/// without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored anomaly events, for test assertions.
    pub async fn anomaly_count(&self) -> usize {
        self.inner.lock().await.anomalies.len()
    }
}

#[async_trait::async_trait]
impl UsageStore for MemoryStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        self.inner.lock().await.readings.push(reading.clone());
        Ok(())
    }

    async fn recent_power_since(
        &self,
        user_id: i64,
        since: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<f64>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<&Reading> = inner
            .readings
            .iter()
            .filter(|r| r.user_id == user_id && r.recorded_at > since)
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.recorded_at));
        Ok(rows.into_iter().take(limit).map(|r| r.power).collect())
    }

    async fn avg_power_since(
        &self,
        user_id: i64,
        since: OffsetDateTime,
    ) -> Result<Option<f64>, StoreError> {
        let inner = self.inner.lock().await;
        let powers: Vec<f64> = inner
            .readings
            .iter()
            .filter(|r| r.user_id == user_id && r.recorded_at > since)
            .map(|r| r.power)
            .collect();
        if powers.is_empty() {
            Ok(None)
        } else {
            Ok(Some(powers.iter().sum::<f64>() / powers.len() as f64))
        }
    }

    async fn upsert_daily_total(
        &self,
        user_id: i64,
        usage_date: Date,
        total_kwh: f64,
    ) -> Result<DailyUsageRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.daily.insert((user_id, usage_date), total_kwh);
        Ok(DailyUsageRecord {
            user_id,
            usage_date,
            total_kwh,
        })
    }

    async fn sum_daily_range(
        &self,
        user_id: i64,
        start: Date,
        end: Date,
    ) -> Result<f64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .daily
            .iter()
            .filter(|((uid, date), _)| *uid == user_id && *date >= start && *date <= end)
            .map(|(_, kwh)| kwh)
            .sum())
    }

    async fn daily_totals_since(
        &self,
        user_id: i64,
        start: Date,
    ) -> Result<Vec<DailyUsageRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<DailyUsageRecord> = inner
            .daily
            .iter()
            .filter(|((uid, date), _)| *uid == user_id && *date >= start)
            .map(|((uid, date), kwh)| DailyUsageRecord {
                user_id: *uid,
                usage_date: *date,
                total_kwh: *kwh,
            })
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.usage_date));
        Ok(rows)
    }

    async fn monthly_usage(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<Option<MonthlyUsageRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.monthly.get(&(user_id, month)).cloned())
    }

    async fn insert_monthly_usage(&self, record: &MonthlyUsageRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        // Matches the ON CONFLICT DO NOTHING insert: first writer wins.
        inner
            .monthly
            .entry((record.user_id, record.month))
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn update_monthly_consumption(
        &self,
        record: &MonthlyUsageRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.monthly.get_mut(&(record.user_id, record.month)) {
            existing.consumed_kwh = record.consumed_kwh;
            existing.remaining_kwh = record.remaining_kwh;
            existing.exceeded = record.exceeded;
            existing.excess_amount = record.excess_amount;
        }
        Ok(())
    }

    async fn set_carryover(
        &self,
        user_id: i64,
        month: MonthYear,
        carryover_to_next: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.monthly.get_mut(&(user_id, month)) {
            existing.carryover_to_next = carryover_to_next;
        }
        Ok(())
    }

    async fn try_mark_notification_sent(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.monthly.get_mut(&(user_id, month)) {
            Some(existing) if !existing.notification_sent => {
                existing.notification_sent = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn users_with_month(&self, month: MonthYear) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.lock().await;
        let mut users: Vec<i64> = inner
            .monthly
            .keys()
            .filter(|(_, m)| *m == month)
            .map(|(uid, _)| *uid)
            .collect();
        users.sort_unstable();
        Ok(users)
    }

    async fn monthly_limit(&self, user_id: i64) -> Result<Option<MonthlyLimit>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.monthly_limits.get(&user_id).map(|kwh| MonthlyLimit {
            user_id,
            monthly_limit_kwh: *kwh,
        }))
    }

    async fn set_monthly_limit(
        &self,
        user_id: i64,
        monthly_limit_kwh: f64,
    ) -> Result<MonthlyLimit, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.monthly_limits.insert(user_id, monthly_limit_kwh);
        Ok(MonthlyLimit {
            user_id,
            monthly_limit_kwh,
        })
    }

    async fn power_settings(
        &self,
        user_id: i64,
    ) -> Result<Option<PowerLimitSettings>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.power_settings.get(&user_id).cloned())
    }

    async fn set_power_limit(
        &self,
        user_id: i64,
        daily_power_limit_watts: f64,
    ) -> Result<PowerLimitSettings, StoreError> {
        let mut inner = self.inner.lock().await;
        let settings = inner
            .power_settings
            .entry(user_id)
            .or_insert_with(|| PowerLimitSettings::defaults_for(user_id));
        settings.daily_power_limit_watts = daily_power_limit_watts;
        Ok(settings.clone())
    }

    async fn insert_alert(&self, alert: NewUsageAlert) -> Result<UsageAlert, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_alert_id += 1;
        let stored = UsageAlert {
            id: inner.next_alert_id,
            user_id: alert.user_id,
            scope: alert.scope,
            month: alert.month,
            alert_type: alert.alert_type,
            threshold_percentage: alert.threshold_percentage,
            current_usage: alert.current_usage,
            limit_kwh: alert.limit_kwh,
            message: alert.message,
            created_at: alert.created_at,
            is_resolved: false,
        };
        inner.alerts.push(stored.clone());
        Ok(stored)
    }

    async fn recent_alerts(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<UsageAlert>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<UsageAlert> = inner
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse((a.created_at, a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn alerted_thresholds(
        &self,
        user_id: i64,
        month: MonthYear,
    ) -> Result<Vec<i32>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rungs: Vec<i32> = inner
            .alerts
            .iter()
            .filter(|a| {
                a.user_id == user_id
                    && a.scope == ledger_client::domain::AlertScope::Monthly
                    && a.month == month
            })
            .map(|a| a.threshold_percentage)
            .collect();
        rungs.sort_unstable();
        rungs.dedup();
        Ok(rungs)
    }

    async fn resolve_alert(&self, alert_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.is_resolved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_anomaly(&self, event: &AnomalyEvent) -> Result<(), StoreError> {
        self.inner.lock().await.anomalies.push(event.clone());
        Ok(())
    }
}
