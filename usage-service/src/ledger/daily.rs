use std::sync::Arc;

use ledger_client::domain::DailyUsageRecord;
use ledger_client::StoreError;
use time::Date;

use crate::store::UsageStore;

/// The per-day ledger. One row per (user, calendar day); each report replaces
/// the stored total, it never adds to it — the caller supplies the day's
/// running cumulative total. Store failures propagate with no local retry.
pub struct DailyLedger {
    store: Arc<dyn UsageStore>,
}

impl DailyLedger {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    pub async fn record_daily_total(
        &self,
        user_id: i64,
        usage_date: Date,
        total_kwh: f64,
    ) -> Result<DailyUsageRecord, StoreError> {
        let record = self
            .store
            .upsert_daily_total(user_id, usage_date, total_kwh)
            .await?;

        metrics::counter!("daily_totals_recorded_total").increment(1);
        tracing::debug!(user_id, date = %usage_date, total_kwh, "daily total recorded");
        Ok(record)
    }
}
