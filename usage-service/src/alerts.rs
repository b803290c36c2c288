use std::sync::Arc;

use ledger_client::domain::{AlertScope, AlertType, MonthlyUsageRecord, Severity};
use ledger_client::{MonthYear, StoreError};
use time::OffsetDateTime;

use crate::outbox::AlertOutbox;
use crate::store::{NewUsageAlert, UsageStore};

/// Percentage checkpoints at which alerts fire, for both the monthly-energy
/// and the instantaneous-power axes.
pub const THRESHOLD_LADDER: [i32; 4] = [50, 75, 90, 100];

pub fn severity_for(threshold: i32) -> Severity {
    match threshold {
        100 => Severity::Critical,
        90 => Severity::High,
        _ => Severity::Warning,
    }
}

fn alert_type_for(threshold: i32) -> AlertType {
    if threshold == 100 {
        AlertType::Exceeded
    } else {
        AlertType::Approaching
    }
}

/// Highest ladder rung at or below the given percentage, if any.
pub fn rung_at_or_below(percentage: f64) -> Option<i32> {
    THRESHOLD_LADDER
        .iter()
        .rev()
        .copied()
        .find(|t| percentage >= *t as f64)
}

/// Outcome of a power-limit check.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FiredThreshold {
    pub threshold: i32,
    pub severity: Severity,
    pub percentage: f64,
}

/// Evaluates usage against the threshold ladder and emits alerts through the
/// outbox. Monthly alerts are idempotent per (user, month); power alerts are
/// evaluated independently per call, so the caller invokes the check once per
/// new reading.
#[derive(Clone)]
pub struct ThresholdEngine {
    store: Arc<dyn UsageStore>,
    outbox: AlertOutbox,
}

impl ThresholdEngine {
    pub fn new(store: Arc<dyn UsageStore>, outbox: AlertOutbox) -> Self {
        Self { store, outbox }
    }

    /// Instantaneous-power check: fire the single highest rung at or below
    /// the current percentage of the daily limit.
    pub async fn check_power_limit(
        &self,
        user_id: i64,
        current_usage: f64,
        daily_limit: f64,
        now: OffsetDateTime,
    ) -> Option<FiredThreshold> {
        if daily_limit <= 0.0 {
            return None;
        }

        let percentage = current_usage / daily_limit * 100.0;
        let threshold = rung_at_or_below(percentage)?;
        let severity = severity_for(threshold);

        let message = format!(
            "Power usage at {percentage:.1}% of daily limit ({current_usage:.2}W / {daily_limit:.2}W)"
        );
        self.outbox
            .publish_usage(
                NewUsageAlert {
                    user_id,
                    scope: AlertScope::Power,
                    month: MonthYear::containing(now.date()),
                    alert_type: alert_type_for(threshold),
                    threshold_percentage: threshold,
                    current_usage,
                    limit_kwh: daily_limit,
                    message,
                    created_at: now,
                },
                severity,
            )
            .await;

        tracing::info!(user_id, threshold, percentage, "power limit threshold fired");
        Some(FiredThreshold {
            threshold,
            severity,
            percentage,
        })
    }

    /// Monthly-energy check: emit every rung at or below the current usage
    /// percentage that has not been recorded this month, in ascending order.
    /// The 100% rung is additionally guarded by the compare-and-set on
    /// `notification_sent`, so racing recomputes cannot both fire it.
    pub async fn check_monthly(
        &self,
        record: &MonthlyUsageRecord,
        now: OffsetDateTime,
    ) -> Result<Vec<i32>, StoreError> {
        let percentage = record.usage_percentage();
        let recorded = self
            .store
            .alerted_thresholds(record.user_id, record.month)
            .await?;

        let mut fired = Vec::new();
        for threshold in THRESHOLD_LADDER {
            if percentage < threshold as f64 || recorded.contains(&threshold) {
                continue;
            }

            if threshold == 100 {
                let won = self
                    .store
                    .try_mark_notification_sent(record.user_id, record.month)
                    .await?;
                if !won {
                    continue;
                }
            }

            let message = format!(
                "You've used {percentage:.1}% of your monthly limit ({:.2}/{:.2} kWh)",
                record.consumed_kwh, record.allocated_kwh
            );
            self.outbox
                .publish_usage(
                    NewUsageAlert {
                        user_id: record.user_id,
                        scope: AlertScope::Monthly,
                        month: record.month,
                        alert_type: alert_type_for(threshold),
                        threshold_percentage: threshold,
                        current_usage: record.consumed_kwh,
                        limit_kwh: record.allocated_kwh,
                        message,
                        created_at: now,
                    },
                    severity_for(threshold),
                )
                .await;

            tracing::info!(
                user_id = record.user_id,
                month = %record.month,
                threshold,
                "monthly usage threshold fired"
            );
            fired.push(threshold);
        }

        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_rung_at_or_below() {
        assert_eq!(rung_at_or_below(49.9), None);
        assert_eq!(rung_at_or_below(50.0), Some(50));
        assert_eq!(rung_at_or_below(74.9), Some(50));
        assert_eq!(rung_at_or_below(95.0), Some(90));
        assert_eq!(rung_at_or_below(100.0), Some(100));
        assert_eq!(rung_at_or_below(180.0), Some(100));
    }

    #[test]
    fn severities_follow_the_ladder() {
        assert_eq!(severity_for(100), Severity::Critical);
        assert_eq!(severity_for(90), Severity::High);
        assert_eq!(severity_for(75), Severity::Warning);
        assert_eq!(severity_for(50), Severity::Warning);
    }

    #[test]
    fn hundred_percent_is_exceeded_rest_approaching() {
        assert_eq!(alert_type_for(100), AlertType::Exceeded);
        assert_eq!(alert_type_for(90), AlertType::Approaching);
    }
}
