use std::sync::Arc;
use std::time::Duration;

use ledger_client::MonthYear;
use time::OffsetDateTime;

use crate::engine::UsageEngine;

/// Close every month in `[from, through)`, oldest first. Stops at the first
/// failure so the caller retries from the month that failed; returns the
/// first month still awaiting close. A process that slept across several
/// boundaries rolls every elapsed month over, not just the latest.
pub async fn close_elapsed_months(
    engine: &UsageEngine,
    mut from: MonthYear,
    through: MonthYear,
) -> MonthYear {
    while from < through {
        match engine.close_month_for_all(from).await {
            Ok(closed) => {
                tracing::info!(month = %from, closed, "month close finished");
                from = from.next();
            }
            Err(e) => {
                tracing::error!(month = %from, error = %e, "month close failed, will retry");
                break;
            }
        }
    }
    from
}

/// Spawn the month-close job. It watches the wall clock and, whenever the
/// calendar month changes, closes every month that has ended since the last
/// successful run. `close_month` re-derives its carryover on every run, so
/// re-running after a crash near the boundary is harmless.
pub fn spawn_month_close(
    engine: Arc<UsageEngine>,
    check_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut current = MonthYear::containing(OffsetDateTime::now_utc().date());
        let mut ticker = tokio::time::interval(check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let observed = MonthYear::containing(OffsetDateTime::now_utc().date());
            if observed == current {
                continue;
            }

            tracing::info!(from = %current, to = %observed, "month boundary reached, running close");
            current = close_elapsed_months(&engine, current, observed).await;
        }
    })
}
