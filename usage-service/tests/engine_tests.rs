use std::sync::Arc;

use ledger_client::domain::{AlertScope, Severity};
use ledger_client::MonthYear;
use time::macros::{date, datetime};
use tokio::sync::mpsc;
use usage_service::config::PolicyConfig;
use usage_service::engine::UsageEngine;
use usage_service::ingest::RawSample;
use usage_service::outbox::{AlertEvent, AlertOutbox};
use usage_service::scheduler;
use usage_service::store::{MemoryStore, UsageStore};

fn make_engine() -> (UsageEngine, Arc<MemoryStore>, mpsc::Receiver<AlertEvent>) {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn UsageStore> = store.clone();
    let (outbox, rx) = AlertOutbox::new(dyn_store.clone(), 64);
    let engine = UsageEngine::new(dyn_store, outbox, PolicyConfig::default());
    (engine, store, rx)
}

fn sample(user_id: i64, power: f64, energy: f64, ts: time::OffsetDateTime) -> RawSample {
    RawSample {
        user_id: Some(user_id),
        power: Some(power),
        voltage: Some(230.0),
        current: Some(power / 230.0),
        energy: Some(energy),
        power_factor: Some(0.95),
        frequency: Some(50.0),
        temperature: Some(31.0),
        timestamp: Some(ts),
    }
}

#[tokio::test]
async fn recompute_is_idempotent_and_order_independent() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-20 10:00:00 UTC);

    // Days reported out of order, with the first day's total replaced twice.
    engine
        .record_daily_total(1, date!(2025 - 07 - 12), 7.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 10), 3.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 10), 4.0, now)
        .await
        .unwrap();
    let record = engine
        .record_daily_total(1, date!(2025 - 07 - 10), 5.0, now)
        .await
        .unwrap();

    // Latest total per day: 5 + 7.
    assert!((record.consumed_kwh - 12.0).abs() < 1e-9);

    // A redundant recompute converges on the same value.
    let again = engine
        .record_daily_total(1, date!(2025 - 07 - 12), 7.0, now)
        .await
        .unwrap();
    assert!((again.consumed_kwh - 12.0).abs() < 1e-9);
}

#[tokio::test]
async fn carryover_halves_unused_quota_and_zeroes_on_excess() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-06-30 23:00:00 UTC);
    let june: MonthYear = "2025-06".parse().unwrap();

    engine.set_monthly_limit(1, 300.0).await.unwrap();
    engine
        .record_daily_total(1, date!(2025 - 06 - 15), 200.0, now)
        .await
        .unwrap();
    let carry = engine.close_month(1, june).await.unwrap();
    assert!((carry - 50.0).abs() < 1e-9);

    // The next month opens with the carryover added to the allocation.
    let next = engine
        .monthly_summary(1, Some("2025-07".parse().unwrap()), now)
        .await
        .unwrap();
    assert!((next.allocated - 350.0).abs() < 1e-9);
    assert!((next.carryover_from_previous - 50.0).abs() < 1e-9);

    // An exceeded month carries nothing forward.
    engine.set_monthly_limit(2, 300.0).await.unwrap();
    engine
        .record_daily_total(2, date!(2025 - 06 - 15), 350.0, now)
        .await
        .unwrap();
    let carry = engine.close_month(2, june).await.unwrap();
    assert_eq!(carry, 0.0);
}

#[tokio::test]
async fn close_month_is_idempotent() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-06-30 23:00:00 UTC);
    let june: MonthYear = "2025-06".parse().unwrap();

    engine.set_monthly_limit(1, 300.0).await.unwrap();
    engine
        .record_daily_total(1, date!(2025 - 06 - 15), 200.0, now)
        .await
        .unwrap();

    let first = engine.close_month(1, june).await.unwrap();
    let second = engine.close_month(1, june).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn power_check_fires_highest_rung_at_or_below() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-03 14:00:00 UTC);

    engine.set_power_limit(1, 1000.0).await.unwrap();

    let recorded = engine.record_reading(sample(1, 950.0, 0.5, now), now).await.unwrap();
    let fired = recorded.power_alert.expect("950W of 1000W should alert");
    assert_eq!(fired.threshold, 90);
    assert_eq!(fired.severity, Severity::High);

    let recorded = engine.record_reading(sample(1, 1000.0, 0.6, now), now).await.unwrap();
    let fired = recorded.power_alert.expect("1000W of 1000W should alert");
    assert_eq!(fired.threshold, 100);
    assert_eq!(fired.severity, Severity::Critical);

    let recorded = engine.record_reading(sample(1, 400.0, 0.7, now), now).await.unwrap();
    assert!(recorded.power_alert.is_none());
}

#[tokio::test]
async fn power_limit_defaults_to_5000_watts() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-03 14:00:00 UTC);

    // 2400W of the default 5000W limit is 48%: below the ladder.
    let recorded = engine.record_reading(sample(9, 2400.0, 0.1, now), now).await.unwrap();
    assert!(recorded.power_alert.is_none());

    // 2500W is exactly 50%.
    let recorded = engine.record_reading(sample(9, 2500.0, 0.2, now), now).await.unwrap();
    let fired = recorded.power_alert.unwrap();
    assert_eq!(fired.threshold, 50);
    assert_eq!(fired.severity, Severity::Warning);
}

#[tokio::test]
async fn monthly_thresholds_fire_ascending_and_only_once() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-05-10 12:00:00 UTC);

    engine.set_monthly_limit(1, 20.0).await.unwrap();

    // One jump from 0% to 125% emits every unrecorded rung, ascending.
    let record = engine
        .record_daily_total(1, date!(2025 - 05 - 10), 25.0, now)
        .await
        .unwrap();
    assert!(record.exceeded);

    let alerts = engine.recent_alerts(1, 50).await.unwrap();
    let monthly: Vec<i32> = alerts
        .iter()
        .filter(|a| a.scope == AlertScope::Monthly)
        .map(|a| a.threshold_percentage)
        .collect();
    // recent_alerts is newest-first.
    assert_eq!(monthly, vec![100, 90, 75, 50]);

    // Re-running the check in the same month raises nothing new.
    engine
        .record_daily_total(1, date!(2025 - 05 - 10), 26.0, now)
        .await
        .unwrap();
    let alerts = engine.recent_alerts(1, 50).await.unwrap();
    let exceeded_count = alerts
        .iter()
        .filter(|a| a.scope == AlertScope::Monthly && a.threshold_percentage == 100)
        .count();
    assert_eq!(exceeded_count, 1);
    assert_eq!(
        alerts
            .iter()
            .filter(|a| a.scope == AlertScope::Monthly)
            .count(),
        4
    );

    // The exceeded flag stays latched.
    let summary = engine
        .monthly_summary(1, Some("2025-05".parse().unwrap()), now)
        .await
        .unwrap();
    assert!(summary.exceeded);
}

#[tokio::test]
async fn regressing_below_a_rung_raises_no_duplicate_on_recross() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-05-10 12:00:00 UTC);

    engine.set_monthly_limit(1, 20.0).await.unwrap();

    engine
        .record_daily_total(1, date!(2025 - 05 - 10), 19.0, now)
        .await
        .unwrap(); // 95%: 50, 75, 90
    engine
        .record_daily_total(1, date!(2025 - 05 - 10), 10.0, now)
        .await
        .unwrap(); // back to 50%
    engine
        .record_daily_total(1, date!(2025 - 05 - 10), 19.0, now)
        .await
        .unwrap(); // 95% again

    let alerts = engine.recent_alerts(1, 50).await.unwrap();
    assert_eq!(
        alerts
            .iter()
            .filter(|a| a.scope == AlertScope::Monthly)
            .count(),
        3
    );
}

#[tokio::test]
async fn late_reported_day_keeps_rungs_scoped_to_its_ledger_month() {
    let (engine, _store, _rx) = make_engine();
    // July's last day arrives after the month boundary.
    let now = datetime!(2025-08-01 06:00:00 UTC);
    let july: MonthYear = "2025-07".parse().unwrap();
    let august: MonthYear = "2025-08".parse().unwrap();

    engine.set_monthly_limit(1, 20.0).await.unwrap();

    engine
        .record_daily_total(1, date!(2025 - 07 - 31), 19.0, now)
        .await
        .unwrap(); // 95% of July
    engine
        .record_daily_total(1, date!(2025 - 07 - 31), 19.0, now)
        .await
        .unwrap(); // redundant late recompute

    let alerts = engine.recent_alerts(1, 50).await.unwrap();
    let july_rungs: Vec<i32> = alerts
        .iter()
        .filter(|a| a.scope == AlertScope::Monthly && a.month == july)
        .map(|a| a.threshold_percentage)
        .collect();
    assert_eq!(july_rungs, vec![90, 75, 50]);

    // The new month still gets its own ladder, undisturbed by the
    // August-stamped alerts raised for July.
    engine
        .record_daily_total(1, date!(2025 - 08 - 02), 11.0, now + time::Duration::days(1))
        .await
        .unwrap(); // 55% of August
    let alerts = engine.recent_alerts(1, 50).await.unwrap();
    let august_rungs: Vec<i32> = alerts
        .iter()
        .filter(|a| a.scope == AlertScope::Monthly && a.month == august)
        .map(|a| a.threshold_percentage)
        .collect();
    assert_eq!(august_rungs, vec![50]);
}

#[tokio::test]
async fn notification_flag_compare_and_set_admits_one_winner() {
    let (_engine, store, _rx) = make_engine();
    let month: MonthYear = "2025-05".parse().unwrap();

    let record = ledger_client::domain::MonthlyUsageRecord::open(1, month, 20.0, 0.0);
    store.insert_monthly_usage(&record).await.unwrap();

    assert!(store.try_mark_notification_sent(1, month).await.unwrap());
    assert!(!store.try_mark_notification_sent(1, month).await.unwrap());
}

#[tokio::test]
async fn unset_monthly_limit_defaults_to_300() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-08-02 09:00:00 UTC);

    let summary = engine.monthly_summary(3, None, now).await.unwrap();
    assert_eq!(summary.allocated, 300.0);
    assert_eq!(summary.consumed, 0.0);
    assert_eq!(summary.month, "2025-08");

    assert_eq!(engine.monthly_limit(3).await.unwrap(), 300.0);
}

#[tokio::test]
async fn end_to_end_three_days_hit_ninety_percent_exactly_once() {
    let (engine, _store, mut rx) = make_engine();
    let now = datetime!(2025-07-05 12:00:00 UTC);

    engine.set_monthly_limit(1, 20.0).await.unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 01), 5.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 02), 7.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 03), 6.0, now)
        .await
        .unwrap();

    let summary = engine
        .monthly_summary(1, Some("2025-07".parse().unwrap()), now)
        .await
        .unwrap();
    assert!((summary.consumed - 18.0).abs() < 1e-9);
    assert!((summary.remaining - 2.0).abs() < 1e-9);
    assert!(!summary.exceeded);
    assert!((summary.usage_percentage - 90.0).abs() < 1e-9);

    let alerts = engine.recent_alerts(1, 50).await.unwrap();
    let rungs: Vec<i32> = alerts
        .iter()
        .filter(|a| a.scope == AlertScope::Monthly)
        .map(|a| a.threshold_percentage)
        .collect();
    assert_eq!(rungs.iter().filter(|t| **t == 90).count(), 1);
    assert!(!rungs.contains(&100));

    // Every fired alert reached the outbox stream for the delivery side.
    let mut streamed = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            AlertEvent::Usage { .. } => streamed += 1,
            AlertEvent::Anomaly(_) => {}
        }
    }
    assert_eq!(streamed, rungs.len());
}

#[tokio::test]
async fn ingest_rejects_sample_without_power() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-03 14:00:00 UTC);

    let raw = RawSample {
        power: None,
        ..sample(1, 0.0, 0.0, now)
    };
    let err = engine.record_reading(raw, now).await.unwrap_err();
    assert!(matches!(err, usage_service::EngineError::Validation(_)));
}

#[tokio::test]
async fn reading_updates_daily_and_monthly_ledgers() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-03 14:00:00 UTC);

    // The sample's cumulative energy is the day's running total.
    let recorded = engine.record_reading(sample(1, 300.0, 2.5, now), now).await.unwrap();
    assert_eq!(recorded.daily.usage_date, date!(2025 - 07 - 03));
    assert!((recorded.daily.total_kwh - 2.5).abs() < 1e-9);
    assert!((recorded.monthly.consumed_kwh - 2.5).abs() < 1e-9);

    let later = engine
        .record_reading(sample(1, 300.0, 4.0, now + time::Duration::hours(2)), now)
        .await
        .unwrap();
    assert!((later.monthly.consumed_kwh - 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn daily_stats_cover_window() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-10 12:00:00 UTC);

    engine
        .record_daily_total(1, date!(2025 - 07 - 07), 4.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 08), 8.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 09), 6.0, now)
        .await
        .unwrap();

    let stats = engine.daily_stats(1, 30, now.date()).await.unwrap();
    assert_eq!(stats.total_days, 3);
    assert!((stats.average_daily - 6.0).abs() < 1e-9);
    assert_eq!(stats.max_daily, 8.0);
    assert_eq!(stats.min_daily, 4.0);
    assert_eq!(stats.trend[0].usage_date, date!(2025 - 07 - 09));
}

#[tokio::test]
async fn forecast_projects_weekly_average_over_remaining_days() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-28 12:00:00 UTC);

    engine.set_monthly_limit(1, 100.0).await.unwrap();
    for day in 22..=27 {
        engine
            .record_daily_total(
                1,
                time::Date::from_calendar_date(2025, time::Month::July, day).unwrap(),
                6.0,
                now,
            )
            .await
            .unwrap();
    }

    let forecast = engine.usage_forecast(1, now).await.unwrap();
    assert!((forecast.average_daily_usage - 6.0).abs() < 1e-9);
    assert_eq!(forecast.remaining_days_in_month, 3);
    assert!((forecast.current_consumption - 36.0).abs() < 1e-9);
    assert!((forecast.projected_usage - 54.0).abs() < 1e-9);
    assert!(!forecast.will_exceed);
}

#[tokio::test]
async fn close_month_for_all_only_touches_active_users() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-06-20 12:00:00 UTC);
    let june: MonthYear = "2025-06".parse().unwrap();

    engine
        .record_daily_total(1, date!(2025 - 06 - 10), 10.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(2, date!(2025 - 06 - 11), 20.0, now)
        .await
        .unwrap();

    let closed = engine.close_month_for_all(june).await.unwrap();
    assert_eq!(closed, 2);
}

#[tokio::test]
async fn catch_up_closes_every_elapsed_month() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-07-20 12:00:00 UTC);
    let june: MonthYear = "2025-06".parse().unwrap();
    let august: MonthYear = "2025-08".parse().unwrap();

    engine.set_monthly_limit(1, 300.0).await.unwrap();
    engine
        .record_daily_total(1, date!(2025 - 06 - 10), 100.0, now)
        .await
        .unwrap();
    engine
        .record_daily_total(1, date!(2025 - 07 - 10), 140.0, now)
        .await
        .unwrap();

    // The process slept from June into August; both elapsed months roll over.
    let resumed = scheduler::close_elapsed_months(&engine, june, august).await;
    assert_eq!(resumed, august);

    let june_summary = engine.monthly_summary(1, Some(june), now).await.unwrap();
    assert!((june_summary.carryover_to_next - 100.0).abs() < 1e-9);
    let july_summary = engine
        .monthly_summary(1, Some("2025-07".parse().unwrap()), now)
        .await
        .unwrap();
    assert!((july_summary.carryover_to_next - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn resolve_alert_flips_flag_once() {
    let (engine, _store, _rx) = make_engine();
    let now = datetime!(2025-05-10 12:00:00 UTC);

    engine.set_monthly_limit(1, 10.0).await.unwrap();
    engine
        .record_daily_total(1, date!(2025 - 05 - 10), 6.0, now)
        .await
        .unwrap(); // 60%: fires the 50 rung

    let alerts = engine.recent_alerts(1, 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(!alerts[0].is_resolved);

    assert!(engine.resolve_alert(alerts[0].id).await.unwrap());
    let alerts = engine.recent_alerts(1, 10).await.unwrap();
    assert!(alerts[0].is_resolved);

    assert!(!engine.resolve_alert(9999).await.unwrap());
}
