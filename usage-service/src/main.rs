use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use usage_service::{
    config::AppConfig,
    engine::UsageEngine,
    observability,
    outbox::{AlertEvent, AlertOutbox},
    scheduler,
    server,
    store::PgStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        observability::init_metrics(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .acquire_timeout(Duration::from_millis(cfg.database.acquire_timeout_ms))
        .connect(&cfg.database.uri)
        .await?;
    ledger_client::db::ensure_schema(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    let (outbox, mut alert_rx) = AlertOutbox::new(store.clone(), cfg.policy.outbox_capacity);
    let engine = Arc::new(UsageEngine::new(store, outbox, cfg.policy.clone()));

    // Drain the outbox for the delivery collaborator. Delivery itself lives
    // outside this service; here every event is surfaced on the log stream.
    tokio::spawn(async move {
        while let Some(event) = alert_rx.recv().await {
            match event {
                AlertEvent::Usage { alert, severity } => {
                    tracing::info!(
                        user_id = alert.user_id,
                        threshold = alert.threshold_percentage,
                        severity = severity.as_str(),
                        message = %alert.message,
                        "usage alert ready for delivery"
                    );
                }
                AlertEvent::Anomaly(event) => {
                    tracing::info!(
                        user_id = event.user_id,
                        kind = event.kind.as_str(),
                        severity = event.severity.as_str(),
                        message = %event.message,
                        "anomaly event ready for delivery"
                    );
                }
            }
        }
    });

    scheduler::spawn_month_close(
        engine.clone(),
        Duration::from_secs(cfg.policy.close_check_interval_secs),
    );

    server::serve(engine, &cfg.http.bind_addr).await
}
