use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ledger_client::{MonthYear, StoreError};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::engine::UsageEngine;
use crate::error::EngineError;
use crate::ingest::RawSample;

type AppState = Arc<UsageEngine>;

pub fn router(engine: AppState) -> Router {
    Router::new()
        .route("/ingest/reading", post(ingest_reading))
        .route("/usage/:user_id/summary", get(monthly_summary))
        .route("/usage/:user_id/daily-stats", get(daily_stats))
        .route("/usage/:user_id/forecast", get(usage_forecast))
        .route("/usage/:user_id/alerts", get(recent_alerts))
        .route("/usage/limits/monthly", post(set_monthly_limit))
        .route("/usage/limits/power", post(set_power_limit))
        .route("/usage/alerts/resolve", post(resolve_alert))
        .route("/anomaly/check", post(check_anomalies))
        .with_state(engine)
}

/// Bind and serve the engine's HTTP surface until the process exits.
pub async fn serve(engine: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "usage service listening");
    axum::serve(listener, router(engine).into_make_service()).await?;
    Ok(())
}

fn engine_status(e: &EngineError) -> StatusCode {
    match e {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Store(s) => store_status(s),
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn ingest_reading(
    State(engine): State<AppState>,
    Json(raw): Json<RawSample>,
) -> Result<Json<crate::engine::RecordedReading>, (StatusCode, String)> {
    metrics::counter!("http_ingest_requests_total").increment(1);

    let recorded = engine
        .record_reading(raw, OffsetDateTime::now_utc())
        .await
        .map_err(|e| {
            metrics::counter!("http_ingest_failed_total").increment(1);
            (engine_status(&e), e.to_string())
        })?;

    Ok(Json(recorded))
}

#[derive(Deserialize)]
struct SummaryQuery {
    month: Option<String>,
}

async fn monthly_summary(
    State(engine): State<AppState>,
    Path(user_id): Path<i64>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<ledger_client::domain::MonthlySummary>, (StatusCode, String)> {
    let month = match q.month {
        Some(raw) => Some(
            raw.parse::<MonthYear>()
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        ),
        None => None,
    };

    let summary = engine
        .monthly_summary(user_id, month, OffsetDateTime::now_utc())
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    Ok(Json(summary))
}

#[derive(Deserialize)]
struct DailyStatsQuery {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    30
}

async fn daily_stats(
    State(engine): State<AppState>,
    Path(user_id): Path<i64>,
    Query(q): Query<DailyStatsQuery>,
) -> Result<Json<crate::engine::DailyStats>, (StatusCode, String)> {
    let stats = engine
        .daily_stats(user_id, q.days, OffsetDateTime::now_utc().date())
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    Ok(Json(stats))
}

async fn usage_forecast(
    State(engine): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<crate::engine::UsageForecast>, (StatusCode, String)> {
    let forecast = engine
        .usage_forecast(user_id, OffsetDateTime::now_utc())
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    Ok(Json(forecast))
}

#[derive(Deserialize)]
struct AlertsQuery {
    #[serde(default = "default_alert_limit")]
    limit: usize,
}

fn default_alert_limit() -> usize {
    10
}

async fn recent_alerts(
    State(engine): State<AppState>,
    Path(user_id): Path<i64>,
    Query(q): Query<AlertsQuery>,
) -> Result<Json<Vec<ledger_client::domain::UsageAlert>>, (StatusCode, String)> {
    let alerts = engine
        .recent_alerts(user_id, q.limit)
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    Ok(Json(alerts))
}

#[derive(Deserialize)]
struct MonthlyLimitBody {
    user_id: i64,
    limit_kwh: f64,
}

async fn set_monthly_limit(
    State(engine): State<AppState>,
    Json(body): Json<MonthlyLimitBody>,
) -> Result<Json<ledger_client::domain::MonthlyLimit>, (StatusCode, String)> {
    let limit = engine
        .set_monthly_limit(body.user_id, body.limit_kwh)
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    Ok(Json(limit))
}

#[derive(Deserialize)]
struct PowerLimitBody {
    user_id: i64,
    daily_limit_watts: f64,
}

async fn set_power_limit(
    State(engine): State<AppState>,
    Json(body): Json<PowerLimitBody>,
) -> Result<Json<ledger_client::domain::PowerLimitSettings>, (StatusCode, String)> {
    let settings = engine
        .set_power_limit(body.user_id, body.daily_limit_watts)
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    Ok(Json(settings))
}

#[derive(Deserialize)]
struct ResolveAlertBody {
    alert_id: i64,
}

async fn resolve_alert(
    State(engine): State<AppState>,
    Json(body): Json<ResolveAlertBody>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let resolved = engine
        .resolve_alert(body.alert_id)
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    if resolved {
        Ok(Json(serde_json::json!({ "resolved": true })))
    } else {
        Err((StatusCode::NOT_FOUND, "alert not found".to_string()))
    }
}

#[derive(Deserialize)]
struct AnomalyCheckBody {
    user_id: i64,
    voltage: f64,
    current: f64,
    power: f64,
}

async fn check_anomalies(
    State(engine): State<AppState>,
    Json(body): Json<AnomalyCheckBody>,
) -> Json<crate::anomaly::AnomalyReport> {
    let report = engine
        .check_anomalies(
            body.user_id,
            body.voltage,
            body.current,
            body.power,
            OffsetDateTime::now_utc(),
        )
        .await;

    Json(report)
}
