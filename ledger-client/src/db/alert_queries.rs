use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{AlertScope, AlertType, AnomalyEvent, UsageAlert};
use crate::error::StoreError;
use crate::month::MonthYear;

#[derive(Debug, sqlx::FromRow)]
struct UsageAlertRow {
    id: i64,
    user_id: i64,
    scope: String,
    month_year: String,
    alert_type: String,
    threshold_percentage: i32,
    current_usage: f64,
    limit_kwh: f64,
    message: String,
    created_at: OffsetDateTime,
    is_resolved: bool,
}

impl UsageAlertRow {
    fn into_alert(self) -> Result<UsageAlert, StoreError> {
        let scope = AlertScope::parse(&self.scope).ok_or_else(|| {
            StoreError::Persistence(format!("unknown alert scope '{}'", self.scope))
        })?;
        let month: MonthYear = self
            .month_year
            .parse()
            .map_err(|e| StoreError::Persistence(format!("corrupt month key: {e}")))?;
        let alert_type = AlertType::parse(&self.alert_type).ok_or_else(|| {
            StoreError::Persistence(format!("unknown alert type '{}'", self.alert_type))
        })?;

        Ok(UsageAlert {
            id: self.id,
            user_id: self.user_id,
            scope,
            month,
            alert_type,
            threshold_percentage: self.threshold_percentage,
            current_usage: self.current_usage,
            limit_kwh: self.limit_kwh,
            message: self.message,
            created_at: self.created_at,
            is_resolved: self.is_resolved,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
        SELECT id, user_id, scope, month_year, alert_type, threshold_percentage,
               current_usage, limit_kwh, message, created_at, is_resolved
        FROM usage_alerts
"#;

#[allow(clippy::too_many_arguments)]
pub async fn insert_alert(
    pool: &PgPool,
    user_id: i64,
    scope: AlertScope,
    month: MonthYear,
    alert_type: AlertType,
    threshold_percentage: i32,
    current_usage: f64,
    limit_kwh: f64,
    message: &str,
    created_at: OffsetDateTime,
) -> Result<UsageAlert, StoreError> {
    let row = sqlx::query_as::<_, UsageAlertRow>(
        r#"
        INSERT INTO usage_alerts
            (user_id, scope, month_year, alert_type, threshold_percentage,
             current_usage, limit_kwh, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, user_id, scope, month_year, alert_type,
                  threshold_percentage, current_usage, limit_kwh, message,
                  created_at, is_resolved
        "#,
    )
    .bind(user_id)
    .bind(scope.as_str())
    .bind(month.to_string())
    .bind(alert_type.as_str())
    .bind(threshold_percentage)
    .bind(current_usage)
    .bind(limit_kwh)
    .bind(message)
    .bind(created_at)
    .fetch_one(pool)
    .await?;

    row.into_alert()
}

pub async fn recent_alerts(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<UsageAlert>, StoreError> {
    let sql = format!("{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2");
    let rows = sqlx::query_as::<_, UsageAlertRow>(&sql)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(UsageAlertRow::into_alert).collect()
}

/// Distinct monthly-scope ladder rungs already recorded for the user's
/// ledger month. This is the monthly idempotency source: a rung present here
/// is never re-raised for the same month, no matter when the recompute runs.
pub async fn monthly_thresholds_for_month(
    pool: &PgPool,
    user_id: i64,
    month: MonthYear,
) -> Result<Vec<i32>, StoreError> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT threshold_percentage
        FROM usage_alerts
        WHERE user_id = $1
          AND scope = 'monthly'
          AND month_year = $2
        "#,
    )
    .bind(user_id)
    .bind(month.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(t,)| t).collect())
}

pub async fn resolve_alert(pool: &PgPool, alert_id: i64) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE usage_alerts SET is_resolved = true WHERE id = $1
        "#,
    )
    .bind(alert_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_anomaly(pool: &PgPool, event: &AnomalyEvent) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO anomaly_events
            (user_id, kind, severity, message, tip, detected_at, context)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.user_id)
    .bind(event.kind.as_str())
    .bind(event.severity.as_str())
    .bind(&event.message)
    .bind(&event.tip)
    .bind(event.detected_at)
    .bind(&event.context)
    .execute(pool)
    .await?;

    Ok(())
}
