use sqlx::PgPool;
use time::Date;

use crate::domain::DailyUsageRecord;
use crate::error::StoreError;

/// Replace-upsert of the running total for one (user, day). The stored value
/// is overwritten, not added to; the caller supplies the day's cumulative
/// total. The conflict target makes the write atomic under concurrent
/// reporters for the same key.
pub async fn upsert_daily_total(
    pool: &PgPool,
    user_id: i64,
    usage_date: Date,
    total_kwh: f64,
) -> Result<DailyUsageRecord, StoreError> {
    let row = sqlx::query_as::<_, DailyUsageRecord>(
        r#"
        INSERT INTO daily_usage (user_id, usage_date, total_kwh)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, usage_date)
        DO UPDATE SET total_kwh = EXCLUDED.total_kwh
        RETURNING user_id, usage_date, total_kwh
        "#,
    )
    .bind(user_id)
    .bind(usage_date)
    .bind(total_kwh)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Sum of daily totals within `[start, end]` inclusive.
pub async fn sum_daily_range(
    pool: &PgPool,
    user_id: i64,
    start: Date,
    end: Date,
) -> Result<f64, StoreError> {
    let row: (f64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total_kwh), 0)
        FROM daily_usage
        WHERE user_id = $1
          AND usage_date >= $2
          AND usage_date <= $3
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Daily rows on or after `start`, newest first. Feeds the trend endpoint.
pub async fn daily_totals_since(
    pool: &PgPool,
    user_id: i64,
    start: Date,
) -> Result<Vec<DailyUsageRecord>, StoreError> {
    let rows = sqlx::query_as::<_, DailyUsageRecord>(
        r#"
        SELECT user_id, usage_date, total_kwh
        FROM daily_usage
        WHERE user_id = $1
          AND usage_date >= $2
        ORDER BY usage_date DESC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
