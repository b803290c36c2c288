use sqlx::PgPool;

use crate::domain::{MonthlyLimit, PowerLimitSettings};
use crate::error::StoreError;

pub async fn get_monthly_limit(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<MonthlyLimit>, StoreError> {
    let row = sqlx::query_as::<_, MonthlyLimit>(
        r#"
        SELECT user_id, monthly_limit_kwh
        FROM monthly_limits
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn upsert_monthly_limit(
    pool: &PgPool,
    user_id: i64,
    monthly_limit_kwh: f64,
) -> Result<MonthlyLimit, StoreError> {
    let row = sqlx::query_as::<_, MonthlyLimit>(
        r#"
        INSERT INTO monthly_limits (user_id, monthly_limit_kwh)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET monthly_limit_kwh = EXCLUDED.monthly_limit_kwh,
                      updated_at = now()
        RETURNING user_id, monthly_limit_kwh
        "#,
    )
    .bind(user_id)
    .bind(monthly_limit_kwh)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_power_settings(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<PowerLimitSettings>, StoreError> {
    let row = sqlx::query_as::<_, PowerLimitSettings>(
        r#"
        SELECT user_id, daily_power_limit_watts, alert_threshold
        FROM power_limit_settings
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn upsert_power_limit(
    pool: &PgPool,
    user_id: i64,
    daily_power_limit_watts: f64,
) -> Result<PowerLimitSettings, StoreError> {
    let row = sqlx::query_as::<_, PowerLimitSettings>(
        r#"
        INSERT INTO power_limit_settings (user_id, daily_power_limit_watts, alert_threshold)
        VALUES ($1, $2, 0.75)
        ON CONFLICT (user_id)
        DO UPDATE SET daily_power_limit_watts = EXCLUDED.daily_power_limit_watts,
                      updated_at = now()
        RETURNING user_id, daily_power_limit_watts, alert_threshold
        "#,
    )
    .bind(user_id)
    .bind(daily_power_limit_watts)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
