use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::Reading;
use crate::error::StoreError;

pub async fn insert_reading(pool: &PgPool, reading: &Reading) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO energy_readings
            (user_id, voltage, current, power, energy, power_factor, frequency, temperature, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(reading.user_id)
    .bind(reading.voltage)
    .bind(reading.current)
    .bind(reading.power)
    .bind(reading.energy)
    .bind(reading.power_factor)
    .bind(reading.frequency)
    .bind(reading.temperature)
    .bind(reading.recorded_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Power values of the newest readings since `since`, newest first, capped
/// at `limit`. Feeds the sustained-overload check.
pub async fn recent_power_since(
    pool: &PgPool,
    user_id: i64,
    since: OffsetDateTime,
    limit: i64,
) -> Result<Vec<f64>, StoreError> {
    let rows: Vec<(f64,)> = sqlx::query_as(
        r#"
        SELECT power
        FROM energy_readings
        WHERE user_id = $1
          AND recorded_at > $2
        ORDER BY recorded_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(p,)| p).collect())
}

/// Mean power over readings since `since`; `None` when there are no rows.
pub async fn avg_power_since(
    pool: &PgPool,
    user_id: i64,
    since: OffsetDateTime,
) -> Result<Option<f64>, StoreError> {
    let row: (Option<f64>,) = sqlx::query_as(
        r#"
        SELECT AVG(power)
        FROM energy_readings
        WHERE user_id = $1
          AND recorded_at > $2
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}
