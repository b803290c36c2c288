pub mod alert_queries;
pub mod daily_usage_queries;
pub mod limit_queries;
pub mod monthly_usage_queries;
pub mod reading_queries;

use sqlx::PgPool;

use crate::error::StoreError;

/// Create every table the engine needs if it does not already exist. Safe to
/// run at every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS energy_readings (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            voltage DOUBLE PRECISION NOT NULL,
            current DOUBLE PRECISION NOT NULL,
            power DOUBLE PRECISION NOT NULL,
            energy DOUBLE PRECISION NOT NULL,
            power_factor DOUBLE PRECISION NOT NULL,
            frequency DOUBLE PRECISION NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            recorded_at TIMESTAMPTZ NOT NULL
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_energy_readings_user_time
            ON energy_readings (user_id, recorded_at DESC)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS daily_usage (
            user_id BIGINT NOT NULL,
            usage_date DATE NOT NULL,
            total_kwh DOUBLE PRECISION NOT NULL,
            PRIMARY KEY (user_id, usage_date)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS monthly_limits (
            user_id BIGINT PRIMARY KEY,
            monthly_limit_kwh DOUBLE PRECISION NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS power_limit_settings (
            user_id BIGINT PRIMARY KEY,
            daily_power_limit_watts DOUBLE PRECISION NOT NULL,
            alert_threshold DOUBLE PRECISION NOT NULL DEFAULT 0.75,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS monthly_usage (
            user_id BIGINT NOT NULL,
            month_year TEXT NOT NULL,
            allocated_kwh DOUBLE PRECISION NOT NULL,
            consumed_kwh DOUBLE PRECISION NOT NULL,
            remaining_kwh DOUBLE PRECISION NOT NULL,
            carryover_from_previous DOUBLE PRECISION NOT NULL DEFAULT 0,
            carryover_to_next DOUBLE PRECISION NOT NULL DEFAULT 0,
            exceeded BOOLEAN NOT NULL DEFAULT false,
            excess_amount DOUBLE PRECISION NOT NULL DEFAULT 0,
            notification_sent BOOLEAN NOT NULL DEFAULT false,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (user_id, month_year)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS usage_alerts (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            scope TEXT NOT NULL,
            month_year TEXT NOT NULL,
            alert_type TEXT NOT NULL,
            threshold_percentage INTEGER NOT NULL,
            current_usage DOUBLE PRECISION NOT NULL,
            limit_kwh DOUBLE PRECISION NOT NULL,
            message TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            is_resolved BOOLEAN NOT NULL DEFAULT false
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_usage_alerts_user_time
            ON usage_alerts (user_id, created_at DESC)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS anomaly_events (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            message TEXT NOT NULL,
            tip TEXT,
            detected_at TIMESTAMPTZ NOT NULL,
            context JSONB NOT NULL DEFAULT '{}'::jsonb
        )
        "#,
    ];

    for stmt in statements {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
