use sqlx::PgPool;

use crate::domain::MonthlyUsageRecord;
use crate::error::StoreError;
use crate::month::MonthYear;

#[derive(Debug, sqlx::FromRow)]
struct MonthlyUsageRow {
    user_id: i64,
    month_year: String,
    allocated_kwh: f64,
    consumed_kwh: f64,
    remaining_kwh: f64,
    carryover_from_previous: f64,
    carryover_to_next: f64,
    exceeded: bool,
    excess_amount: f64,
    notification_sent: bool,
}

impl MonthlyUsageRow {
    fn into_record(self) -> Result<MonthlyUsageRecord, StoreError> {
        let month: MonthYear = self
            .month_year
            .parse()
            .map_err(|e| StoreError::Persistence(format!("corrupt month key: {e}")))?;

        Ok(MonthlyUsageRecord {
            user_id: self.user_id,
            month,
            allocated_kwh: self.allocated_kwh,
            consumed_kwh: self.consumed_kwh,
            remaining_kwh: self.remaining_kwh,
            carryover_from_previous: self.carryover_from_previous,
            carryover_to_next: self.carryover_to_next,
            exceeded: self.exceeded,
            excess_amount: self.excess_amount,
            notification_sent: self.notification_sent,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
        SELECT user_id, month_year, allocated_kwh, consumed_kwh, remaining_kwh,
               carryover_from_previous, carryover_to_next, exceeded,
               excess_amount, notification_sent
        FROM monthly_usage
"#;

pub async fn get_monthly(
    pool: &PgPool,
    user_id: i64,
    month: MonthYear,
) -> Result<Option<MonthlyUsageRecord>, StoreError> {
    let sql = format!("{SELECT_COLUMNS} WHERE user_id = $1 AND month_year = $2");
    let row = sqlx::query_as::<_, MonthlyUsageRow>(&sql)
        .bind(user_id)
        .bind(month.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(MonthlyUsageRow::into_record).transpose()
}

/// Insert a freshly opened record. A concurrent creator for the same key wins
/// the unique constraint; the loser falls back to a plain read.
pub async fn insert_monthly(
    pool: &PgPool,
    record: &MonthlyUsageRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO monthly_usage
            (user_id, month_year, allocated_kwh, consumed_kwh, remaining_kwh,
             carryover_from_previous, carryover_to_next, exceeded,
             excess_amount, notification_sent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id, month_year) DO NOTHING
        "#,
    )
    .bind(record.user_id)
    .bind(record.month.to_string())
    .bind(record.allocated_kwh)
    .bind(record.consumed_kwh)
    .bind(record.remaining_kwh)
    .bind(record.carryover_from_previous)
    .bind(record.carryover_to_next)
    .bind(record.exceeded)
    .bind(record.excess_amount)
    .bind(record.notification_sent)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write the consumption-derived fields. Racing writers converge because both
/// derive the same values from the same daily rows.
pub async fn update_consumption(
    pool: &PgPool,
    record: &MonthlyUsageRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE monthly_usage
        SET consumed_kwh = $1,
            remaining_kwh = $2,
            exceeded = $3,
            excess_amount = $4,
            updated_at = now()
        WHERE user_id = $5 AND month_year = $6
        "#,
    )
    .bind(record.consumed_kwh)
    .bind(record.remaining_kwh)
    .bind(record.exceeded)
    .bind(record.excess_amount)
    .bind(record.user_id)
    .bind(record.month.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_carryover(
    pool: &PgPool,
    user_id: i64,
    month: MonthYear,
    carryover_to_next: f64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE monthly_usage
        SET carryover_to_next = $1,
            updated_at = now()
        WHERE user_id = $2 AND month_year = $3
        "#,
    )
    .bind(carryover_to_next)
    .bind(user_id)
    .bind(month.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Compare-and-set on `notification_sent`. Returns true only for the single
/// caller that flipped the flag, so two racing recomputes cannot both fire
/// the exceeded notification.
pub async fn try_mark_notification_sent(
    pool: &PgPool,
    user_id: i64,
    month: MonthYear,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE monthly_usage
        SET notification_sent = true,
            updated_at = now()
        WHERE user_id = $1 AND month_year = $2 AND notification_sent = false
        "#,
    )
    .bind(user_id)
    .bind(month.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Users that have a ledger record for the given month. Drives month close.
pub async fn user_ids_for_month(
    pool: &PgPool,
    month: MonthYear,
) -> Result<Vec<i64>, StoreError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT user_id FROM monthly_usage WHERE month_year = $1 ORDER BY user_id
        "#,
    )
    .bind(month.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
