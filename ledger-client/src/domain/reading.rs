use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One normalized sensor sample. Append-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub user_id: i64,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub power_factor: f64,
    pub frequency: f64,
    pub temperature: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}
