use serde::{Deserialize, Serialize};

/// Fallback monthly energy allocation when a user has never set a limit.
pub const DEFAULT_MONTHLY_LIMIT_KWH: f64 = 300.0;

/// Fallback instantaneous power ceiling.
pub const DEFAULT_DAILY_POWER_LIMIT_WATTS: f64 = 5000.0;

/// Fallback fraction of the power limit at which warnings start.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.75;

/// Per-user monthly energy allowance, one row per user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyLimit {
    pub user_id: i64,
    pub monthly_limit_kwh: f64,
}

/// Per-user instantaneous power policy, distinct from the monthly energy
/// limit. Governs per-reading power alerts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PowerLimitSettings {
    pub user_id: i64,
    pub daily_power_limit_watts: f64,
    pub alert_threshold: f64,
}

impl PowerLimitSettings {
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            daily_power_limit_watts: DEFAULT_DAILY_POWER_LIMIT_WATTS,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}
