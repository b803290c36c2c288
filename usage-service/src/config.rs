use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

/// Policy defaults applied when a user has never configured a limit, plus
/// the knobs of the alert outbox and the month-close job.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_monthly_limit_kwh")]
    pub default_monthly_limit_kwh: f64,
    #[serde(default = "default_daily_power_limit_watts")]
    pub default_daily_power_limit_watts: f64,
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    #[serde(default = "default_close_check_interval_secs")]
    pub close_check_interval_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_monthly_limit_kwh: default_monthly_limit_kwh(),
            default_daily_power_limit_watts: default_daily_power_limit_watts(),
            outbox_capacity: default_outbox_capacity(),
            close_check_interval_secs: default_close_check_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("USAGE_CONFIG").unwrap_or_else(|_| "usage-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

fn default_acquire_timeout_ms() -> u64 {
    10_000
}

fn default_monthly_limit_kwh() -> f64 {
    ledger_client::domain::limits::DEFAULT_MONTHLY_LIMIT_KWH
}

fn default_daily_power_limit_watts() -> f64 {
    ledger_client::domain::limits::DEFAULT_DAILY_POWER_LIMIT_WATTS
}

fn default_outbox_capacity() -> usize {
    256
}

fn default_close_check_interval_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_policy_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [database]
            uri = "postgres://localhost/usage"
            max_connections = 8

            [http]
            bind_addr = "0.0.0.0:4000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.acquire_timeout_ms, 10_000);
        assert!(cfg.metrics.is_none());
        assert_eq!(cfg.policy.default_monthly_limit_kwh, 300.0);
        assert_eq!(cfg.policy.default_daily_power_limit_watts, 5000.0);
    }
}
