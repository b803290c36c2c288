use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::month::MonthYear;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Approaching,
    Exceeded,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Approaching => "approaching",
            AlertType::Exceeded => "exceeded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approaching" => Some(AlertType::Approaching),
            "exceeded" => Some(AlertType::Exceeded),
            _ => None,
        }
    }
}

/// Which limit axis an alert belongs to. Monthly-energy idempotency is
/// scoped per calendar month and must not be consumed by power alerts that
/// happen to share a rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertScope {
    Monthly,
    Power,
}

impl AlertScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertScope::Monthly => "monthly",
            AlertScope::Power => "power",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(AlertScope::Monthly),
            "power" => Some(AlertScope::Power),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// One raised threshold alert. Append-only; `is_resolved` flips once the
/// delivery side acknowledges it. `month` is the ledger month the alert was
/// raised for, which can differ from `created_at`'s month when a daily total
/// is reported after the boundary; monthly-rung idempotency keys on `month`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAlert {
    pub id: i64,
    pub user_id: i64,
    pub scope: AlertScope,
    pub month: MonthYear,
    pub alert_type: AlertType,
    pub threshold_percentage: i32,
    pub current_usage: f64,
    pub limit_kwh: f64,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_resolved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    VoltageAnomaly,
    PeakHourUsage,
    OverloadRisk,
    UnusualPattern,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::VoltageAnomaly => "voltage_anomaly",
            AnomalyKind::PeakHourUsage => "peak_hour_usage",
            AnomalyKind::OverloadRisk => "overload_risk",
            AnomalyKind::UnusualPattern => "unusual_pattern",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "voltage_anomaly" => Some(AnomalyKind::VoltageAnomaly),
            "peak_hour_usage" => Some(AnomalyKind::PeakHourUsage),
            "overload_risk" => Some(AnomalyKind::OverloadRisk),
            "unusual_pattern" => Some(AnomalyKind::UnusualPattern),
            _ => None,
        }
    }
}

/// Advisory observation from the anomaly detector. Never part of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub user_id: i64,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub message: String,
    pub tip: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
    pub context: serde_json::Value,
}
