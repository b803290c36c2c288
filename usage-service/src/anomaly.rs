use std::sync::Arc;
use std::time::Duration;

use ledger_client::domain::{AnomalyEvent, AnomalyKind, Severity};
use serde::Serialize;
use time::OffsetDateTime;

use crate::outbox::AlertOutbox;
use crate::store::UsageStore;

const VOLTAGE_MIN: f64 = 180.0;
const VOLTAGE_MAX: f64 = 240.0;
const PEAK_POWER_WATTS: f64 = 500.0;
const OVERLOAD_MEAN_WATTS: f64 = 2000.0;
const OVERLOAD_MIN_SAMPLES: usize = 6;
const OVERLOAD_WINDOW: Duration = Duration::from_secs(10 * 60);
const OVERLOAD_WINDOW_LIMIT: usize = 10;
const DEVIATION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
const DEVIATION_PERCENT: f64 = 150.0;

/// Result of one anomaly pass. Purely advisory; nothing here touches the
/// ledger.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub has_anomalies: bool,
    pub anomalies: Vec<AnomalyEvent>,
    pub tips: Vec<String>,
    pub is_peak_hour: bool,
    pub current_hour: u8,
}

/// High-demand hours: 9-11 in the morning, 17-21 in the evening.
pub fn is_peak_hour(hour: u8) -> bool {
    (9..=11).contains(&hour) || (17..=21).contains(&hour)
}

/// Rough appliance guess bucketed by power draw.
pub fn appliance_guess(power: f64) -> Option<&'static str> {
    if power > 1500.0 {
        Some("iron box / heater")
    } else if power > 1000.0 {
        Some("microwave / heavy duty device")
    } else if power > 500.0 {
        Some("motor / compressor")
    } else if power > 200.0 {
        Some("AC / water heater")
    } else if power > 100.0 {
        Some("television / refrigerator")
    } else {
        None
    }
}

/// Stateless detector over a bounded window of recent readings. Store
/// failures degrade the affected check to "no anomaly" rather than
/// propagating, since the output is advisory.
pub struct AnomalyDetector {
    store: Arc<dyn UsageStore>,
    outbox: AlertOutbox,
}

impl AnomalyDetector {
    pub fn new(store: Arc<dyn UsageStore>, outbox: AlertOutbox) -> Self {
        Self { store, outbox }
    }

    pub async fn check(
        &self,
        user_id: i64,
        voltage: f64,
        current: f64,
        power: f64,
        now: OffsetDateTime,
    ) -> AnomalyReport {
        let hour = now.hour();
        let peak = is_peak_hour(hour);
        let mut anomalies = Vec::new();

        if voltage < VOLTAGE_MIN || voltage > VOLTAGE_MAX {
            anomalies.push(AnomalyEvent {
                user_id,
                kind: AnomalyKind::VoltageAnomaly,
                severity: Severity::Warning,
                message: format!(
                    "Voltage out of range: {voltage:.1}V (expected {VOLTAGE_MIN:.0}-{VOLTAGE_MAX:.0}V)"
                ),
                tip: Some("Unstable voltage detected. Use a voltage stabilizer.".to_string()),
                detected_at: now,
                context: serde_json::json!({ "voltage": voltage }),
            });
        }

        if peak && power > PEAK_POWER_WATTS {
            let appliance = appliance_guess(power);
            let tip = match appliance {
                Some(name) => format!(
                    "Avoid using {name} during peak hours. Shift usage to off-peak hours (12-4 PM or 10 PM-6 AM) to save 20-30% on bills."
                ),
                None => "Shift heavy usage to off-peak hours (12-4 PM or 10 PM-6 AM) to save 20-30% on bills.".to_string(),
            };
            anomalies.push(AnomalyEvent {
                user_id,
                kind: AnomalyKind::PeakHourUsage,
                severity: Severity::Info,
                message: format!("Peak hour high usage detected: {power:.2}W ({hour}:00)"),
                tip: Some(tip),
                detected_at: now,
                context: serde_json::json!({
                    "power": power,
                    "current": current,
                    "hour": hour,
                    "appliance": appliance,
                }),
            });
        }

        if let Some(mean) = self.sustained_mean_power(user_id, now).await {
            if mean > OVERLOAD_MEAN_WATTS {
                anomalies.push(AnomalyEvent {
                    user_id,
                    kind: AnomalyKind::OverloadRisk,
                    severity: Severity::Critical,
                    message: format!("Sustained high usage: {mean:.2}W (overload risk)"),
                    tip: Some(
                        "URGENT: reduce power consumption. You are approaching overload. Disconnect some devices."
                            .to_string(),
                    ),
                    detected_at: now,
                    context: serde_json::json!({ "mean_power_10m": mean }),
                });
            }
        }

        if let Some(avg) = self.daily_average_power(user_id, now).await {
            if avg > 0.0 {
                let deviation = (power - avg) / avg * 100.0;
                if deviation > DEVIATION_PERCENT {
                    anomalies.push(AnomalyEvent {
                        user_id,
                        kind: AnomalyKind::UnusualPattern,
                        severity: Severity::Info,
                        message: format!(
                            "Usage {deviation:.0}% above the 24h average ({power:.1}W vs {avg:.1}W)"
                        ),
                        tip: Some(
                            "Check if additional devices are running. This will increase your monthly bill."
                                .to_string(),
                        ),
                        detected_at: now,
                        context: serde_json::json!({
                            "power": power,
                            "avg_24h": avg,
                            "deviation_percent": deviation,
                        }),
                    });
                }
            }
        }

        for event in &anomalies {
            self.outbox.publish_anomaly(event).await;
        }
        if !anomalies.is_empty() {
            metrics::counter!("anomalies_detected_total").increment(anomalies.len() as u64);
        }

        let mut tips: Vec<String> = Vec::new();
        for tip in anomalies.iter().filter_map(|a| a.tip.clone()) {
            if !tips.contains(&tip) {
                tips.push(tip);
            }
        }

        AnomalyReport {
            has_anomalies: !anomalies.is_empty(),
            anomalies,
            tips,
            is_peak_hour: peak,
            current_hour: hour,
        }
    }

    /// Mean power over the last 10 minutes, requiring a minimum sample count.
    async fn sustained_mean_power(&self, user_id: i64, now: OffsetDateTime) -> Option<f64> {
        let since = now - OVERLOAD_WINDOW;
        match self
            .store
            .recent_power_since(user_id, since, OVERLOAD_WINDOW_LIMIT)
            .await
        {
            Ok(powers) if powers.len() >= OVERLOAD_MIN_SAMPLES => {
                Some(powers.iter().sum::<f64>() / powers.len() as f64)
            }
            Ok(_) => None,
            Err(e) => {
                metrics::counter!("anomaly_window_query_failures_total").increment(1);
                tracing::warn!(user_id, error = %e, "recent-readings query failed, skipping overload check");
                None
            }
        }
    }

    async fn daily_average_power(&self, user_id: i64, now: OffsetDateTime) -> Option<f64> {
        let since = now - DEVIATION_WINDOW;
        match self.store.avg_power_since(user_id, since).await {
            Ok(avg) => avg,
            Err(e) => {
                metrics::counter!("anomaly_window_query_failures_total").increment(1);
                tracing::warn!(user_id, error = %e, "daily-average query failed, skipping deviation check");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_hours_cover_morning_and_evening_windows() {
        assert!(is_peak_hour(9));
        assert!(is_peak_hour(11));
        assert!(is_peak_hour(17));
        assert!(is_peak_hour(21));
        assert!(!is_peak_hour(8));
        assert!(!is_peak_hour(12));
        assert!(!is_peak_hour(22));
    }

    #[test]
    fn appliance_buckets_by_power_magnitude() {
        assert_eq!(appliance_guess(1600.0), Some("iron box / heater"));
        assert_eq!(appliance_guess(1200.0), Some("microwave / heavy duty device"));
        assert_eq!(appliance_guess(700.0), Some("motor / compressor"));
        assert_eq!(appliance_guess(300.0), Some("AC / water heater"));
        assert_eq!(appliance_guess(150.0), Some("television / refrigerator"));
        assert_eq!(appliance_guess(50.0), None);
    }
}
