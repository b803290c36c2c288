use std::sync::Arc;

use ledger_client::domain::{AnomalyEvent, Severity, UsageAlert};
use tokio::sync::mpsc;

use crate::store::{NewUsageAlert, UsageStore};

/// One event for the delivery collaborator.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    Usage {
        alert: UsageAlert,
        severity: Severity,
    },
    Anomaly(AnomalyEvent),
}

/// Decouples alert emission from delivery. Alerts are persisted to the alert
/// store and offered to an in-process channel; a full or closed channel, or a
/// failed insert, is logged and counted but never propagates, so the ledger
/// write stays the durable fact regardless of what happens here.
#[derive(Clone)]
pub struct AlertOutbox {
    store: Arc<dyn UsageStore>,
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertOutbox {
    pub fn new(
        store: Arc<dyn UsageStore>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { store, tx }, rx)
    }

    /// Persist a usage alert and offer it for delivery. Returns the stored
    /// alert, or `None` when the store rejected it.
    pub async fn publish_usage(
        &self,
        alert: NewUsageAlert,
        severity: Severity,
    ) -> Option<UsageAlert> {
        let stored = match self.store.insert_alert(alert).await {
            Ok(stored) => stored,
            Err(e) => {
                metrics::counter!("usage_alert_store_failures_total").increment(1);
                tracing::warn!(error = %e, "failed to persist usage alert");
                return None;
            }
        };

        self.offer(AlertEvent::Usage {
            alert: stored.clone(),
            severity,
        });
        metrics::counter!("usage_alerts_emitted_total").increment(1);
        Some(stored)
    }

    /// Persist an anomaly event and offer it for delivery, best-effort.
    pub async fn publish_anomaly(&self, event: &AnomalyEvent) {
        if let Err(e) = self.store.insert_anomaly(event).await {
            metrics::counter!("anomaly_store_failures_total").increment(1);
            tracing::warn!(error = %e, "failed to persist anomaly event");
        }

        self.offer(AlertEvent::Anomaly(event.clone()));
        metrics::counter!("anomaly_events_emitted_total").increment(1);
    }

    fn offer(&self, event: AlertEvent) {
        if let Err(e) = self.tx.try_send(event) {
            metrics::counter!("outbox_dropped_events_total").increment(1);
            tracing::warn!(error = %e, "alert outbox channel full or closed, dropping event");
        }
    }
}
