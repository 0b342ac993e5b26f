use super::traits::{Observer, ObserverEvent, ObserverMetric};
use tracing::{info, warn};

/// Log-based observer: uses tracing, zero external deps
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::ReconcileStart { key } => {
                info!(key = %key, "reconcile.start");
            }
            ObserverEvent::ReconcileEnd {
                key,
                duration,
                outcome,
                success,
            } => {
                info!(
                    key = %key,
                    duration_ms = millis(*duration),
                    outcome = %outcome,
                    success = success,
                    "reconcile.end"
                );
            }
            ObserverEvent::Requeue {
                key,
                after,
                rate_limited,
            } => {
                info!(
                    key = %key,
                    after_ms = millis(*after),
                    rate_limited = rate_limited,
                    "reconcile.requeue"
                );
            }
            ObserverEvent::Error { component, message } => {
                warn!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::ReconcileLatency(d) => {
                info!(latency_ms = millis(*d), "metric.reconcile_latency");
            }
            ObserverMetric::QueueDepth(d) => {
                info!(depth = d, "metric.queue_depth");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
