use std::time::Duration;

/// Events the observer can record
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    ReconcileStart {
        key: String,
    },
    ReconcileEnd {
        key: String,
        duration: Duration,
        outcome: String,
        success: bool,
    },
    Requeue {
        key: String,
        after: Duration,
        rate_limited: bool,
    },
    Error {
        component: String,
        message: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    ReconcileLatency(Duration),
    QueueDepth(u64),
}

/// Core observability trait: implement for any backend
pub trait Observer: Send + Sync {
    /// Record a discrete event
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data (no-op for most backends)
    fn flush(&self) {}

    /// Human-readable name of this observer
    fn name(&self) -> &str;
}
