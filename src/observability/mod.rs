pub mod log;
pub mod noop;
pub mod traits;

pub use self::log::LogObserver;
pub use noop::NoopObserver;
pub use traits::{Observer, ObserverEvent, ObserverMetric};

use crate::config::ObservabilityConfig;

/// Pick the observer backend named in config. Unknown names fall back to noop.
pub fn create_observer(config: &ObservabilityConfig) -> Box<dyn Observer> {
    match config.backend.trim().to_ascii_lowercase().as_str() {
        "log" => Box::new(LogObserver::new()),
        "none" | "noop" => Box::new(NoopObserver),
        other => {
            tracing::warn!(backend = %other, "unknown observability backend, using noop");
            Box::new(NoopObserver)
        }
    }
}
