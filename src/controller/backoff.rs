use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Per-key exponential backoff: `initial * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ItemBackoff {
    initial: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl ItemBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Delay before the next retry of `key`. Each call counts as one failure.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.to_string()).or_insert(0);

        let mut delay = self.initial;
        for _ in 0..*count {
            if delay >= self.max {
                break;
            }
            delay = delay.saturating_mul(2).min(self.max);
        }
        *count = count.saturating_add(1);
        delay
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn forget(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
