use super::backoff::ItemBackoff;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A pending delayed add. Replacing it cancels its timer.
#[derive(Debug)]
struct Delayed {
    due: Instant,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    /// Keys waiting to be processed, whether queued or parked behind a worker.
    dirty: HashSet<String>,
    /// Keys currently held by a worker.
    processing: HashSet<String>,
    /// At most one pending delayed add per key, holding the earliest deadline.
    delayed: HashMap<String, Delayed>,
    shutting_down: bool,
}

/// Deduplicating work queue of resource keys.
///
/// A key is handed to at most one worker at a time. Adding a key while it is
/// being processed parks it until [`WorkQueue::done`], after which it is
/// queued again exactly once. Delayed adds for the same key collapse into the
/// earliest pending deadline.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    available: Notify,
    shutdown: CancellationToken,
    backoff: ItemBackoff,
}

impl WorkQueue {
    pub fn new(backoff: ItemBackoff) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            shutdown: CancellationToken::new(),
            backoff,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, key: &str) {
        let mut state = self.lock();
        if state.shutting_down || state.dirty.contains(key) {
            return;
        }
        state.dirty.insert(key.to_string());
        if state.processing.contains(key) {
            return;
        }
        state.queue.push_back(key.to_string());
        drop(state);
        self.available.notify_one();
    }

    /// Add `key` once `delay` has elapsed. Dropped if the queue shuts down first.
    ///
    /// If `key` already has a pending delayed add that is due no later, this
    /// call is a no-op; an earlier deadline replaces the pending one.
    pub fn add_after(self: &Arc<Self>, key: &str, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let due = Instant::now() + delay;
        let cancel = {
            let mut state = self.lock();
            if state.shutting_down
                || state
                    .delayed
                    .get(key)
                    .is_some_and(|pending| pending.due <= due)
            {
                return;
            }
            let cancel = self.shutdown.child_token();
            let replaced = state.delayed.insert(
                key.to_string(),
                Delayed {
                    due,
                    cancel: cancel.clone(),
                },
            );
            if let Some(replaced) = replaced {
                replaced.cancel.cancel();
            }
            cancel
        };

        let queue = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep_until(due) => queue.fire(&key, due),
            }
        });
    }

    fn fire(&self, key: &str, due: Instant) {
        {
            let mut state = self.lock();
            if !state.delayed.get(key).is_some_and(|pending| pending.due == due) {
                return;
            }
            state.delayed.remove(key);
        }
        self.add(key);
    }

    /// Schedule a retry of `key` after its backoff delay, returning that delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: &str) -> Duration {
        let delay = self.backoff.next_delay(key);
        self.add_after(key, delay);
        delay
    }

    /// Reset the retry history of `key`.
    pub fn forget(&self, key: &str) {
        self.backoff.forget(key);
    }

    pub fn num_requeues(&self, key: &str) -> u32 {
        self.backoff.failures(key)
    }

    /// Wait for the next key. Returns `None` once the queue has shut down.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.available.notify_one();
                    }
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Release `key`. If it was added while in flight it is queued again.
    pub fn done(&self, key: &str) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.to_string());
            drop(state);
            self.available.notify_one();
        }
    }

    /// Stop handing out keys. Queued keys and pending delayed adds are dropped.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            state.shutting_down = true;
            state.delayed.clear();
        }
        self.shutdown.cancel();
        self.available.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a pending delayed add.
    pub fn delayed_len(&self) -> usize {
        self.lock().delayed.len()
    }
}
