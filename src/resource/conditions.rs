use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle marker exposed for status reporting. The three markers are
/// mutually exclusive: setting one replaces whichever was set before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Lifecycle {
    Creating,
    Available,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyCondition {
    pub reason: Lifecycle,
    pub last_transition_time: DateTime<Utc>,
}

impl ReadyCondition {
    pub fn new(reason: Lifecycle) -> Self {
        Self {
            reason,
            last_transition_time: Utc::now(),
        }
    }
}

/// Replace the ready condition unless it already carries `reason`, in which
/// case the original transition time is kept.
pub fn set_ready(slot: &mut Option<ReadyCondition>, reason: Lifecycle) {
    if slot.as_ref().is_some_and(|c| c.reason == reason) {
        return;
    }
    *slot = Some(ReadyCondition::new(reason));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SyncReason {
    ReconcileSuccess,
    ReconcileError,
}

/// Outcome of the most recent reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCondition {
    pub reason: SyncReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

impl SyncCondition {
    pub fn success() -> Self {
        Self {
            reason: SyncReason::ReconcileSuccess,
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            reason: SyncReason::ReconcileError,
            message: Some(message.into()),
            last_transition_time: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.reason == SyncReason::ReconcileSuccess
    }

    /// Conditions are equal when reason and message match; timestamps are ignored.
    pub fn equivalent(&self, other: &Self) -> bool {
        self.reason == other.reason && self.message == other.message
    }
}

/// Same replace-unless-equivalent rule as [`set_ready`], for the sync slot.
pub fn set_synced(slot: &mut Option<SyncCondition>, condition: SyncCondition) {
    if slot.as_ref().is_some_and(|c| c.equivalent(&condition)) {
        return;
    }
    *slot = Some(condition);
}
