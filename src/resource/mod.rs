//! The `ApprovalRequest` record: what the caller wants (`spec`) and what the
//! reconciler last saw (`status`).

mod conditions;

pub use conditions::{
    Lifecycle, ReadyCondition, SyncCondition, SyncReason, set_ready, set_synced,
};

use crate::client::{ApprovalStatus, DecisionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// Desired state: who asks for approval of what. Never mutated by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub requester: String,
    pub subject: String,
}

/// What happens to the external approval request when the record is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum DeletionPolicy {
    /// Archive the external approval request.
    #[default]
    Delete,
    /// Leave the external approval request untouched.
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequestSpec {
    pub for_provider: DesiredState,
    #[serde(default = "default_provider_config_ref")]
    pub provider_config_ref: String,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

fn default_provider_config_ref() -> String {
    DEFAULT_PROVIDER_CONFIG.into()
}

impl ApprovalRequestSpec {
    pub fn new(requester: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            for_provider: DesiredState {
                requester: requester.into(),
                subject: subject.into(),
            },
            provider_config_ref: default_provider_config_ref(),
            deletion_policy: DeletionPolicy::default(),
        }
    }
}

/// Observed state, owned by the reconciliation of a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Join key with the external record. Set once by a successful create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<DecisionRecord>,
    /// Written once, when the request is first seen moving from Pending to Approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signoff_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<ReadyCondition>,
}

impl ObservedState {
    pub fn has_condition(&self, reason: Lifecycle) -> bool {
        self.ready.as_ref().is_some_and(|c| c.reason == reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequestStatus {
    #[serde(default)]
    pub at_provider: ObservedState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<SyncCondition>,
}

/// One managed approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub name: String,
    /// Bumped on every desired-state change or deletion request.
    #[serde(default)]
    pub generation: u64,
    pub spec: ApprovalRequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ApprovalRequestStatus,
}

impl ApprovalRequest {
    pub fn new(name: impl Into<String>, spec: ApprovalRequestSpec) -> Self {
        Self {
            name: name.into(),
            generation: 1,
            spec,
            deletion_requested_at: None,
            status: ApprovalRequestStatus::default(),
        }
    }

    pub fn is_being_deleted(&self) -> bool {
        self.deletion_requested_at.is_some()
    }

    pub fn observed(&self) -> &ObservedState {
        &self.status.at_provider
    }
}
