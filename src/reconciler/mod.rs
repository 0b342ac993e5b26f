//! Observe / Create / Update / Delete against the approval service.
//!
//! [`ApprovalRequestExternal`] is the only code that turns approval service
//! responses into [`ObservedState`]. It never decides *which* operation to run;
//! that is the controller's job. Each operation mutates the observed state it
//! is handed only after the external call has returned, so a dropped future
//! leaves the state exactly as it was.

use crate::client::{ApprovalClient, ApprovalRequestRecord, ApprovalStatus};
use crate::error::{ClientError, ReconcileError};
use crate::resource::{DesiredState, Lifecycle, ObservedState, set_ready};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of [`ApprovalRequestExternal::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalObservation {
    /// `false` means "create it", or "it is gone" while deleting.
    pub resource_exists: bool,
    /// Always `true` for existing requests: nothing flows from spec to service
    /// after creation.
    pub resource_up_to_date: bool,
}

impl ExternalObservation {
    pub const fn absent() -> Self {
        Self {
            resource_exists: false,
            resource_up_to_date: false,
        }
    }

    pub const fn current() -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalCreation {
    pub external_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalUpdate;

pub struct ApprovalRequestExternal {
    client: Arc<dyn ApprovalClient>,
}

impl ApprovalRequestExternal {
    pub fn new(client: Arc<dyn ApprovalClient>) -> Self {
        Self { client }
    }

    /// Refresh `observed` from the service.
    ///
    /// No id means the request was never created, so no call is made. A
    /// fetch failure other than not-found is an error; callers must treat it
    /// as "exists" and must not create.
    pub async fn observe(
        &self,
        observed: &mut ObservedState,
    ) -> Result<ExternalObservation, ReconcileError> {
        let Some(id) = observed.external_id else {
            return Ok(ExternalObservation::absent());
        };

        let record = match self.client.fetch(id).await {
            Ok(record) => record,
            Err(ClientError::NotFound { .. }) => {
                tracing::debug!(id, "approval request no longer exists");
                return Ok(ExternalObservation::absent());
            }
            Err(source) => return Err(ReconcileError::Observe { id, source }),
        };

        if record.archived {
            tracing::debug!(id, "approval request is archived");
            return Ok(ExternalObservation::absent());
        }

        apply_record(observed, &record, Utc::now());
        Ok(ExternalObservation::current())
    }

    /// Open the approval request. Refuses when an id is already known.
    pub async fn create(
        &self,
        desired: &DesiredState,
        observed: &mut ObservedState,
    ) -> Result<ExternalCreation, ReconcileError> {
        if let Some(id) = observed.external_id {
            return Err(ReconcileError::AlreadyCreated { id });
        }

        let record = self
            .client
            .create(&desired.requester, &desired.subject)
            .await
            .map_err(ReconcileError::Create)?;

        observed.external_id = Some(record.id);
        observed.url = Some(self.client.locator(record.id));
        observed.status = Some(record.status);
        observed.decisions = record.decisions;
        set_ready(&mut observed.ready, Lifecycle::Creating);

        tracing::info!(id = record.id, status = %record.status, "approval request created");
        Ok(ExternalCreation {
            external_id: record.id,
        })
    }

    /// Approval requests have no fields the controller can push after
    /// creation, and `observe` always reports them up to date, so this is
    /// never reached in steady state.
    #[allow(clippy::unused_async)]
    pub async fn update(
        &self,
        _desired: &DesiredState,
        observed: &ObservedState,
    ) -> Result<ExternalUpdate, ReconcileError> {
        tracing::warn!(
            id = ?observed.external_id,
            "update requested for an approval request; nothing to push"
        );
        Ok(ExternalUpdate)
    }

    /// Archive the approval request. Without an id there is nothing to archive.
    pub async fn delete(&self, observed: &mut ObservedState) -> Result<(), ReconcileError> {
        let Some(id) = observed.external_id else {
            tracing::debug!("approval request was never created; nothing to archive");
            return Ok(());
        };

        self.client
            .archive(id)
            .await
            .map_err(|source| ReconcileError::Delete { id, source })?;

        set_ready(&mut observed.ready, Lifecycle::Deleting);
        tracing::info!(id, "approval request archived");
        Ok(())
    }
}

fn apply_record(observed: &mut ObservedState, record: &ApprovalRequestRecord, now: DateTime<Utc>) {
    let previous = observed.status;
    match (previous, record.status) {
        (Some(ApprovalStatus::Pending), ApprovalStatus::Approved) => {
            if observed.signoff_note.is_none() {
                observed.signoff_note = Some(signoff_note(now));
            }
            set_ready(&mut observed.ready, Lifecycle::Available);
        }
        (Some(ApprovalStatus::Approved), ApprovalStatus::Pending) => {
            tracing::warn!(
                id = record.id,
                "approval service reports an approved request as pending; keeping approved"
            );
        }
        (_, ApprovalStatus::Pending | ApprovalStatus::Approved | ApprovalStatus::Rejected) => {}
    }

    if previous != Some(ApprovalStatus::Approved) || record.status != ApprovalStatus::Pending {
        observed.status = Some(record.status);
    }
    if observed.decisions != record.decisions {
        observed.decisions.clone_from(&record.decisions);
    }
}

pub(crate) fn signoff_note(at: DateTime<Utc>) -> String {
    format!("{} - approved", at.format("%B %-d, %Y at %-I:%M:%S%p UTC"))
}
