//! Where desired and observed state live between reconciliations.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::resource::{ApprovalRequest, ApprovalRequestSpec, ApprovalRequestStatus};
use async_trait::async_trait;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn list(&self) -> Result<Vec<ApprovalRequest>, StoreError>;

    async fn get(&self, name: &str) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Create the record or replace its spec. Bumps the generation when the
    /// spec changes; status is left alone.
    async fn apply_desired(
        &self,
        name: &str,
        spec: ApprovalRequestSpec,
    ) -> Result<ApprovalRequest, StoreError>;

    /// Mark the record for deletion. The controller discards it once the
    /// external request is archived.
    async fn request_deletion(&self, name: &str) -> Result<ApprovalRequest, StoreError>;

    async fn update_status(
        &self,
        name: &str,
        status: &ApprovalRequestStatus,
    ) -> Result<(), StoreError>;

    /// Drop the record entirely. Discarding an absent record is not an error.
    async fn discard(&self, name: &str) -> Result<(), StoreError>;
}

pub(crate) fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::Invalid("name must not be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StoreError::Invalid(format!(
            "name '{name}' may only contain ASCII letters, digits, '-', '_' and '.'"
        )));
    }
    Ok(())
}

pub(crate) fn validate_spec(spec: &ApprovalRequestSpec) -> Result<(), StoreError> {
    if spec.for_provider.requester.trim().is_empty() {
        return Err(StoreError::Invalid("requester must not be empty".into()));
    }
    if spec.for_provider.subject.trim().is_empty() {
        return Err(StoreError::Invalid("subject must not be empty".into()));
    }
    Ok(())
}

/// Shared `apply_desired` semantics for in-process record maps.
pub(crate) fn upsert(
    existing: Option<&mut ApprovalRequest>,
    name: &str,
    spec: ApprovalRequestSpec,
) -> Result<Option<ApprovalRequest>, StoreError> {
    validate_name(name)?;
    validate_spec(&spec)?;
    match existing {
        Some(record) => {
            if record.is_being_deleted() {
                return Err(StoreError::Invalid(format!(
                    "resource {name} is being deleted"
                )));
            }
            if record.spec != spec {
                record.spec = spec;
                record.generation = record.generation.saturating_add(1);
            }
            Ok(None)
        }
        None => Ok(Some(ApprovalRequest::new(name, spec))),
    }
}

pub(crate) fn mark_deleted(record: &mut ApprovalRequest) {
    if !record.is_being_deleted() {
        record.deletion_requested_at = Some(chrono::Utc::now());
        record.generation = record.generation.saturating_add(1);
    }
}
