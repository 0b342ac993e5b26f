//! Client for the external approval workflow service.
//!
//! The reconciler only ever talks to the service through [`ApprovalClient`],
//! so tests can substitute an in-memory fake and production uses
//! [`HttpApprovalClient`].

#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod http_client;
pub mod types;

use crate::error::ClientError;
use async_trait::async_trait;

pub use http::HttpApprovalClient;
pub use types::{ApprovalDecision, ApprovalRequestRecord, ApprovalStatus, DecisionRecord};

#[async_trait]
pub trait ApprovalClient: Send + Sync {
    /// Fetch one approval request. An absent record must surface as
    /// [`ClientError::NotFound`], never as a transport or decode error.
    async fn fetch(&self, id: u64) -> Result<ApprovalRequestRecord, ClientError>;

    /// Open a new approval request. Not idempotent: every call creates a record.
    async fn create(
        &self,
        requester: &str,
        subject: &str,
    ) -> Result<ApprovalRequestRecord, ClientError>;

    /// Soft-delete an approval request. Later fetches report `archived` or `NotFound`.
    async fn archive(&self, id: u64) -> Result<(), ClientError>;

    /// Canonical locator for an approval request, stored alongside its id.
    fn locator(&self, id: u64) -> String;
}
