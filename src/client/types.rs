use serde::{Deserialize, Serialize};

/// Approval status as reported by the approval service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A single approver's verdict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub approver: String,
    pub decision: ApprovalDecision,
}

/// The approval service's view of one approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequestRecord {
    pub id: u64,
    #[serde(default)]
    pub requester: String,
    #[serde(default)]
    pub subject: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub decisions: Vec<DecisionRecord>,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateApprovalRequest<'a> {
    pub requester: &'a str,
    pub subject: &'a str,
}
