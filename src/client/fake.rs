//! In-memory approval service used by unit tests.

use super::ApprovalClient;
use super::types::{ApprovalRequestRecord, ApprovalStatus, DecisionRecord};
use crate::error::ClientError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeApprovalService {
    records: Mutex<BTreeMap<u64, ApprovalRequestRecord>>,
    next_id: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub archive_calls: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_archive: AtomicBool,
    /// Archive reports `NotFound` while fetch still returns the record.
    pub archive_not_found: AtomicBool,
    /// Archive succeeds but fetch keeps reporting the record as live.
    pub archive_lagging: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl FakeApprovalService {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(7),
            ..Self::default()
        }
    }

    pub fn insert(&self, id: u64, status: ApprovalStatus) {
        self.records.lock().unwrap().insert(
            id,
            ApprovalRequestRecord {
                id,
                requester: "alice".into(),
                subject: "deploy-prod".into(),
                status,
                decisions: Vec::new(),
                archived: false,
            },
        );
    }

    pub fn set_status(&self, id: u64, status: ApprovalStatus) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = status;
        }
    }

    pub fn push_decision(&self, id: u64, decision: DecisionRecord) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.decisions.push(decision);
        }
    }

    pub fn set_archived(&self, id: u64) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.archived = true;
        }
    }

    pub fn remove(&self, id: u64) {
        self.records.lock().unwrap().remove(&id);
    }

    pub fn record(&self, id: u64) -> Option<ApprovalRequestRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn archives(&self) -> usize {
        self.archive_calls.load(Ordering::SeqCst)
    }
}

fn transport(operation: &'static str) -> ClientError {
    ClientError::Transport {
        operation,
        message: "connection refused".into(),
    }
}

#[async_trait]
impl ApprovalClient for FakeApprovalService {
    async fn fetch(&self, id: u64) -> Result<ApprovalRequestRecord, ClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(transport("fetch"));
        }
        self.record(id).ok_or(ClientError::NotFound { id })
    }

    async fn create(
        &self,
        requester: &str,
        subject: &str,
    ) -> Result<ApprovalRequestRecord, ClientError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(transport("create"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64;
        let record = ApprovalRequestRecord {
            id,
            requester: requester.to_string(),
            subject: subject.to_string(),
            status: ApprovalStatus::Pending,
            decisions: Vec::new(),
            archived: false,
        };
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }

    async fn archive(&self, id: u64) -> Result<(), ClientError> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_archive.load(Ordering::SeqCst) {
            return Err(transport("archive"));
        }
        if self.archive_not_found.load(Ordering::SeqCst) {
            return Err(ClientError::NotFound { id });
        }
        if self.archive_lagging.load(Ordering::SeqCst) {
            return Ok(());
        }
        match self.records.lock().unwrap().get_mut(&id) {
            Some(record) => {
                record.archived = true;
                Ok(())
            }
            None => Err(ClientError::NotFound { id }),
        }
    }

    fn locator(&self, id: u64) -> String {
        format!("http://approvals.test/approval_requests/{id}")
    }
}
