use super::{StateStore, mark_deleted, upsert};
use crate::error::StoreError;
use crate::resource::{ApprovalRequest, ApprovalRequestSpec, ApprovalRequestStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local store. Useful for embedding the controller and for tests.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, ApprovalRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn list(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn apply_desired(
        &self,
        name: &str,
        spec: ApprovalRequestSpec,
    ) -> Result<ApprovalRequest, StoreError> {
        let mut records = self.records.write().await;
        if let Some(created) = upsert(records.get_mut(name), name, spec)? {
            records.insert(name.to_string(), created);
        }
        records
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: name.into() })
    }

    async fn request_deletion(&self, name: &str) -> Result<ApprovalRequest, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound { key: name.into() })?;
        mark_deleted(record);
        Ok(record.clone())
    }

    async fn update_status(
        &self,
        name: &str,
        status: &ApprovalRequestStatus,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound { key: name.into() })?;
        record.status.clone_from(status);
        Ok(())
    }

    async fn discard(&self, name: &str) -> Result<(), StoreError> {
        self.records.write().await.remove(name);
        Ok(())
    }
}
