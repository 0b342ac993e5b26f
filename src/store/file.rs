use super::{StateStore, mark_deleted, upsert};
use crate::error::StoreError;
use crate::resource::{ApprovalRequest, ApprovalRequestSpec, ApprovalRequestStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    resources: BTreeMap<String, ApprovalRequest>,
}

/// Store backed by a single JSON document.
///
/// The daemon and CLI invocations may share one file, so every read holds a
/// shared OS lock and every read-modify-write holds an exclusive one on a
/// sidecar `.lock` file. Writes go to a uniquely named temp file in the same
/// directory and are renamed over the document.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `work` on a blocking thread while holding the file lock.
    async fn locked<T, F>(&self, mode: LockMode, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_file = open_lock_file(&path)?;
            match mode {
                LockMode::Shared => lock_file.lock_shared()?,
                LockMode::Exclusive => lock_file.lock()?,
            }
            work(&path)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    async fn read(&self) -> Result<StateDocument, StoreError> {
        self.locked(LockMode::Shared, load).await
    }

    async fn modify<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StateDocument) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.locked(LockMode::Exclusive, move |path| {
            let mut document = load(path)?;
            let result = change(&mut document)?;
            save(path, &document)?;
            Ok(result)
        })
        .await
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// The lock is released when the returned handle is dropped.
fn open_lock_file(path: &Path) -> Result<File, StoreError> {
    fs::create_dir_all(parent_dir(path))?;
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?)
}

fn load(path: &Path) -> Result<StateDocument, StoreError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StateDocument::default()),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateDocument::default()),
        Err(e) => Err(StoreError::Io(e)),
    }
}

fn save(path: &Path, document: &StateDocument) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    serde_json::to_writer_pretty(&mut tmp, document)
        .map_err(|e| StoreError::Corrupt(format!("cannot serialize state: {e}")))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl StateStore for FileStore {
    async fn list(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        Ok(self.read().await?.resources.into_values().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.read().await?.resources.remove(name))
    }

    async fn apply_desired(
        &self,
        name: &str,
        spec: ApprovalRequestSpec,
    ) -> Result<ApprovalRequest, StoreError> {
        let name = name.to_string();
        self.modify(move |document| {
            if let Some(created) = upsert(document.resources.get_mut(&name), &name, spec)? {
                document.resources.insert(name.clone(), created);
            }
            document
                .resources
                .get(&name)
                .cloned()
                .ok_or(StoreError::NotFound { key: name })
        })
        .await
    }

    async fn request_deletion(&self, name: &str) -> Result<ApprovalRequest, StoreError> {
        let name = name.to_string();
        self.modify(move |document| {
            let record = document
                .resources
                .get_mut(&name)
                .ok_or_else(|| StoreError::NotFound { key: name.clone() })?;
            mark_deleted(record);
            Ok(record.clone())
        })
        .await
    }

    async fn update_status(
        &self,
        name: &str,
        status: &ApprovalRequestStatus,
    ) -> Result<(), StoreError> {
        let name = name.to_string();
        let status = status.clone();
        self.modify(move |document| {
            let record = document
                .resources
                .get_mut(&name)
                .ok_or_else(|| StoreError::NotFound { key: name.clone() })?;
            record.status = status;
            Ok(())
        })
        .await
    }

    async fn discard(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.modify(move |document| {
            document.resources.remove(&name);
            Ok(())
        })
        .await
    }
}
