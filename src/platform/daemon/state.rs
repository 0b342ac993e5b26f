use crate::config::Config;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

const STATE_FILE_NAME: &str = "controller_state.json";

#[derive(Debug, Clone, serde::Serialize)]
pub(super) struct DaemonStatus {
    #[serde(flatten)]
    snapshot: serde_json::Map<String, serde_json::Value>,
    written_at: String,
}

pub(super) fn state_file_path(config: &Config) -> PathBuf {
    config.state_dir.join(STATE_FILE_NAME)
}

pub(super) async fn write_state_file(path: &Path) -> std::io::Result<()> {
    let mut json = crate::diagnostics::health::snapshot_json();
    if let Some(snapshot) = json.as_object().cloned() {
        let status = DaemonStatus {
            snapshot,
            written_at: Utc::now().to_rfc3339(),
        };
        json = serde_json::to_value(status).unwrap_or_else(|_| serde_json::json!({}));
    }

    let data = serde_json::to_vec_pretty(&json).unwrap_or_else(|_| b"{}".to_vec());
    tokio::fs::write(path, data).await
}

pub(super) fn spawn_state_writer(config: Arc<Config>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = state_file_path(&config);
        if let Some(parent) = path.parent()
            && let Err(error) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(%error, "failed to create state file directory");
        }

        let mut interval = tokio::time::interval(Duration::from_secs(super::STATUS_FLUSH_SECONDS));
        loop {
            interval.tick().await;
            if let Err(error) = write_state_file(&path).await {
                tracing::warn!(%error, "failed to write controller state file");
            }
        }
    })
}
