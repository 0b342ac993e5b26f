use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

mod state;
mod supervisor;

use state::spawn_state_writer;
use supervisor::spawn_controller_supervisor;

const STATUS_FLUSH_SECONDS: u64 = 5;
const SHUTDOWN_GRACE_SECONDS: u64 = 5;

/// Run the supervised controller and the state writer until Ctrl-C.
pub async fn run(config: Arc<Config>) -> Result<()> {
    crate::diagnostics::health::mark_component_ok("daemon");

    let shutdown = CancellationToken::new();
    let writer = spawn_state_writer(Arc::clone(&config));
    let controller = spawn_controller_supervisor(Arc::clone(&config), shutdown.clone());

    tracing::info!(
        store = %config.store_path().display(),
        state = %state_file_path(&config).display(),
        "daemon started"
    );

    tokio::signal::ctrl_c().await?;
    crate::diagnostics::health::mark_component_error("daemon", "shutdown requested");
    shutdown.cancel();

    // In-flight attempts get their full deadline to finish and persist.
    let grace = Duration::from_secs(
        config
            .controller
            .reconcile_timeout_secs
            .saturating_add(SHUTDOWN_GRACE_SECONDS),
    );
    let abort = controller.abort_handle();
    if tokio::time::timeout(grace, controller).await.is_err() {
        tracing::warn!("controller did not stop within {}s; aborting", grace.as_secs());
        abort.abort();
    }

    writer.abort();
    let _ = writer.await;
    if let Err(error) = state::write_state_file(&state_file_path(&config)).await {
        tracing::warn!(%error, "failed to write final controller state");
    }

    Ok(())
}

pub fn state_file_path(config: &Config) -> PathBuf {
    state::state_file_path(config)
}
