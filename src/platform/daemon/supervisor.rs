use crate::config::Config;
use crate::controller::Controller;
use crate::diagnostics::health;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Restart `run_component` with exponential backoff until `shutdown` fires or
/// more than `max_restarts` consecutive runs fail (`0` means unlimited).
pub(super) fn spawn_component_supervisor<F, Fut>(
    name: &'static str,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
    max_restarts: u32,
    shutdown: CancellationToken,
    mut run_component: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!("Daemon component '{name}' starting");
            let result = run_component().await;
            if shutdown.is_cancelled() {
                tracing::info!("Daemon component '{name}' stopped");
                break;
            }

            match result {
                Ok(()) => {
                    tracing::warn!("Daemon component '{name}' exited unexpectedly");
                    health::mark_component_error(name, "exited unexpectedly");
                    backoff = initial_backoff_secs.max(1);
                }
                Err(e) => {
                    tracing::error!("Daemon component '{name}' failed: {e:#}");
                    health::mark_component_error(name, format!("{e:#}"));
                }
            }
            consecutive_failures = consecutive_failures.saturating_add(1);

            if max_restarts > 0 && consecutive_failures > max_restarts {
                tracing::error!(
                    "Daemon component '{name}' exceeded max restarts ({max_restarts}), circuit open"
                );
                break;
            }

            health::bump_component_restart(name);
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(Duration::from_secs(backoff)) => {}
            }
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}

pub(super) fn spawn_controller_supervisor(
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let reliability = &config.reliability;
    let initial_backoff = reliability.supervisor_initial_backoff_secs;
    let max_backoff = reliability.supervisor_max_backoff_secs;
    let max_restarts = reliability.supervisor_max_restarts;

    let token = shutdown.clone();
    spawn_component_supervisor(
        "controller",
        initial_backoff,
        max_backoff,
        max_restarts,
        shutdown,
        move || {
            let controller = Arc::new(Controller::from_config(&config, token.clone()));
            controller.run()
        },
    )
}
