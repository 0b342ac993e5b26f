use crate::app::status::render_status;
use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result, bail};
use approval_reconciler::config::Config;
use approval_reconciler::platform::daemon;
use approval_reconciler::resource::{ApprovalRequest, ApprovalRequestSpec, DeletionPolicy};
use approval_reconciler::store::{FileStore, StateStore};
use std::sync::Arc;
use tracing::info;

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    let store = FileStore::new(config.store_path());

    match cli.command {
        Commands::Run { workers } => {
            if let Some(workers) = workers {
                if workers == 0 {
                    bail!("--workers must be greater than 0");
                }
                config.controller.workers = workers;
            }
            println!("{}", render_banner(&config));
            daemon::run(Arc::new(config)).await
        }

        Commands::Apply {
            name,
            requester,
            subject,
            provider_config,
            orphan,
        } => {
            let mut spec = ApprovalRequestSpec::new(requester, subject);
            if let Some(provider) = provider_config {
                if !config.providers.contains_key(&provider) {
                    tracing::warn!(
                        provider = %provider,
                        "provider config is not defined; reconciliation will fail until it is"
                    );
                }
                spec.provider_config_ref = provider;
            }
            if orphan {
                spec.deletion_policy = DeletionPolicy::Orphan;
            }

            let record = store
                .apply_desired(&name, spec)
                .await
                .with_context(|| format!("Failed to apply {name}"))?;
            info!(name = %record.name, generation = record.generation, "resource applied");
            println!("{} applied (generation {})", record.name, record.generation);
            Ok(())
        }

        Commands::Delete { name } => {
            let record = store
                .request_deletion(&name)
                .await
                .with_context(|| format!("Failed to delete {name}"))?;
            println!(
                "{} marked for deletion ({})",
                record.name, record.spec.deletion_policy
            );
            Ok(())
        }

        Commands::Get { name } => {
            let Some(record) = store.get(&name).await? else {
                bail!("resource {name} not found");
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }

        Commands::List => {
            let records = store.list().await?;
            if records.is_empty() {
                println!("No resources declared in {}", store.path().display());
                return Ok(());
            }
            println!("{}", render_list(&records));
            Ok(())
        }

        Commands::Status => {
            println!(
                "{}",
                render_status(&config, &daemon::state_file_path(&config))
            );
            Ok(())
        }
    }
}

fn render_banner(config: &Config) -> String {
    format!(
        "◆ Approval reconciler started\n   Store: {}\n   State: {}\n   Press Ctrl-C to stop",
        config.store_path().display(),
        daemon::state_file_path(config).display()
    )
}

fn render_list(records: &[ApprovalRequest]) -> String {
    let mut lines = vec![format!(
        "{:<24} {:>4} {:>8} {:<10} {:<10} {}",
        "NAME", "GEN", "ID", "STATUS", "READY", "SYNCED"
    )];

    for record in records {
        let observed = record.observed();
        let id = observed
            .external_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let status = observed
            .status
            .map_or_else(|| "-".to_string(), |status| status.to_string());
        let ready = observed
            .ready
            .as_ref()
            .map_or_else(|| "-".to_string(), |c| c.reason.to_string());
        let synced = match &record.status.synced {
            Some(c) if c.is_success() => "ok".to_string(),
            Some(c) => format!("error: {}", c.message.as_deref().unwrap_or("")),
            None => "-".to_string(),
        };
        let name = if record.is_being_deleted() {
            format!("{} (deleting)", record.name)
        } else {
            record.name.clone()
        };
        lines.push(format!(
            "{name:<24} {:>4} {id:>8} {status:<10} {ready:<10} {synced}",
            record.generation
        ));
    }

    lines.join("\n")
}
