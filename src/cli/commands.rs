use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `approval-reconciler` - keeps approval requests in an external workflow
/// service in line with locally declared resources.
#[derive(Parser, Debug)]
#[command(name = "approval-reconciler")]
#[command(version)]
#[command(about = "Reconcile declared approval requests against an approval service.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.approval-reconciler/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller until Ctrl-C
    Run {
        /// Number of reconcile workers (overrides config)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Declare or update an approval request
    Apply {
        /// Resource name
        name: String,

        /// Who asks for approval
        #[arg(long)]
        requester: String,

        /// What needs approving
        #[arg(long)]
        subject: String,

        /// Provider config to connect with
        #[arg(long)]
        provider_config: Option<String>,

        /// Leave the external request in place when this resource is deleted
        #[arg(long)]
        orphan: bool,
    },

    /// Request deletion of an approval request
    Delete {
        /// Resource name
        name: String,
    },

    /// Print one resource as JSON
    Get {
        /// Resource name
        name: String,
    },

    /// List declared resources
    List,

    /// Show config paths and the running controller's last state
    Status,
}
