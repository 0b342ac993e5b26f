use crate::error::ConfigError;
use crate::resource::DEFAULT_PROVIDER_CONFIG;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub(super) const CONFIG_DIR_NAME: &str = ".approval-reconciler";
pub(super) const STORE_FILE_NAME: &str = "resources.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// State directory - computed from the config location, not serialized
    #[serde(skip)]
    pub state_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Delay between successful reconciliations of the same request. The
    /// approval service never pushes changes, so this bounds how long an
    /// approval goes unnoticed.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_reconcile_timeout_secs")]
    pub reconcile_timeout_secs: u64,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

fn default_workers() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_reconcile_timeout_secs() -> u64 {
    30
}

fn default_resync_interval_secs() -> u64 {
    10
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_secs: default_poll_interval_secs(),
            reconcile_timeout_secs: default_reconcile_timeout_secs(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_supervisor_backoff_secs")]
    pub supervisor_initial_backoff_secs: u64,
    #[serde(default = "default_supervisor_backoff_max_secs")]
    pub supervisor_max_backoff_secs: u64,
    #[serde(default = "default_supervisor_max_restarts")]
    pub supervisor_max_restarts: u32,
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_secs() -> u64 {
    300
}

fn default_supervisor_backoff_secs() -> u64 {
    2
}

fn default_supervisor_backoff_max_secs() -> u64 {
    60
}

fn default_supervisor_max_restarts() -> u32 {
    10
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            supervisor_initial_backoff_secs: default_supervisor_backoff_secs(),
            supervisor_max_backoff_secs: default_supervisor_backoff_max_secs(),
            supervisor_max_restarts: default_supervisor_max_restarts(),
        }
    }
}

/// Where the opaque credential blob for a provider comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CredentialsSource {
    #[default]
    None,
    Env {
        var: String,
    },
    File {
        path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub credentials: CredentialsSource,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:5000".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            credentials: CredentialsSource::None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    BTreeMap::from([(DEFAULT_PROVIDER_CONFIG.to_string(), ProviderConfig::default())])
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Defaults to `resources.json` inside the state directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "log".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let config_dir = home.join(CONFIG_DIR_NAME);

        Self {
            state_dir: config_dir.clone(),
            config_path: config_dir.join("config.toml"),
            controller: ControllerConfig::default(),
            reliability: ReliabilityConfig::default(),
            providers: default_providers(),
            store: StoreConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => self.state_dir.join(STORE_FILE_NAME),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.workers == 0 {
            return Err(invalid("controller.workers must be at least 1"));
        }
        if self.controller.poll_interval_secs == 0 {
            return Err(invalid("controller.poll_interval_secs must be at least 1"));
        }
        if self.controller.reconcile_timeout_secs == 0 {
            return Err(invalid("controller.reconcile_timeout_secs must be at least 1"));
        }
        if self.controller.resync_interval_secs == 0 {
            return Err(invalid("controller.resync_interval_secs must be at least 1"));
        }
        if self.reliability.initial_backoff_ms == 0 {
            return Err(invalid("reliability.initial_backoff_ms must be at least 1"));
        }
        if self.reliability.max_backoff_secs.saturating_mul(1000) < self.reliability.initial_backoff_ms {
            return Err(invalid(
                "reliability.max_backoff_secs must not be below initial_backoff_ms",
            ));
        }

        for (name, provider) in &self.providers {
            let endpoint = url::Url::parse(&provider.endpoint).map_err(|e| {
                invalid(format!("providers.{name}.endpoint '{}': {e}", provider.endpoint))
            })?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(invalid(format!(
                    "providers.{name}.endpoint must be an http(s) URL, got '{}'",
                    provider.endpoint
                )));
            }
            if let CredentialsSource::Env { var } = &provider.credentials
                && var.trim().is_empty()
            {
                return Err(invalid(format!(
                    "providers.{name}.credentials.var must not be empty"
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}
