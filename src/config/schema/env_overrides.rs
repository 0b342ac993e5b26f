use super::{Config, ProviderConfig};
use crate::resource::DEFAULT_PROVIDER_CONFIG;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("APPROVAL_RECONCILER_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.providers
                .entry(DEFAULT_PROVIDER_CONFIG.to_string())
                .or_insert_with(ProviderConfig::default)
                .endpoint = endpoint;
        }

        if let Ok(workers_str) = std::env::var("APPROVAL_RECONCILER_WORKERS")
            && let Ok(workers) = workers_str.parse::<usize>()
            && workers > 0
        {
            self.controller.workers = workers;
        }

        if let Ok(poll_str) = std::env::var("APPROVAL_RECONCILER_POLL_INTERVAL_SECS")
            && let Ok(poll) = poll_str.parse::<u64>()
            && poll > 0
        {
            self.controller.poll_interval_secs = poll;
        }

        if let Ok(path) = std::env::var("APPROVAL_RECONCILER_STORE_PATH")
            && !path.is_empty()
        {
            self.store.path = Some(path);
        }
    }
}
