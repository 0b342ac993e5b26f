//! Turns an `ApprovalRequest` into a ready-to-use approval service client.
//!
//! 1. Look up the provider config the record references.
//! 2. Resolve that provider's credential blob.
//! 3. Hand config and credentials to the client factory.
//!
//! The connector never retries; the controller backs off on failure.

use crate::client::{ApprovalClient, HttpApprovalClient};
use crate::config::{CredentialsSource, ProviderConfig};
use crate::error::{ClientError, ConnectError};
use crate::resource::ApprovalRequest;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        resource: &ApprovalRequest,
    ) -> Result<Arc<dyn ApprovalClient>, ConnectError>;
}

/// Builds a client from a provider config and its (possibly empty) credentials.
pub type ClientFactory = Arc<
    dyn Fn(&ProviderConfig, &[u8]) -> Result<Arc<dyn ApprovalClient>, ClientError> + Send + Sync,
>;

pub struct ProviderConnector {
    providers: BTreeMap<String, ProviderConfig>,
    new_client: ClientFactory,
}

impl ProviderConnector {
    pub fn new(providers: BTreeMap<String, ProviderConfig>) -> Self {
        Self::with_factory(providers, Arc::new(new_http_client))
    }

    pub fn with_factory(
        providers: BTreeMap<String, ProviderConfig>,
        new_client: ClientFactory,
    ) -> Self {
        Self {
            providers,
            new_client,
        }
    }
}

#[async_trait]
impl Connector for ProviderConnector {
    async fn connect(
        &self,
        resource: &ApprovalRequest,
    ) -> Result<Arc<dyn ApprovalClient>, ConnectError> {
        let name = &resource.spec.provider_config_ref;
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| ConnectError::ProviderConfigNotFound { name: name.clone() })?;

        let credentials = read_credentials(&provider.credentials)
            .await
            .map_err(|message| ConnectError::Credentials {
                provider: name.clone(),
                message,
            })?;

        Ok((self.new_client)(provider, &credentials)?)
    }
}

/// Resolve the opaque credential blob. Its contents are not interpreted here.
async fn read_credentials(source: &CredentialsSource) -> Result<Vec<u8>, String> {
    match source {
        CredentialsSource::None => Ok(Vec::new()),
        CredentialsSource::Env { var } => std::env::var(var)
            .map(String::into_bytes)
            .map_err(|e| format!("environment variable {var}: {e}")),
        CredentialsSource::File { path } => {
            let expanded = shellexpand::tilde(path).into_owned();
            tokio::fs::read(&expanded)
                .await
                .map_err(|e| format!("credentials file {expanded}: {e}"))
        }
    }
}

fn new_http_client(
    provider: &ProviderConfig,
    credentials: &[u8],
) -> Result<Arc<dyn ApprovalClient>, ClientError> {
    let token = std::str::from_utf8(credentials).map_err(|e| {
        ClientError::InvalidCredentials(format!("bearer token is not valid UTF-8: {e}"))
    })?;
    let client =
        HttpApprovalClient::with_timeout(&provider.endpoint, Some(token), provider.request_timeout_secs)?;
    Ok(Arc::new(client))
}
