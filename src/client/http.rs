use super::ApprovalClient;
use super::types::{ApprovalRequestRecord, CreateApprovalRequest};
use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Approval service client speaking JSON over HTTP.
pub struct HttpApprovalClient {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

impl HttpApprovalClient {
    pub fn new(endpoint: &str, token: Option<&str>) -> Result<Self, ClientError> {
        Self::with_client(endpoint, token, super::http_client::build_service_client())
    }

    pub fn with_timeout(
        endpoint: &str,
        token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        Self::with_client(
            endpoint,
            token,
            super::http_client::build_service_client_with_timeout(timeout_secs),
        )
    }

    fn with_client(endpoint: &str, token: Option<&str>, client: Client) -> Result<Self, ClientError> {
        let parsed = url::Url::parse(endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToString::to_string),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ClientError> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                operation,
                message: e.to_string(),
            })
    }

    async fn decode(
        operation: &'static str,
        response: Response,
    ) -> Result<ApprovalRequestRecord, ClientError> {
        response
            .json::<ApprovalRequestRecord>()
            .await
            .map_err(|e| ClientError::Decode {
                operation,
                message: e.to_string(),
            })
    }
}

async fn status_error(operation: &'static str, response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status {
        operation,
        status,
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}

fn is_absent(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait]
impl ApprovalClient for HttpApprovalClient {
    async fn fetch(&self, id: u64) -> Result<ApprovalRequestRecord, ClientError> {
        let url = self.locator(id);
        let response = self.send("fetch", self.client.get(&url)).await?;

        if is_absent(response.status()) {
            return Err(ClientError::NotFound { id });
        }
        if !response.status().is_success() {
            return Err(status_error("fetch", response).await);
        }

        Self::decode("fetch", response).await
    }

    async fn create(
        &self,
        requester: &str,
        subject: &str,
    ) -> Result<ApprovalRequestRecord, ClientError> {
        let url = format!("{}/approval_requests", self.endpoint);
        let body = CreateApprovalRequest { requester, subject };
        let response = self
            .send("create", self.client.post(&url).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(status_error("create", response).await);
        }

        Self::decode("create", response).await
    }

    async fn archive(&self, id: u64) -> Result<(), ClientError> {
        let url = format!("{}/archive", self.locator(id));
        let response = self.send("archive", self.client.post(&url)).await?;

        if is_absent(response.status()) {
            return Err(ClientError::NotFound { id });
        }
        if !response.status().is_success() {
            return Err(status_error("archive", response).await);
        }

        Ok(())
    }

    fn locator(&self, id: u64) -> String {
        format!("{}/approval_requests/{id}", self.endpoint)
    }
}
