use std::time::Duration;
use thiserror::Error;

// ─── Config errors ───────────────────────────────────────────────────────────

/// Rejected configuration values. File access and parse failures stay in
/// `anyhow` so the loader can attach the offending path.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Approval service client errors ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
    /// The approval service has no record with this id.
    #[error("approval request {id} not found")]
    NotFound { id: u64 },

    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} response could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ─── Connector errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("provider config {name} not found")]
    ProviderConfigNotFound { name: String },

    #[error("cannot get credentials for provider config {provider}: {message}")]
    Credentials { provider: String, message: String },

    #[error("cannot create approval service client: {0}")]
    NewClient(#[from] ClientError),
}

// ─── State store errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource {key} not found")]
    NotFound { key: String },

    #[error("invalid resource: {0}")]
    Invalid(String),

    #[error("state file is corrupt: {0}")]
    Corrupt(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Reconciliation errors ───────────────────────────────────────────────────

/// Typed outcome of a failed reconciliation step. Every variant except
/// [`ReconcileError::Cancelled`] is retried by the controller with backoff.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot connect to approval service: {0}")]
    Connect(#[from] ConnectError),

    #[error("cannot observe approval request {id}: {source}")]
    Observe {
        id: u64,
        #[source]
        source: ClientError,
    },

    #[error("cannot create approval request: {0}")]
    Create(#[source] ClientError),

    #[error("approval request already created with id {id}")]
    AlreadyCreated { id: u64 },

    #[error("cannot archive approval request {id}: {source}")]
    Delete {
        id: u64,
        #[source]
        source: ClientError,
    },

    #[error("cannot persist status: {0}")]
    Persist(#[from] StoreError),

    #[error("reconcile deadline of {}s exceeded", .0.as_secs())]
    DeadlineExceeded(Duration),

    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
