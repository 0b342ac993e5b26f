pub mod schema;

pub use schema::{
    Config, ControllerConfig, CredentialsSource, ObservabilityConfig, ProviderConfig,
    ReliabilityConfig, StoreConfig,
};
