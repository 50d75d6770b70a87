use serde::Deserialize;
use storage::config::StoreConfig;
use storage::types::is_valid_resource_id;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("Aggregator concurrency must be at least 1")]
    InvalidConcurrency,
}

/// API server configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Listener for incoming requests
    #[serde(default)]
    pub listener: Listener,
    /// Namespace of the orchestration store holding the resources
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Backing store connection parameters
    pub store: StoreConfig,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if !is_valid_resource_id(&self.namespace) {
            return Err(ValidationError::InvalidNamespace(self.namespace.clone()));
        }

        if self.aggregator.max_concurrency == 0 {
            return Err(ValidationError::InvalidConcurrency);
        }

        Ok(())
    }
}

fn default_namespace() -> String {
    "default".into()
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 7745,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CorsConfig {
    /// Origins allowed to read responses. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allowed_origins: vec!["*".into()],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AggregatorConfig {
    /// Upper bound on concurrent build listings per summary request
    pub max_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig { max_concurrency: 8 }
    }
}
