mod defaults;
mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{initialize_configuration, load_configuration};

use serde::{Deserialize, Serialize};

use crate::{
    client::ClientConfig,
    dataset::{DatasetBackendType, DatasetConfig},
    endpoint::Endpoint,
    http_api::HttpApiConfig,
    logger::LoggerConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub http_api: HttpApiConfig,
    pub logger: LoggerConfig,
    pub dataset: DatasetConfig,
    pub origin: OriginConfig,
    pub client: ClientConfig,
}

/// Remote service the mirror forwards to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginConfig {
    pub sparql_endpoint: Option<String>,
    pub graph_store: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl OriginConfig {
    /// SPARQL and Graph Store endpoints, credentials attached
    pub fn endpoints(&self) -> Result<(Endpoint, Endpoint), ConfigError> {
        Ok((
            self.endpoint("sparql_endpoint", self.sparql_endpoint.as_deref())?,
            self.endpoint("graph_store", self.graph_store.as_deref())?,
        ))
    }

    fn endpoint(&self, key: &str, uri: Option<&str>) -> Result<Endpoint, ConfigError> {
        let uri = uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "origin.{key} is required for the remote dataset"
                ))
            })?;

        let endpoint = Endpoint::new(uri)
            .map_err(|e| ConfigError::InvalidConfig(format!("origin.{key}: {e}")))?;

        let (username, password) = (self.username.as_deref(), self.password.as_deref());
        Ok(endpoint.with_optional_auth(username, password))
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset.backend == DatasetBackendType::Remote {
            self.origin.endpoints()?;
        }

        if self.origin.username.is_some() != self.origin.password.is_some() {
            return Err(ConfigError::InvalidConfig(
                "origin.username and origin.password must be set together".to_string(),
            ));
        }

        if self.client.max_get_request_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "client.max_get_request_size must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
