//! Typed defaults, the lowest configuration layer.
//!
//! The defaults serve an empty in-memory dataset so the binary starts without any
//! config file; pointing it at an origin needs `dataset.backend = "remote"` and an
//! `[origin]` section.

use super::{Config, OriginConfig};
use crate::{
    client::ClientConfig,
    dataset::{DatasetBackendType, DatasetConfig},
    http_api::HttpApiConfig,
    logger::{LogFormat, LoggerConfig},
};

pub(crate) fn config() -> Config {
    Config {
        http_api: HttpApiConfig::default(),
        logger: LoggerConfig {
            level: "info,sparql_mirror=debug".to_string(),
            format: LogFormat::Pretty,
        },
        dataset: DatasetConfig {
            backend: DatasetBackendType::Memory,
        },
        origin: OriginConfig::default(),
        client: ClientConfig::default(),
    }
}
