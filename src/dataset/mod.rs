mod memory;
mod remote;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use oxigraph::model::{Dataset as RdfDataset, Graph};
use serde::{Deserialize, Serialize};

pub use memory::MemoryDataset;
pub use remote::RemoteDataset;

use crate::{
    client::GraphRef,
    error::Result,
    params::Params,
    rdf::Solutions,
    statement::{Query, UpdateRequest},
};

/// Which dataset implementation backs the proxy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatasetBackendType {
    Remote,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub backend: DatasetBackendType,
}

/// Query answer or graph content returned by a dataset.
///
/// Remote datasets hand back the origin's bytes untouched; local datasets return
/// decoded values for the caller to serialize.
#[derive(Debug, Clone)]
pub enum Payload {
    Raw {
        content_type: String,
        body: Bytes,
    },
    Graph(Graph),
    Solutions(Solutions),
    Boolean(bool),
    Quads(RdfDataset),
}

/// Storage capability served by the proxy resource
///
/// `preferred` is the media type negotiated with the inbound client; remote
/// implementations ask their origin for it first.
#[async_trait]
pub trait Dataset: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn query(&self, query: &Query, preferred: &str, params: &Params) -> Result<Payload>;

    /// Execute an update, returning the status to relay
    async fn update(&self, update: &UpdateRequest, params: &Params) -> Result<StatusCode>;

    async fn get_graph(&self, graph: &GraphRef, preferred: &str, params: &Params)
    -> Result<Payload>;

    async fn contains_graph(&self, graph: &GraphRef, params: &Params) -> Result<bool>;

    /// Replace the graph with the body's content
    async fn put_graph(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: Bytes,
        params: &Params,
    ) -> Result<StatusCode>;

    /// Merge the body's content into the graph
    async fn add_graph(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: Bytes,
        params: &Params,
    ) -> Result<StatusCode>;

    /// Remove a named graph or empty the default graph
    async fn delete_graph(&self, graph: &GraphRef, params: &Params) -> Result<StatusCode>;

    /// Every quad of the dataset, default graph included
    async fn get_quads(&self, preferred: &str, params: &Params) -> Result<Payload>;

    /// Replace the whole dataset with the body's quads
    async fn put_quads(&self, content_type: &str, body: Bytes, params: &Params)
    -> Result<StatusCode>;

    /// Merge the body's quads into the dataset
    async fn add_quads(&self, content_type: &str, body: Bytes, params: &Params)
    -> Result<StatusCode>;

    /// Empty the default graph and drop every named graph
    async fn delete_quads(&self, params: &Params) -> Result<StatusCode>;
}
