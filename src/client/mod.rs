//! HTTP clients for the SPARQL 1.1 Protocol and the Graph Store HTTP Protocol.
//!
//! Both clients return non-2xx answers as [`ProtocolResponse`] data; only transport
//! faults and local precondition failures are raised as errors.

mod graph_store;
mod response;
mod sparql;

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

pub use graph_store::{DEFAULT_GRAPH_PARAM, GRAPH_PARAM, GraphRef, GraphStoreClient};
pub use response::ProtocolResponse;
pub use sparql::SparqlClient;

use crate::{
    encoder::{DEFAULT_MAX_GET_REQUEST_SIZE, EncodedRequest, RequestEncoder},
    endpoint::{Credentials, Endpoint},
    error::Result,
};

/// Outbound HTTP settings, fixed when the transport is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Queries longer than this many characters are sent as form POSTs
    pub max_get_request_size: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_get_request_size: DEFAULT_MAX_GET_REQUEST_SIZE,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 60_000,
            pool_max_idle_per_host: 10,
        }
    }
}

/// Pooled HTTP transport shared by the protocol clients.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    encoder: RequestEncoder,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            // Close idle connections after 30 seconds
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            encoder: RequestEncoder::new(config.max_get_request_size),
        })
    }

    pub fn encoder(&self) -> &RequestEncoder {
        &self.encoder
    }

    pub(crate) async fn send(
        &self,
        endpoint: &Endpoint,
        request: EncodedRequest,
    ) -> Result<ProtocolResponse> {
        self.execute(
            endpoint,
            request.method,
            request.url,
            request.headers,
            request.body.map(Bytes::from),
        )
        .await
    }

    /// One round-trip; the body is fully buffered before returning.
    pub(crate) async fn execute(
        &self,
        endpoint: &Endpoint,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<ProtocolResponse> {
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut builder = self.client.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = with_credentials(builder, endpoint).send().await?;
        let response = ProtocolResponse::read(response).await?;

        tracing::debug!(
            method = %method,
            status = response.status.as_u16(),
            content_type = response.content_type.as_deref().unwrap_or("-"),
            bytes = response.body.len(),
            "Received response"
        );

        Ok(response)
    }
}

/// Attach HTTP Basic credentials when the endpoint carries them
fn with_credentials(builder: RequestBuilder, endpoint: &Endpoint) -> RequestBuilder {
    match endpoint.credentials() {
        Some(Credentials { username, password }) => builder.basic_auth(username, Some(password)),
        None => builder,
    }
}
