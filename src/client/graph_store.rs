use std::fmt;

use bytes::Bytes;
use http::{
    HeaderMap, Method, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use oxigraph::model::{Dataset as RdfDataset, Graph};
use url::Url;

use super::{HttpTransport, ProtocolResponse};
use crate::{
    encoder::{encode_component, encode_pair, header_value, with_encoded_query},
    endpoint::Endpoint,
    error::{Error, Result},
    media_types::{MediaType, RDF_DATASET, READABLE_GRAPH, accept_header, media_types},
    params::Params,
};

pub const DEFAULT_GRAPH_PARAM: &str = "default";
pub const GRAPH_PARAM: &str = "graph";

const SELECTOR_PARAMS: &[&str] = &[DEFAULT_GRAPH_PARAM, GRAPH_PARAM];

/// Target of a Graph Store operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphRef {
    Default,
    Named(String),
}

impl GraphRef {
    pub fn named(uri: impl Into<String>) -> Self {
        Self::Named(uri.into())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Encoded selector item: `default` (valueless) or `graph=<uri>`
    pub(crate) fn selector(&self) -> String {
        match self {
            Self::Default => DEFAULT_GRAPH_PARAM.to_string(),
            Self::Named(uri) => format!("{GRAPH_PARAM}={}", encode_component(uri)),
        }
    }
}

impl fmt::Display for GraphRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default graph"),
            Self::Named(uri) => write!(f, "<{uri}>"),
        }
    }
}

/// Graph Store HTTP Protocol client bound to one graph store endpoint
#[derive(Debug, Clone)]
pub struct GraphStoreClient {
    endpoint: Endpoint,
    transport: HttpTransport,
}

impl GraphStoreClient {
    pub fn new(endpoint: Endpoint, transport: HttpTransport) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Request URI: the selector comes first and caller parameters cannot override it.
    pub(crate) fn target_url(&self, graph: &GraphRef, params: Option<&Params>) -> Url {
        self.url_with(Some(graph.selector()), params)
    }

    /// Request URI for the whole dataset: no selector at all.
    pub(crate) fn dataset_url(&self, params: Option<&Params>) -> Url {
        self.url_with(None, params)
    }

    fn url_with(&self, selector: Option<String>, params: Option<&Params>) -> Url {
        let mut items: Vec<String> = selector.into_iter().collect();
        if let Some(params) = params {
            items.extend(
                params
                    .pairs_except(SELECTOR_PARAMS)
                    .map(|(key, value)| encode_pair(key, value)),
            );
        }
        with_encoded_query(self.endpoint.url(), &items)
    }

    pub async fn get(
        &self,
        graph: &GraphRef,
        accepted: &[MediaType],
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let headers = read_headers(accepted)?;
        self.send(Method::GET, Some(graph), headers, None, params)
            .await
    }

    /// Status-only existence check; 2xx means the graph exists.
    pub async fn head_exists(
        &self,
        graph: &GraphRef,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        self.send(Method::HEAD, Some(graph), HeaderMap::new(), None, params)
            .await
    }

    /// Replace the graph's content
    pub async fn put(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: impl Into<Bytes>,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let headers = write_headers(content_type)?;
        self.send(Method::PUT, Some(graph), headers, Some(body.into()), params)
            .await
    }

    /// Merge into the graph, creating it if absent
    pub async fn post(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: impl Into<Bytes>,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let headers = write_headers(content_type)?;
        self.send(Method::POST, Some(graph), headers, Some(body.into()), params)
            .await
    }

    /// Remove a named graph, or empty the default graph
    pub async fn delete(
        &self,
        graph: &GraphRef,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        self.send(Method::DELETE, Some(graph), HeaderMap::new(), None, params)
            .await
    }

    pub async fn delete_default(&self, params: Option<&Params>) -> Result<ProtocolResponse> {
        self.delete(&GraphRef::Default, params).await
    }

    /// Fetch and decode a graph; non-2xx becomes an `Upstream` error.
    pub async fn get_graph(&self, graph: &GraphRef, params: Option<&Params>) -> Result<Graph> {
        self.get(graph, &media_types(READABLE_GRAPH), params)
            .await?
            .into_graph()
    }

    pub async fn contains_graph(&self, graph: &GraphRef, params: Option<&Params>) -> Result<bool> {
        let response = self.head_exists(graph, params).await?;
        match response.status {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            _ => response.error_for_status().map(|_| false),
        }
    }

    /// Fetch every quad of the store, sent without a selector
    pub async fn get_quads(
        &self,
        accepted: &[MediaType],
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let headers = read_headers(accepted)?;
        self.send(Method::GET, None, headers, None, params).await
    }

    /// Replace the whole store with the body's quads
    pub async fn put_quads(
        &self,
        content_type: &str,
        body: impl Into<Bytes>,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let headers = write_headers(content_type)?;
        self.send(Method::PUT, None, headers, Some(body.into()), params)
            .await
    }

    /// Merge the body's quads into the store
    pub async fn post_quads(
        &self,
        content_type: &str,
        body: impl Into<Bytes>,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let headers = write_headers(content_type)?;
        self.send(Method::POST, None, headers, Some(body.into()), params)
            .await
    }

    /// Empty the store: default graph cleared, named graphs dropped
    pub async fn delete_quads(&self, params: Option<&Params>) -> Result<ProtocolResponse> {
        self.send(Method::DELETE, None, HeaderMap::new(), None, params)
            .await
    }

    /// Fetch and decode the whole store; non-2xx becomes an `Upstream` error.
    pub async fn get_dataset(&self, params: Option<&Params>) -> Result<RdfDataset> {
        self.get_quads(&media_types(RDF_DATASET), params)
            .await?
            .into_dataset()
    }

    async fn send(
        &self,
        method: Method,
        graph: Option<&GraphRef>,
        headers: HeaderMap,
        body: Option<Bytes>,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let url = match graph {
            Some(graph) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    method = %method,
                    graph = %graph,
                    "Executing graph store request"
                );
                self.target_url(graph, params)
            }
            None => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    method = %method,
                    "Executing quad store request"
                );
                self.dataset_url(params)
            }
        };

        self.transport
            .execute(&self.endpoint, method, url, headers, body)
            .await
    }
}

fn read_headers(accepted: &[MediaType]) -> Result<HeaderMap> {
    if accepted.is_empty() {
        return Err(Error::Precondition(
            "accepted media types must not be empty".to_string(),
        ));
    }

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, header_value(&accept_header(accepted))?);
    Ok(headers)
}

/// Write operations need an explicit, well-formed content type
fn write_headers(content_type: &str) -> Result<HeaderMap> {
    if MediaType::parse(content_type).is_none() {
        return Err(Error::Precondition(format!(
            "write requires an explicit content type, got '{content_type}'"
        )));
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, header_value(content_type.trim())?);
    Ok(headers)
}
