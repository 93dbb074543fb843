use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;

use super::{Dataset, Payload};
use crate::{
    client::{GraphRef, GraphStoreClient, HttpTransport, ProtocolResponse, SparqlClient},
    endpoint::Endpoint,
    error::{Error, Result},
    media_types::{BOOLEAN_RESULT, RDF_DATASET, READABLE_GRAPH, RESULT_SET, Syntax, preferring},
    params::Params,
    statement::{Query, QueryForm, UpdateRequest},
};

/// Dataset living on a remote origin, reached through the protocol clients
pub struct RemoteDataset {
    sparql: SparqlClient,
    graph_store: GraphStoreClient,
}

impl RemoteDataset {
    pub fn new(sparql: SparqlClient, graph_store: GraphStoreClient) -> Self {
        Self {
            sparql,
            graph_store,
        }
    }

    /// Both clients share one transport and therefore one connection pool.
    pub fn connect(
        sparql_endpoint: Endpoint,
        graph_store_endpoint: Endpoint,
        transport: HttpTransport,
    ) -> Self {
        tracing::info!(
            sparql_endpoint = %sparql_endpoint,
            graph_store = %graph_store_endpoint,
            "Using remote dataset"
        );

        Self::new(
            SparqlClient::new(sparql_endpoint, transport.clone()),
            GraphStoreClient::new(graph_store_endpoint, transport),
        )
    }
}

/// Check the status and hand the origin's bytes back untouched
fn raw_payload(response: ProtocolResponse) -> Result<Payload> {
    let response = response.error_for_status()?;
    let content_type = response
        .content_type
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            Error::upstream(
                StatusCode::BAD_GATEWAY,
                "origin response carries no content type",
            )
        })?;

    Ok(Payload::Raw {
        content_type,
        body: response.body,
    })
}

fn answer_syntaxes(form: QueryForm) -> &'static [Syntax] {
    match form {
        QueryForm::Construct | QueryForm::Describe => READABLE_GRAPH,
        QueryForm::Ask => BOOLEAN_RESULT,
        QueryForm::Select => RESULT_SET,
    }
}

#[async_trait]
impl Dataset for RemoteDataset {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn query(&self, query: &Query, preferred: &str, params: &Params) -> Result<Payload> {
        let accepted = preferring(preferred, answer_syntaxes(query.form()));
        let response = self.sparql.query(query, &accepted, Some(params)).await?;
        raw_payload(response)
    }

    async fn update(&self, update: &UpdateRequest, params: &Params) -> Result<StatusCode> {
        let response = self.sparql.update(update, Some(params)).await?;
        Ok(response.error_for_status()?.status)
    }

    async fn get_graph(
        &self,
        graph: &GraphRef,
        preferred: &str,
        params: &Params,
    ) -> Result<Payload> {
        let accepted = preferring(preferred, READABLE_GRAPH);
        let response = self.graph_store.get(graph, &accepted, Some(params)).await?;
        raw_payload(response)
    }

    async fn contains_graph(&self, graph: &GraphRef, params: &Params) -> Result<bool> {
        self.graph_store.contains_graph(graph, Some(params)).await
    }

    async fn put_graph(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: Bytes,
        params: &Params,
    ) -> Result<StatusCode> {
        let response = self
            .graph_store
            .put(graph, content_type, body, Some(params))
            .await?;
        Ok(response.error_for_status()?.status)
    }

    async fn add_graph(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: Bytes,
        params: &Params,
    ) -> Result<StatusCode> {
        let response = self
            .graph_store
            .post(graph, content_type, body, Some(params))
            .await?;
        Ok(response.error_for_status()?.status)
    }

    async fn delete_graph(&self, graph: &GraphRef, params: &Params) -> Result<StatusCode> {
        let response = self.graph_store.delete(graph, Some(params)).await?;
        Ok(response.error_for_status()?.status)
    }

    async fn get_quads(&self, preferred: &str, params: &Params) -> Result<Payload> {
        let accepted = preferring(preferred, RDF_DATASET);
        let response = self.graph_store.get_quads(&accepted, Some(params)).await?;
        raw_payload(response)
    }

    async fn put_quads(
        &self,
        content_type: &str,
        body: Bytes,
        params: &Params,
    ) -> Result<StatusCode> {
        let response = self
            .graph_store
            .put_quads(content_type, body, Some(params))
            .await?;
        Ok(response.error_for_status()?.status)
    }

    async fn add_quads(
        &self,
        content_type: &str,
        body: Bytes,
        params: &Params,
    ) -> Result<StatusCode> {
        let response = self
            .graph_store
            .post_quads(content_type, body, Some(params))
            .await?;
        Ok(response.error_for_status()?.status)
    }

    async fn delete_quads(&self, params: &Params) -> Result<StatusCode> {
        let response = self.graph_store.delete_quads(Some(params)).await?;
        Ok(response.error_for_status()?.status)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header_regex, method, path, query_param},
    };

    use super::*;
    use crate::{
        client::ClientConfig,
        error::UpstreamErrorKind,
        media_types::{APPLICATION_N_QUADS, TEXT_TURTLE},
    };

    fn dataset(server: &MockServer) -> RemoteDataset {
        RemoteDataset::connect(
            Endpoint::new(&format!("{}/sparql", server.uri())).unwrap(),
            Endpoint::new(&format!("{}/data", server.uri())).unwrap(),
            HttpTransport::new(&ClientConfig::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn relays_origin_bytes_and_asks_for_preferred_type_first() {
        let server = MockServer::start().await;
        let turtle = "<http://a> <http://b> <http://c> .\n";
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("default", ""))
            .and(header_regex("accept", "^text/turtle, "))
            .respond_with(ResponseTemplate::new(200).set_body_raw(turtle, TEXT_TURTLE))
            .expect(1)
            .mount(&server)
            .await;

        let payload = dataset(&server)
            .get_graph(&GraphRef::Default, TEXT_TURTLE, &Params::new())
            .await
            .unwrap();
        let Payload::Raw { content_type, body } = payload else {
            panic!("expected raw payload");
        };
        assert_eq!(content_type, TEXT_TURTLE);
        assert_eq!(body, Bytes::from(turtle));
    }

    #[tokio::test]
    async fn classifies_origin_failures() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(400).set_body_string("syntax error"))
            .mount(&server)
            .await;

        let dataset = dataset(&server);
        let err = dataset
            .delete_graph(&GraphRef::named("http://gone"), &Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::NotFound));

        let update = UpdateRequest::parse("CLEAR ALL").unwrap();
        let err = dataset.update(&update, &Params::new()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Upstream {
                kind: UpstreamErrorKind::ClientRejected,
                status: 400,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn relays_write_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(query_param("graph", "http://example.org/g"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let status = dataset(&server)
            .put_graph(
                &GraphRef::named("http://example.org/g"),
                TEXT_TURTLE,
                Bytes::from_static(b"<http://a> <http://b> <http://c> ."),
                &Params::new(),
            )
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn dataset_requests_carry_no_selector() {
        let server = MockServer::start().await;
        let nquads = "<http://a> <http://b> <http://c> <http://g> .\n";
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header_regex("accept", "^application/n-quads, "))
            .respond_with(ResponseTemplate::new(200).set_body_raw(nquads, APPLICATION_N_QUADS))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/data"))
            .and(header_regex("content-type", "^application/n-quads"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dataset = dataset(&server);
        let payload = dataset
            .get_quads(APPLICATION_N_QUADS, &Params::new())
            .await
            .unwrap();
        assert!(matches!(
            payload,
            Payload::Raw { ref content_type, .. } if content_type == APPLICATION_N_QUADS
        ));

        let status = dataset
            .put_quads(APPLICATION_N_QUADS, Bytes::from(nquads), &Params::new())
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        for request in server.received_requests().await.unwrap() {
            assert_eq!(request.url.query(), None, "{}", request.url);
        }
    }
}
