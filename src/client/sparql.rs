use oxigraph::model::Graph;

use super::{HttpTransport, ProtocolResponse};
use crate::{
    endpoint::Endpoint,
    error::{Error, Result},
    media_types::{BOOLEAN_RESULT, MediaType, READABLE_GRAPH, RESULT_SET, media_types},
    params::Params,
    rdf::Solutions,
    statement::{Query, QueryForm, UpdateRequest},
};

/// SPARQL 1.1 Protocol client bound to one query/update endpoint
#[derive(Debug, Clone)]
pub struct SparqlClient {
    endpoint: Endpoint,
    transport: HttpTransport,
}

impl SparqlClient {
    pub fn new(endpoint: Endpoint, transport: HttpTransport) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Execute a query in one round-trip. The response is returned undecoded,
    /// whatever its status.
    pub async fn query(
        &self,
        query: &Query,
        accepted: &[MediaType],
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let request = self
            .transport
            .encoder()
            .encode_query(&self.endpoint, query, accepted, params)?;

        tracing::debug!(
            endpoint = %self.endpoint,
            form = %query.form(),
            method = %request.method,
            "Executing SPARQL query"
        );

        self.transport.send(&self.endpoint, request).await
    }

    /// Execute an update; the answer carries a status only.
    pub async fn update(
        &self,
        update: &UpdateRequest,
        params: Option<&Params>,
    ) -> Result<ProtocolResponse> {
        let request = self
            .transport
            .encoder()
            .encode_update(&self.endpoint, update, params)?;

        tracing::debug!(
            endpoint = %self.endpoint,
            operations = update.operation_count(),
            "Executing SPARQL update"
        );

        self.transport.send(&self.endpoint, request).await
    }

    /// Run a CONSTRUCT or DESCRIBE query and decode the graph
    pub async fn load_graph(&self, query: &Query, params: Option<&Params>) -> Result<Graph> {
        require_form(query, |form| form.returns_graph())?;
        self.query(query, &media_types(READABLE_GRAPH), params)
            .await?
            .into_graph()
    }

    pub async fn select(&self, query: &Query, params: Option<&Params>) -> Result<Solutions> {
        require_form(query, |form| form == QueryForm::Select)?;
        self.query(query, &media_types(RESULT_SET), params)
            .await?
            .into_solutions()
    }

    pub async fn ask(&self, query: &Query, params: Option<&Params>) -> Result<bool> {
        require_form(query, |form| form == QueryForm::Ask)?;
        self.query(query, &media_types(BOOLEAN_RESULT), params)
            .await?
            .into_boolean()
    }

    pub async fn execute_update(
        &self,
        update: &UpdateRequest,
        params: Option<&Params>,
    ) -> Result<()> {
        self.update(update, params).await?.error_for_status()?;
        Ok(())
    }
}

fn require_form(query: &Query, accepts: impl Fn(QueryForm) -> bool) -> Result<()> {
    let form = query.form();
    if accepts(form) {
        Ok(())
    } else {
        Err(Error::Precondition(format!(
            "{form} query cannot be decoded this way"
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use http::StatusCode;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header, header_exists, method, path, query_param},
    };

    use super::*;
    use crate::{client::ClientConfig, error::UpstreamErrorKind};

    fn client(server: &MockServer, config: &ClientConfig) -> SparqlClient {
        let endpoint = Endpoint::new(&format!("{}/ds/sparql", server.uri())).unwrap();
        SparqlClient::new(endpoint, HttpTransport::new(config).unwrap())
    }

    #[tokio::test]
    async fn short_select_is_sent_as_get() {
        let server = MockServer::start().await;
        let query = Query::parse("SELECT ?s WHERE { ?s ?p ?o }").unwrap();

        Mock::given(method("GET"))
            .and(path("/ds/sparql"))
            .and(query_param("query", query.to_string()))
            .and(header_exists("accept"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"head":{"vars":["s"]},"results":{"bindings":[{"s":{"type":"uri","value":"http://a"}}]}}"#,
                "application/sparql-results+json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let solutions = client(&server, &ClientConfig::default())
            .select(&query, None)
            .await
            .unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions.value(0, "s").unwrap().to_string(), "<http://a>");
    }

    #[tokio::test]
    async fn oversized_query_is_form_posted() {
        let server = MockServer::start().await;
        let query = Query::parse("ASK { ?s ?p ?o }").unwrap();

        Mock::given(method("POST"))
            .and(path("/ds/sparql"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("query=ASK"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"head":{},"boolean":true}"#,
                "application/sparql-results+json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            max_get_request_size: 4,
            ..ClientConfig::default()
        };
        assert!(client(&server, &config).ask(&query, None).await.unwrap());
    }

    #[tokio::test]
    async fn non_success_is_returned_as_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let query = Query::parse("SELECT * WHERE { ?s ?p ?o }").unwrap();
        let client = client(&server, &ClientConfig::default());

        let response = client
            .query(&query, &media_types(RESULT_SET), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

        let err = client.select(&query, None).await.unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::BadGateway));
    }

    #[tokio::test]
    async fn update_posts_form_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ds/sparql"))
            .and(header("authorization", "Basic YWRtaW46czNjcmV0"))
            .and(body_string_contains("update=CLEAR"))
            .and(body_string_contains("using-graph-uri="))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::new(&format!("{}/ds/sparql", server.uri()))
            .unwrap()
            .with_basic_auth("admin", "s3cret");
        let client = SparqlClient::new(
            endpoint,
            HttpTransport::new(&ClientConfig::default()).unwrap(),
        );
        let update = UpdateRequest::parse("CLEAR DEFAULT").unwrap();
        let params = Params::new().with("using-graph-uri", "http://example.org/g");

        client.execute_update(&update, Some(&params)).await.unwrap();
    }

    #[tokio::test]
    async fn credential_less_endpoint_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ds/sparql"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let update = UpdateRequest::parse("CLEAR DEFAULT").unwrap();
        client(&server, &ClientConfig::default())
            .execute_update(&update, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wrong_form_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let query = Query::parse("SELECT * WHERE { ?s ?p ?o }").unwrap();
        let result = client(&server, &ClientConfig::default())
            .load_graph(&query, None)
            .await;
        assert!(matches!(result, Err(Error::Precondition(_))));
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let endpoint = Endpoint::new("http://127.0.0.1:9/sparql").unwrap();
        let client = SparqlClient::new(
            endpoint,
            HttpTransport::new(&ClientConfig::default()).unwrap(),
        );
        let query = Query::parse("ASK { ?s ?p ?o }").unwrap();

        assert!(matches!(
            client.ask(&query, None).await,
            Err(Error::Transport(_))
        ));
    }
}
