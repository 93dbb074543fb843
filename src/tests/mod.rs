//! End-to-end tests: the HTTP binding on an ephemeral port, driven by the
//! protocol clients.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use http::{
    StatusCode,
    header::{ACCEPT, ETAG, IF_NONE_MATCH},
};
use tokio::sync::oneshot;

use crate::{
    client::{ClientConfig, GraphRef, GraphStoreClient, HttpTransport, SparqlClient},
    dataset::{Dataset, MemoryDataset, RemoteDataset},
    endpoint::Endpoint,
    error::UpstreamErrorKind,
    hash::{hash_dataset, hash_graph},
    http_api::{HttpApiConfig, HttpApiRouter},
    media_types::{APPLICATION_N_QUADS, APPLICATION_N_TRIPLES, TEXT_TURTLE},
    params::Params,
    proxy::ProxyResource,
    rdf,
    statement::{Query, UpdateRequest},
};

const TURTLE: &str = r#"
    @prefix ex: <http://example.org/> .
    ex:alice ex:knows ex:bob ;
        ex:name "Alice" .
"#;

/// A running mirror; dropping it shuts the server down
struct TestServer {
    base: String,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    async fn start(dataset: Arc<dyn Dataset>) -> Self {
        let config = HttpApiConfig {
            port: 0,
            max_body_bytes: 1024 * 1024,
        };
        let router = HttpApiRouter::new(&config, Arc::new(ProxyResource::new(dataset)));
        let listener = router.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(router.listen_and_handle_http_requests(listener, shutdown_rx));

        Self {
            base: format!("http://{addr}"),
            _shutdown: shutdown_tx,
        }
    }

    async fn memory() -> Self {
        Self::start(Arc::new(MemoryDataset::new().unwrap())).await
    }

    fn endpoint(&self, path: &str) -> Endpoint {
        Endpoint::new(&format!("{}{path}", self.base)).unwrap()
    }

    fn sparql(&self, config: &ClientConfig) -> SparqlClient {
        SparqlClient::new(self.endpoint("/sparql"), HttpTransport::new(config).unwrap())
    }

    fn graph_store(&self) -> GraphStoreClient {
        GraphStoreClient::new(
            self.endpoint("/service"),
            HttpTransport::new(&ClientConfig::default()).unwrap(),
        )
    }
}

fn expected_hash() -> u64 {
    hash_graph(&rdf::parse_graph(TEXT_TURTLE, TURTLE.as_bytes()).unwrap())
}

#[tokio::test]
async fn put_then_get_default_graph() {
    let server = TestServer::memory().await;
    let store = server.graph_store();

    let response = store
        .put(&GraphRef::Default, TEXT_TURTLE, TURTLE, None)
        .await
        .unwrap();
    assert!(response.is_success());

    let graph = store.get_graph(&GraphRef::Default, None).await.unwrap();
    assert_eq!(graph.len(), 2);
    assert_eq!(hash_graph(&graph), expected_hash());
}

#[tokio::test]
async fn delete_default_graph_leaves_it_empty() {
    let server = TestServer::memory().await;
    let store = server.graph_store();
    store
        .put(&GraphRef::Default, TEXT_TURTLE, TURTLE, None)
        .await
        .unwrap();

    let response = store.delete_default(None).await.unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let graph = store.get_graph(&GraphRef::Default, None).await.unwrap();
    assert!(graph.is_empty());
}

#[tokio::test]
async fn named_graph_post_get_delete() {
    let server = TestServer::memory().await;
    let store = server.graph_store();
    let graph = GraphRef::named("http://example.org/people?v=1");

    assert!(!store.contains_graph(&graph, None).await.unwrap());

    let created = store
        .post(&graph, TEXT_TURTLE, TURTLE, None)
        .await
        .unwrap();
    assert_eq!(created.status, StatusCode::CREATED);
    assert!(store.contains_graph(&graph, None).await.unwrap());

    let fetched = store.get_graph(&graph, None).await.unwrap();
    assert_eq!(hash_graph(&fetched), expected_hash());

    let default = store.get_graph(&GraphRef::Default, None).await.unwrap();
    assert!(default.is_empty());

    let deleted = store.delete(&graph, None).await.unwrap();
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(!store.contains_graph(&graph, None).await.unwrap());

    let err = store.get_graph(&graph, None).await.unwrap_err();
    assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::NotFound));
}

#[tokio::test]
async fn graph_selector_must_be_exclusive() {
    let server = TestServer::memory().await;

    let both = GraphStoreClient::new(
        Endpoint::new(&format!("{}/service?graph=http%3A%2F%2Fg", server.base)).unwrap(),
        HttpTransport::new(&ClientConfig::default()).unwrap(),
    );
    let response = both.delete_default(None).await.unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let neither = reqwest::get(format!("{}/service", server.base)).await.unwrap();
    assert_eq!(neither.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sparql_queries_over_get_and_post() {
    let server = TestServer::memory().await;
    let update = UpdateRequest::parse(
        r#"PREFIX ex: <http://example.org/>
           INSERT DATA { ex:alice ex:knows ex:bob . ex:bob ex:knows ex:carol }"#,
    )
    .unwrap();

    for max_get_request_size in [8192, 16] {
        let client = server.sparql(&ClientConfig {
            max_get_request_size,
            ..ClientConfig::default()
        });
        client.execute_update(&update, None).await.unwrap();

        let select = Query::parse(
            "SELECT ?who WHERE { ?who <http://example.org/knows> ?someone } ORDER BY ?who",
        )
        .unwrap();
        let solutions = client.select(&select, None).await.unwrap();
        assert_eq!(solutions.len(), 2, "threshold {max_get_request_size}");

        let ask = Query::parse("ASK { <http://example.org/carol> ?p ?o }").unwrap();
        assert!(!client.ask(&ask, None).await.unwrap());

        let construct = Query::parse("CONSTRUCT WHERE { ?s ?p ?o }").unwrap();
        assert_eq!(client.load_graph(&construct, None).await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn conditional_get_answers_not_modified() {
    let server = TestServer::memory().await;
    server
        .graph_store()
        .put(&GraphRef::Default, TEXT_TURTLE, TURTLE, None)
        .await
        .unwrap();

    let http = reqwest::Client::new();
    let url = format!("{}/service?default", server.base);
    let first = http
        .get(&url)
        .header(ACCEPT, APPLICATION_N_TRIPLES)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let etag = first.headers().get(ETAG).unwrap().clone();

    let second = http
        .get(&url)
        .header(ACCEPT, APPLICATION_N_TRIPLES)
        .header(IF_NONE_MATCH, etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn mirror_relays_to_origin() {
    let origin = TestServer::memory().await;
    let mirror = TestServer::start(Arc::new(RemoteDataset::connect(
        origin.endpoint("/sparql"),
        origin.endpoint("/service"),
        HttpTransport::new(&ClientConfig::default()).unwrap(),
    )))
    .await;

    let graph = GraphRef::named("http://example.org/mirrored");
    let through_mirror = mirror.graph_store();

    let created = through_mirror
        .put(&graph, TEXT_TURTLE, TURTLE, None)
        .await
        .unwrap();
    assert_eq!(created.status, StatusCode::CREATED);

    // Written through the mirror, visible at the origin
    let at_origin = origin.graph_store().get_graph(&graph, None).await.unwrap();
    assert_eq!(hash_graph(&at_origin), expected_hash());

    let via_mirror = through_mirror.get_graph(&graph, None).await.unwrap();
    assert_eq!(hash_graph(&via_mirror), expected_hash());

    let client = mirror.sparql(&ClientConfig::default());
    let mut params = Params::new();
    params.add("named-graph-uri", "http://example.org/mirrored");
    let ask = Query::parse("ASK { GRAPH ?g { ?s <http://example.org/name> \"Alice\" } }").unwrap();
    assert!(client.ask(&ask, Some(&params)).await.unwrap());

    let missing = GraphRef::named("http://example.org/absent");
    assert!(!through_mirror.contains_graph(&missing, None).await.unwrap());
    let err = through_mirror.get_graph(&missing, None).await.unwrap_err();
    assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::NotFound));
}

#[tokio::test]
async fn whole_store_round_trips_through_a_mirror() {
    let origin = TestServer::memory().await;
    let mirror = TestServer::start(Arc::new(RemoteDataset::connect(
        origin.endpoint("/sparql"),
        origin.endpoint("/service"),
        HttpTransport::new(&ClientConfig::default()).unwrap(),
    )))
    .await;
    let nquads = concat!(
        "<http://example.org/a> <http://example.org/p> \"1\" .\n",
        "<http://example.org/a> <http://example.org/p> _:b <http://example.org/g> .\n",
    );

    let through_mirror = mirror.graph_store();
    let written = through_mirror
        .put_quads(APPLICATION_N_QUADS, nquads, None)
        .await
        .unwrap();
    assert_eq!(written.status, StatusCode::OK);

    let expected = rdf::parse_dataset(APPLICATION_N_QUADS, nquads.as_bytes()).unwrap();
    let at_origin = origin.graph_store().get_dataset(None).await.unwrap();
    assert_eq!(hash_dataset(&at_origin), hash_dataset(&expected));
    let via_mirror = through_mirror.get_dataset(None).await.unwrap();
    assert_eq!(hash_dataset(&via_mirror), hash_dataset(&expected));

    let named = GraphRef::named("http://example.org/g");
    assert!(through_mirror.contains_graph(&named, None).await.unwrap());
}
