use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use oxigraph::{
    model::{Dataset as RdfDataset, Graph, GraphName, GraphNameRef, NamedNode, Triple},
    sparql::{QueryResults, SparqlEvaluator},
    store::Store,
};

use super::{Dataset, Payload};
use crate::{
    client::GraphRef,
    error::{Error, Result},
    params::Params,
    rdf::{self, Solutions},
    statement::{Query, UpdateRequest},
};

/// Dataset held in an in-memory Oxigraph store.
///
/// The default graph always exists; deleting it only empties it.
#[derive(Clone)]
pub struct MemoryDataset {
    store: Store,
}

impl MemoryDataset {
    pub fn new() -> Result<Self> {
        let store = Store::new()
            .map_err(|e| Error::Store(format!("Failed to create in-memory store: {e}")))?;

        tracing::info!("Created in-memory dataset");

        Ok(Self { store })
    }

    /// Direct access to the underlying store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run store work on the blocking pool
    async fn blocking<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Store) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || task(store))
            .await
            .map_err(|e| Error::Store(format!("Task join error: {e}")))?
    }
}

fn graph_name(graph: &GraphRef) -> Result<GraphName> {
    match graph {
        GraphRef::Default => Ok(GraphName::DefaultGraph),
        GraphRef::Named(uri) => NamedNode::new(uri.as_str())
            .map(GraphName::NamedNode)
            .map_err(|e| Error::BadRequest(format!("invalid graph IRI '{uri}': {e}"))),
    }
}

fn store_error(context: &str) -> impl Fn(oxigraph::store::StorageError) -> Error + '_ {
    move |e| Error::Store(format!("{context}: {e}"))
}

/// Whether the graph is present; the default graph always is
fn graph_exists(store: &Store, name: &GraphName) -> Result<bool> {
    match name {
        GraphName::NamedNode(node) => store
            .contains_named_graph(node.as_ref())
            .map_err(store_error("Failed to look up graph")),
        _ => Ok(true),
    }
}

/// A malformed payload sent by the caller is the caller's fault
fn inbound<T>(parsed: Result<T>) -> Result<T> {
    parsed.map_err(|e| match e {
        Error::Parse { reason } => Error::BadRequest(format!("malformed payload: {reason}")),
        other => other,
    })
}

fn read_graph(store: &Store, name: GraphNameRef<'_>) -> Result<Graph> {
    let mut graph = Graph::new();
    for quad in store.quads_for_pattern(None, None, None, Some(name)) {
        let quad = quad.map_err(store_error("Failed to read quad"))?;
        graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(graph)
}

/// Write `content` into the graph in one transaction, optionally replacing what
/// was there. Returns whether the graph existed before.
fn write_graph(store: &Store, name: &GraphName, content: &Graph, replace: bool) -> Result<bool> {
    let mut transaction = store
        .start_transaction()
        .map_err(store_error("Failed to start transaction"))?;

    let existed = match name {
        GraphName::NamedNode(node) => transaction
            .contains_named_graph(node.as_ref())
            .map_err(store_error("Failed to look up graph"))?,
        _ => true,
    };
    if replace {
        transaction
            .clear_graph(name.as_ref())
            .map_err(store_error("Failed to clear graph"))?;
    }
    if let GraphName::NamedNode(node) = name {
        transaction.insert_named_graph(node.as_ref());
    }
    for triple in content.iter() {
        transaction.insert(triple.in_graph(name.as_ref()));
    }

    transaction
        .commit()
        .map_err(store_error("Failed to commit graph"))?;
    Ok(existed)
}

fn write_quads(store: &Store, content: &RdfDataset, replace: bool) -> Result<()> {
    let mut transaction = store
        .start_transaction()
        .map_err(store_error("Failed to start transaction"))?;
    if replace {
        transaction
            .clear()
            .map_err(store_error("Failed to clear dataset"))?;
    }
    transaction.extend(content.iter());
    transaction
        .commit()
        .map_err(store_error("Failed to commit dataset"))
}

fn created_or_ok(existed: bool) -> StatusCode {
    if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    }
}

#[async_trait]
impl Dataset for MemoryDataset {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, query: &Query, _preferred: &str, _params: &Params) -> Result<Payload> {
        let prepared = SparqlEvaluator::new()
            .parse_query(&query.to_string())
            .map_err(|e| Error::InvalidQuery {
                reason: format!("Failed to parse SPARQL query: {e}"),
            })?;

        self.blocking(move |store| {
            let results = prepared
                .on_store(&store)
                .execute()
                .map_err(|e| Error::Store(format!("SPARQL query failed: {e}")))?;

            match results {
                QueryResults::Boolean(value) => Ok(Payload::Boolean(value)),
                QueryResults::Solutions(solutions) => {
                    let variables = solutions.variables().to_vec();
                    let mut rows = Vec::new();
                    for solution in solutions {
                        let solution = solution
                            .map_err(|e| Error::Store(format!("Failed to read solution: {e}")))?;
                        rows.push(
                            variables
                                .iter()
                                .map(|variable| solution.get(variable).cloned())
                                .collect(),
                        );
                    }
                    Ok(Payload::Solutions(Solutions { variables, rows }))
                }
                QueryResults::Graph(triples) => {
                    let mut graph = Graph::new();
                    for triple in triples {
                        let triple = triple
                            .map_err(|e| Error::Store(format!("Failed to read triple: {e}")))?;
                        graph.insert(&triple);
                    }
                    Ok(Payload::Graph(graph))
                }
            }
        })
        .await
    }

    async fn update(&self, update: &UpdateRequest, _params: &Params) -> Result<StatusCode> {
        let prepared = SparqlEvaluator::new()
            .parse_update(&update.to_string())
            .map_err(|e| Error::InvalidQuery {
                reason: format!("Failed to parse SPARQL update: {e}"),
            })?;

        self.blocking(move |store| {
            prepared
                .on_store(&store)
                .execute()
                .map_err(|e| Error::Store(format!("SPARQL update failed: {e}")))
        })
        .await?;

        Ok(StatusCode::NO_CONTENT)
    }

    async fn get_graph(
        &self,
        graph: &GraphRef,
        _preferred: &str,
        _params: &Params,
    ) -> Result<Payload> {
        let name = graph_name(graph)?;
        let label = graph.to_string();

        self.blocking(move |store| {
            if !graph_exists(&store, &name)? {
                return Err(Error::GraphNotFound(label));
            }
            read_graph(&store, name.as_ref()).map(Payload::Graph)
        })
        .await
    }

    async fn contains_graph(&self, graph: &GraphRef, _params: &Params) -> Result<bool> {
        let name = graph_name(graph)?;
        self.blocking(move |store| graph_exists(&store, &name))
            .await
    }

    async fn put_graph(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: Bytes,
        _params: &Params,
    ) -> Result<StatusCode> {
        let name = graph_name(graph)?;
        let content = inbound(rdf::parse_graph(content_type, &body))?;

        let existed = self
            .blocking(move |store| write_graph(&store, &name, &content, true))
            .await?;
        Ok(created_or_ok(existed))
    }

    async fn add_graph(
        &self,
        graph: &GraphRef,
        content_type: &str,
        body: Bytes,
        _params: &Params,
    ) -> Result<StatusCode> {
        let name = graph_name(graph)?;
        let content = inbound(rdf::parse_graph(content_type, &body))?;
        if content.is_empty() {
            return Ok(StatusCode::NO_CONTENT);
        }

        let existed = self
            .blocking(move |store| write_graph(&store, &name, &content, false))
            .await?;
        Ok(created_or_ok(existed))
    }

    async fn delete_graph(&self, graph: &GraphRef, _params: &Params) -> Result<StatusCode> {
        let name = graph_name(graph)?;
        let label = graph.to_string();

        self.blocking(move |store| {
            match &name {
                GraphName::NamedNode(node) => {
                    if !graph_exists(&store, &name)? {
                        return Err(Error::GraphNotFound(label));
                    }
                    store
                        .remove_named_graph(node.as_ref())
                        .map_err(store_error("Failed to remove graph"))?;
                }
                _ => store
                    .clear_graph(name.as_ref())
                    .map_err(store_error("Failed to clear graph"))?,
            }
            Ok(StatusCode::NO_CONTENT)
        })
        .await
    }

    async fn get_quads(&self, _preferred: &str, _params: &Params) -> Result<Payload> {
        self.blocking(|store| {
            let mut dataset = RdfDataset::new();
            for quad in store.iter() {
                let quad = quad.map_err(store_error("Failed to read quad"))?;
                dataset.insert(&quad);
            }
            Ok(Payload::Quads(dataset))
        })
        .await
    }

    async fn put_quads(
        &self,
        content_type: &str,
        body: Bytes,
        _params: &Params,
    ) -> Result<StatusCode> {
        let content = inbound(rdf::parse_dataset(content_type, &body))?;
        self.blocking(move |store| write_quads(&store, &content, true))
            .await?;
        Ok(StatusCode::OK)
    }

    async fn add_quads(
        &self,
        content_type: &str,
        body: Bytes,
        _params: &Params,
    ) -> Result<StatusCode> {
        let content = inbound(rdf::parse_dataset(content_type, &body))?;
        self.blocking(move |store| write_quads(&store, &content, false))
            .await?;
        Ok(StatusCode::OK)
    }

    async fn delete_quads(&self, _params: &Params) -> Result<StatusCode> {
        self.blocking(|store| {
            store
                .clear()
                .map_err(store_error("Failed to clear dataset"))
        })
        .await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
