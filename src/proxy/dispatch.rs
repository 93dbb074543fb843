//! Classification of inbound requests by shape.
//!
//! A request is a SPARQL query, a SPARQL update or a Graph Store operation.
//! Everything here is local; a request that fails classification never reaches
//! the dataset.

use std::fmt;

use bytes::Bytes;
use http::{Method, header::ACCEPT};

use super::request::{ProxyRequest, parse_form};
use crate::{
    client::{DEFAULT_GRAPH_PARAM, GRAPH_PARAM, GraphRef},
    encoder::{QUERY_PARAM, UPDATE_PARAM},
    error::{Error, Result},
    media_types::{
        APPLICATION_FORM_URLENCODED, APPLICATION_SPARQL_QUERY, APPLICATION_SPARQL_UPDATE,
        RDF_DATASET, READABLE_GRAPH, Syntax, names_any, parse_accept,
    },
    params::Params,
    statement::{Query, UpdateRequest},
};

#[derive(Debug)]
pub(crate) enum Operation {
    Query {
        query: Query,
        params: Params,
    },
    Update {
        update: UpdateRequest,
        params: Params,
    },
    GetGraph {
        graph: GraphRef,
        params: Params,
    },
    HeadGraph {
        graph: GraphRef,
        params: Params,
    },
    PutGraph {
        graph: GraphRef,
        content_type: String,
        body: Bytes,
        params: Params,
    },
    PostGraph {
        graph: GraphRef,
        content_type: String,
        body: Bytes,
        params: Params,
    },
    DeleteGraph {
        graph: GraphRef,
        params: Params,
    },
    GetQuads {
        params: Params,
    },
    PutQuads {
        content_type: String,
        body: Bytes,
        params: Params,
    },
    PostQuads {
        content_type: String,
        body: Bytes,
        params: Params,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query { query, .. } => write!(f, "{} query", query.form()),
            Self::Update { .. } => f.write_str("update"),
            Self::GetGraph { graph, .. } => write!(f, "GET {graph}"),
            Self::HeadGraph { graph, .. } => write!(f, "HEAD {graph}"),
            Self::PutGraph { graph, .. } => write!(f, "PUT {graph}"),
            Self::PostGraph { graph, .. } => write!(f, "POST {graph}"),
            Self::DeleteGraph { graph, .. } => write!(f, "DELETE {graph}"),
            Self::GetQuads { .. } => f.write_str("GET dataset"),
            Self::PutQuads { .. } => f.write_str("PUT dataset"),
            Self::PostQuads { .. } => f.write_str("POST dataset"),
        }
    }
}

pub(crate) fn dispatch(request: &ProxyRequest) -> Result<Operation> {
    let media_type = request.media_type();
    let method = &request.method;

    if (*method == Method::GET || *method == Method::HEAD)
        && request.params.contains_key(QUERY_PARAM)
    {
        let text = request.params.first(QUERY_PARAM).unwrap_or_default();
        return Ok(Operation::Query {
            query: Query::parse(text)?,
            params: without(&request.params, &[QUERY_PARAM]),
        });
    }

    if *method == Method::POST {
        match media_type.as_deref() {
            Some(APPLICATION_FORM_URLENCODED) => return dispatch_form(request),
            Some(APPLICATION_SPARQL_QUERY) => {
                return Ok(Operation::Query {
                    query: Query::parse(body_text(&request.body)?)?,
                    params: request.params.clone(),
                });
            }
            Some(APPLICATION_SPARQL_UPDATE) => {
                return Ok(Operation::Update {
                    update: UpdateRequest::parse(body_text(&request.body)?)?,
                    params: request.params.clone(),
                });
            }
            _ => {}
        }
    }

    dispatch_graph_store(request, media_type)
}

/// Form POST carrying `query` or `update`; other form fields are forwarded
fn dispatch_form(request: &ProxyRequest) -> Result<Operation> {
    let form = parse_form(&request.body);
    let mut params = request.params.clone();
    for (key, value) in form.pairs_except(&[QUERY_PARAM, UPDATE_PARAM]) {
        params.add(key, value);
    }

    if let Some(text) = form.first(QUERY_PARAM) {
        return Ok(Operation::Query {
            query: Query::parse(text)?,
            params,
        });
    }
    if let Some(text) = form.first(UPDATE_PARAM) {
        return Ok(Operation::Update {
            update: UpdateRequest::parse(text)?,
            params,
        });
    }

    Err(Error::BadRequest(
        "form body carries neither 'query' nor 'update'".to_string(),
    ))
}

fn dispatch_graph_store(request: &ProxyRequest, media_type: Option<String>) -> Result<Operation> {
    if !has_selector(&request.params) {
        if let Some(operation) = dispatch_dataset(request, media_type.as_deref()) {
            return Ok(operation);
        }
    }

    let graph = selector(&request.params)?;
    let params = without(&request.params, &[DEFAULT_GRAPH_PARAM, GRAPH_PARAM]);

    let operation = match request.method {
        Method::GET => Operation::GetGraph { graph, params },
        Method::HEAD => Operation::HeadGraph { graph, params },
        Method::DELETE => Operation::DeleteGraph { graph, params },
        Method::PUT | Method::POST => {
            let content_type = readable_content_type(media_type)?;
            let body = request.body.clone();
            if request.method == Method::PUT {
                Operation::PutGraph {
                    graph,
                    content_type,
                    body,
                    params,
                }
            } else {
                Operation::PostGraph {
                    graph,
                    content_type,
                    body,
                    params,
                }
            }
        }
        ref other => {
            return Err(Error::BadRequest(format!(
                "method {other} is not supported on a graph store"
            )));
        }
    };

    Ok(operation)
}

fn has_selector(params: &Params) -> bool {
    params.contains_key(DEFAULT_GRAPH_PARAM) || params.contains_key(GRAPH_PARAM)
}

/// Selector-less request on the whole store. Reads must ask for a quad syntax by name
/// and writes must carry one; anything else falls through to the selector check.
fn dispatch_dataset(request: &ProxyRequest, media_type: Option<&str>) -> Option<Operation> {
    let params = request.params.clone();
    match request.method {
        Method::GET | Method::HEAD => {
            let accept = parse_accept(request.header(ACCEPT));
            names_any(&accept, RDF_DATASET).then_some(Operation::GetQuads { params })
        }
        Method::PUT | Method::POST => {
            let content_type = media_type.filter(|essence| registered(essence, RDF_DATASET))?;
            let content_type = content_type.to_string();
            let body = request.body.clone();
            Some(if request.method == Method::PUT {
                Operation::PutQuads {
                    content_type,
                    body,
                    params,
                }
            } else {
                Operation::PostQuads {
                    content_type,
                    body,
                    params,
                }
            })
        }
        _ => None,
    }
}

/// Exactly one of `default` and `graph` must be present
fn selector(params: &Params) -> Result<GraphRef> {
    let default = params.contains_key(DEFAULT_GRAPH_PARAM);
    let named = params.first(GRAPH_PARAM);

    match (default, named) {
        (true, None) => Ok(GraphRef::Default),
        (false, Some(uri)) if !uri.trim().is_empty() => Ok(GraphRef::named(uri.trim())),
        (false, Some(_)) => Err(Error::BadRequest(
            "'graph' parameter must not be empty".to_string(),
        )),
        (true, Some(_)) => Err(Error::BadRequest(
            "'default' and 'graph' are mutually exclusive".to_string(),
        )),
        (false, None) => Err(Error::BadRequest(
            "request needs 'query', 'update', 'default' or 'graph'".to_string(),
        )),
    }
}

fn readable_content_type(media_type: Option<String>) -> Result<String> {
    let media_type = media_type
        .ok_or_else(|| Error::BadRequest("graph payload needs a Content-Type".to_string()))?;

    if registered(&media_type, READABLE_GRAPH) {
        Ok(media_type)
    } else {
        Err(Error::UnsupportedMediaType(media_type))
    }
}

fn registered(media_type: &str, table: &[Syntax]) -> bool {
    table.iter().any(|syntax| syntax.media_type == media_type)
}

fn body_text(body: &Bytes) -> Result<&str> {
    std::str::from_utf8(body)
        .map_err(|e| Error::BadRequest(format!("request body is not UTF-8: {e}")))
}

fn without(params: &Params, excluded: &[&str]) -> Params {
    params.pairs_except(excluded).collect()
}
