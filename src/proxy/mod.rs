//! Server-side protocol resource backed by a [`Dataset`].
//!
//! Each inbound request moves through RECEIVED → DISPATCHED → RESPONDED, or ends
//! in FAILED (rejected locally, no dataset call) or UPSTREAM_ERROR (the origin
//! answered non-2xx or could not be reached). Exactly one dataset call is made per
//! dispatched request and nothing is retried.

mod dispatch;
mod request;

use std::sync::Arc;

use bytes::Bytes;
use http::{
    Method, StatusCode,
    header::{ACCEPT, ALLOW, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LOCATION, VARY},
};

pub use request::{ProxyRequest, ProxyResponse};

use self::dispatch::{Operation, dispatch};
use crate::{
    client::GraphRef,
    dataset::{Dataset, Payload},
    error::{Error, Result, UpstreamErrorKind},
    hash::{entity_tag, hash_boolean, hash_dataset, hash_graph, hash_solutions},
    media_types::{
        BOOLEAN_RESULT, MediaType, RDF_DATASET, RESULT_SET, Syntax, WRITABLE_GRAPH, negotiate,
        parse_accept,
    },
    rdf::{self, ResultSet},
    statement::QueryForm,
};

const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, DELETE";
const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
/// Every negotiated representation varies on the request's `Accept` header
const VARY_ACCEPT: &str = "Accept";

/// Shape of the body an operation answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Graph,
    Quads,
    Solutions,
    Boolean,
}

impl Answer {
    fn for_form(form: QueryForm) -> Self {
        match form {
            QueryForm::Construct | QueryForm::Describe => Self::Graph,
            QueryForm::Select => Self::Solutions,
            QueryForm::Ask => Self::Boolean,
        }
    }

    fn syntaxes(self) -> &'static [Syntax] {
        match self {
            Self::Graph => WRITABLE_GRAPH,
            Self::Quads => RDF_DATASET,
            Self::Solutions => RESULT_SET,
            Self::Boolean => BOOLEAN_RESULT,
        }
    }
}

impl Operation {
    fn answer(&self) -> Option<Answer> {
        match self {
            Self::Query { query, .. } => Some(Answer::for_form(query.form())),
            Self::GetGraph { .. } | Self::HeadGraph { .. } => Some(Answer::Graph),
            Self::GetQuads { .. } => Some(Answer::Quads),
            _ => None,
        }
    }
}

/// Protocol endpoint that answers from a dataset instead of owning storage
pub struct ProxyResource {
    dataset: Arc<dyn Dataset>,
}

impl ProxyResource {
    pub fn new(dataset: Arc<dyn Dataset>) -> Self {
        Self { dataset }
    }

    pub fn dataset_name(&self) -> &'static str {
        self.dataset.name()
    }

    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        tracing::debug!(
            state = "received",
            method = %request.method,
            "Protocol request received"
        );

        let mut response = match self.respond(&request).await {
            Ok(response) => {
                tracing::debug!(
                    state = "responded",
                    status = response.status.as_u16(),
                    "Protocol request completed"
                );
                response
            }
            Err(error) => failure_response(&error),
        };

        if request.method == Method::HEAD {
            response.body = Bytes::new();
        }
        response
    }

    async fn respond(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        if !matches!(
            request.method,
            Method::GET | Method::HEAD | Method::POST | Method::PUT | Method::DELETE
        ) {
            return Ok(ProxyResponse::new(StatusCode::METHOD_NOT_ALLOWED)
                .with_header(ALLOW, ALLOWED_METHODS));
        }

        let operation = dispatch(request)?;

        let accept = parse_accept(request.header(ACCEPT));
        let variant = match operation.answer() {
            Some(answer) => {
                Some(negotiate(&accept, answer.syntaxes()).ok_or(Error::NotAcceptable)?)
            }
            None => None,
        };

        tracing::debug!(
            state = "dispatched",
            operation = %operation,
            dataset = self.dataset.name(),
            variant = variant.unwrap_or("-"),
            "Protocol request dispatched"
        );

        let variant = variant.unwrap_or_default();
        match operation {
            Operation::Query { query, params } => {
                let answer = Answer::for_form(query.form());
                let payload = self.dataset.query(&query, variant, &params).await?;
                represent(request, payload, answer, variant)
            }
            Operation::Update { update, params } => {
                let status = self.dataset.update(&update, &params).await?;
                Ok(ProxyResponse::new(status))
            }
            Operation::GetGraph { graph, params } => {
                let payload = self.dataset.get_graph(&graph, variant, &params).await?;
                represent(request, payload, Answer::Graph, variant)
            }
            Operation::HeadGraph { graph, params } => {
                if !self.dataset.contains_graph(&graph, &params).await? {
                    return Err(Error::GraphNotFound(graph.to_string()));
                }
                Ok(ProxyResponse::new(StatusCode::OK)
                    .with_header(CONTENT_TYPE, variant)
                    .with_header(VARY, VARY_ACCEPT))
            }
            Operation::PutGraph {
                graph,
                content_type,
                body,
                params,
            } => {
                let status = self
                    .dataset
                    .put_graph(&graph, &content_type, body, &params)
                    .await?;
                Ok(write_response(status, &graph))
            }
            Operation::PostGraph {
                graph,
                content_type,
                body,
                params,
            } => {
                let status = self
                    .dataset
                    .add_graph(&graph, &content_type, body, &params)
                    .await?;
                Ok(write_response(status, &graph))
            }
            Operation::DeleteGraph { graph, params } => {
                let status = self.dataset.delete_graph(&graph, &params).await?;
                Ok(ProxyResponse::new(status))
            }
            Operation::GetQuads { params } => {
                let payload = self.dataset.get_quads(variant, &params).await?;
                represent(request, payload, Answer::Quads, variant)
            }
            Operation::PutQuads {
                content_type,
                body,
                params,
            } => {
                let status = self.dataset.put_quads(&content_type, body, &params).await?;
                Ok(ProxyResponse::new(status))
            }
            Operation::PostQuads {
                content_type,
                body,
                params,
            } => {
                let status = self.dataset.add_quads(&content_type, body, &params).await?;
                Ok(ProxyResponse::new(status))
            }
        }
    }
}

fn write_response(status: StatusCode, graph: &GraphRef) -> ProxyResponse {
    let response = ProxyResponse::new(status);
    match graph {
        GraphRef::Named(uri) if status == StatusCode::CREATED => {
            response.with_header(LOCATION, uri)
        }
        _ => response,
    }
}

/// Relay the origin's bytes when they are already in the negotiated syntax,
/// otherwise encode locally and tag the representation.
fn represent(
    request: &ProxyRequest,
    payload: Payload,
    answer: Answer,
    variant: &str,
) -> Result<ProxyResponse> {
    let (body, hash) = match payload {
        Payload::Raw { content_type, body } => {
            if MediaType::essence_of(&content_type) == variant {
                return Ok(ProxyResponse::new(StatusCode::OK)
                    .with_header(CONTENT_TYPE, &content_type)
                    .with_header(VARY, VARY_ACCEPT)
                    .with_body(body));
            }
            let decoded = decode_origin(answer, &content_type, &body)?;
            return represent(request, decoded, answer, variant);
        }
        Payload::Graph(graph) => (rdf::serialize_graph(&graph, variant)?, hash_graph(&graph)),
        Payload::Quads(dataset) => (
            rdf::serialize_dataset(&dataset, variant)?,
            hash_dataset(&dataset),
        ),
        Payload::Solutions(solutions) => (
            rdf::serialize_solutions(&solutions, variant)?,
            hash_solutions(&solutions),
        ),
        Payload::Boolean(value) => (rdf::serialize_boolean(value, variant)?, hash_boolean(value)),
    };

    let etag = entity_tag(hash, variant);
    if not_modified(request, &etag) {
        return Ok(ProxyResponse::new(StatusCode::NOT_MODIFIED)
            .with_header(ETAG, &etag)
            .with_header(VARY, VARY_ACCEPT));
    }

    Ok(ProxyResponse::new(StatusCode::OK)
        .with_header(CONTENT_TYPE, variant)
        .with_header(ETAG, &etag)
        .with_header(VARY, VARY_ACCEPT)
        .with_body(body))
}

/// An origin payload we cannot read is the origin's fault
fn decode_origin(answer: Answer, content_type: &str, body: &[u8]) -> Result<Payload> {
    let decoded = match answer {
        Answer::Graph => rdf::parse_graph(content_type, body).map(Payload::Graph),
        Answer::Quads => rdf::parse_dataset(content_type, body).map(Payload::Quads),
        Answer::Solutions | Answer::Boolean => {
            rdf::parse_results(content_type, body).map(|results| match results {
                ResultSet::Solutions(solutions) => Payload::Solutions(solutions),
                ResultSet::Boolean(value) => Payload::Boolean(value),
            })
        }
    };

    decoded.map_err(|e| {
        Error::upstream(
            StatusCode::BAD_GATEWAY,
            format!("origin payload could not be decoded: {e}"),
        )
    })
}

fn not_modified(request: &ProxyRequest, etag: &str) -> bool {
    if !matches!(request.method, Method::GET | Method::HEAD) {
        return false;
    }
    request.header(IF_NONE_MATCH).is_some_and(|value| {
        value
            .split(',')
            .map(str::trim)
            .any(|tag| tag == "*" || tag == etag)
    })
}

/// HTTP status a failed request is answered with
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::BadRequest(_) | Error::Precondition(_) | Error::InvalidQuery { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
        Error::GraphNotFound(_) => StatusCode::NOT_FOUND,
        Error::Upstream { kind, status, .. } => match kind {
            UpstreamErrorKind::NotFound => StatusCode::NOT_FOUND,
            UpstreamErrorKind::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            UpstreamErrorKind::ClientRejected => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            UpstreamErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
        },
        Error::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        Error::Transport(_) | Error::Parse { .. } => StatusCode::BAD_GATEWAY,
        Error::Store(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure_response(error: &Error) -> ProxyResponse {
    let status = status_for(error);

    match error {
        Error::Upstream { .. } | Error::Transport(_) => tracing::warn!(
            state = "upstream_error",
            status = status.as_u16(),
            error = %error,
            "Origin request failed"
        ),
        _ if status.is_server_error() => tracing::error!(
            state = "failed",
            status = status.as_u16(),
            error = %error,
            "Protocol request failed"
        ),
        _ => tracing::debug!(
            state = "failed",
            status = status.as_u16(),
            error = %error,
            "Protocol request rejected"
        ),
    }

    let mut response = ProxyResponse::new(status)
        .with_header(CONTENT_TYPE, TEXT_PLAIN_UTF8)
        .with_body(error.to_string());

    // Challenges and allowed methods stay meaningful to the caller
    if let Error::Upstream { headers, .. } = error {
        for (name, value) in headers {
            response.headers.append(name, value.clone());
        }
    }
    response
}
