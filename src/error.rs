use std::fmt;

use http::{
    HeaderMap, StatusCode,
    header::{ALLOW, WWW_AUTHENTICATE},
};
use thiserror::Error;

/// Classification of a well-formed non-2xx answer from a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// 404 / 410
    NotFound,
    /// 401 / 407
    AuthenticationRequired,
    /// Any other 4xx: the origin refused the request as sent
    ClientRejected,
    /// 5xx and anything that is neither success nor a client error
    BadGateway,
}

impl UpstreamErrorKind {
    /// Classify a response status. Callers only pass non-2xx statuses.
    pub fn classify(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Self::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                Self::AuthenticationRequired
            }
            s if s.is_client_error() => Self::ClientRejected,
            _ => Self::BadGateway,
        }
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AuthenticationRequired => "authentication required",
            Self::ClientRejected => "request rejected",
            Self::BadGateway => "bad gateway",
        };
        f.write_str(name)
    }
}

/// Errors raised by the protocol clients, the datasets and the proxy resource
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing argument, detected before any network I/O
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// HTTP transport failed (connection refused, timeout, truncated body)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote service answered with a non-2xx status
    #[error("Upstream {kind} (status {status}): {message}")]
    Upstream {
        kind: UpstreamErrorKind,
        status: u16,
        message: String,
        /// Origin headers that qualify the failure (challenge, allowed methods)
        headers: HeaderMap,
    },

    /// Response or request body is in a syntax we cannot read or write
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Failed to parse a payload in a supported syntax
    #[error("Failed to parse response: {reason}")]
    Parse { reason: String },

    /// None of the writable syntaxes satisfies the inbound Accept header
    #[error("No acceptable representation")]
    NotAcceptable,

    /// Inbound request is malformed (missing selector, conflicting parameters)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Invalid SPARQL query or update
    #[error("Invalid SPARQL: {reason}")]
    InvalidQuery { reason: String },

    /// Named graph absent from the local dataset
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// Local in-memory store failure
    #[error("Store error: {0}")]
    Store(String),

    /// I/O failure while serializing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn upstream(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Upstream {
            kind: UpstreamErrorKind::classify(status),
            status: status.as_u16(),
            message: message.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Keep the origin's `WWW-Authenticate` and `Allow` headers on an upstream failure
    pub(crate) fn with_origin_headers(mut self, origin: &HeaderMap) -> Self {
        if let Self::Upstream { headers, .. } = &mut self {
            for name in [WWW_AUTHENTICATE, ALLOW] {
                for value in origin.get_all(&name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        self
    }

    pub(crate) fn parse(reason: impl fmt::Display) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }

    /// Upstream classification, if this error came from a remote status
    pub fn upstream_kind(&self) -> Option<UpstreamErrorKind> {
        match self {
            Self::Upstream { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;
