use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Method, StatusCode,
    header::{CONTENT_TYPE, HeaderName},
};
use url::form_urlencoded;

use crate::{media_types::MediaType, params::Params};

/// An inbound protocol request, detached from the web framework
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Decoded query string parameters
    pub params: Params,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, query: Option<&str>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            params: parse_form(query.unwrap_or_default().as_bytes()),
            headers,
            body,
        }
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|value| value.to_str().ok())
    }

    /// Content type essence, if the request carries one
    pub fn media_type(&self) -> Option<String> {
        self.header(CONTENT_TYPE)
            .map(MediaType::essence_of)
            .filter(|essence| !essence.is_empty())
    }
}

/// Decode `application/x-www-form-urlencoded` pairs, keeping order
pub(crate) fn parse_form(input: &[u8]) -> Params {
    form_urlencoded::parse(input).into_owned().collect()
}

/// Response produced by the proxy resource
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header; values that are not valid header text are skipped
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => tracing::warn!(header = %name, error = %e, "Dropping invalid header value"),
        }
        self
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|value| value.to_str().ok())
    }
}
