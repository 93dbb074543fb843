//! Wire encoding of SPARQL 1.1 Protocol requests.
//!
//! Queries whose canonical text fits within the configured size go out as GET with a
//! percent-encoded `query` parameter; longer queries and every update go out as an
//! `application/x-www-form-urlencoded` POST.

use http::{
    HeaderMap, HeaderValue, Method,
    header::{ACCEPT, CONTENT_TYPE},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::{Url, form_urlencoded};

use crate::{
    endpoint::Endpoint,
    error::{Error, Result},
    media_types::{APPLICATION_FORM_URLENCODED, MediaType, accept_header},
    params::Params,
    statement::{Query, UpdateRequest},
};

/// Default GET/POST switch-over size, in characters of query text
pub const DEFAULT_MAX_GET_REQUEST_SIZE: usize = 8192;

pub const QUERY_PARAM: &str = "query";
pub const UPDATE_PARAM: &str = "update";

/// Keys the encoder owns; caller-supplied values under them are dropped
const RESERVED_PARAMS: &[&str] = &[QUERY_PARAM, UPDATE_PARAM];

/// Everything except RFC 3986 unreserved characters gets escaped, so `{`, `}`, `&`,
/// `=` and `+` inside SPARQL text are encoded exactly once and survive URL handling.
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A fully encoded HTTP request, ready to hand to the transport
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Encodes queries and updates for a given GET size threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestEncoder {
    max_get_request_size: usize,
}

impl Default for RequestEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GET_REQUEST_SIZE)
    }
}

impl RequestEncoder {
    pub fn new(max_get_request_size: usize) -> Self {
        Self {
            max_get_request_size,
        }
    }

    pub fn max_get_request_size(&self) -> usize {
        self.max_get_request_size
    }

    /// Transport decision for a serialized query: POST only when strictly longer
    /// than the threshold.
    pub fn method_for(&self, query_text: &str) -> Method {
        if query_text.chars().count() > self.max_get_request_size {
            Method::POST
        } else {
            Method::GET
        }
    }

    pub fn encode_query(
        &self,
        endpoint: &Endpoint,
        query: &Query,
        accepted: &[MediaType],
        params: Option<&Params>,
    ) -> Result<EncodedRequest> {
        if accepted.is_empty() {
            return Err(Error::Precondition(
                "accepted media types must not be empty".to_string(),
            ));
        }

        let text = query.to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(&accept_header(accepted))?);

        if self.method_for(&text) == Method::POST {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_FORM_URLENCODED),
            );
            return Ok(EncodedRequest {
                method: Method::POST,
                url: endpoint.url().clone(),
                headers,
                body: Some(form_body(QUERY_PARAM, &text, params)),
            });
        }

        let mut encoded = vec![encode_pair(QUERY_PARAM, &text)];
        if let Some(params) = params {
            encoded.extend(
                params
                    .pairs_except(RESERVED_PARAMS)
                    .map(|(key, value)| encode_pair(key, value)),
            );
        }

        Ok(EncodedRequest {
            method: Method::GET,
            url: with_encoded_query(endpoint.url(), &encoded),
            headers,
            body: None,
        })
    }

    /// Updates are always form-encoded POSTs, whatever their size.
    pub fn encode_update(
        &self,
        endpoint: &Endpoint,
        update: &UpdateRequest,
        params: Option<&Params>,
    ) -> Result<EncodedRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_FORM_URLENCODED),
        );

        Ok(EncodedRequest {
            method: Method::POST,
            url: endpoint.url().clone(),
            headers,
            body: Some(form_body(UPDATE_PARAM, &update.to_string(), params)),
        })
    }
}

/// Percent-encode a single query component with the unreserved set
pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

pub(crate) fn encode_pair(key: &str, value: &str) -> String {
    format!("{}={}", encode_component(key), encode_component(value))
}

/// Append already-encoded `key=value` items to the URL's query, keeping any query
/// the endpoint URI already carries.
pub(crate) fn with_encoded_query(base: &Url, encoded: &[String]) -> Url {
    let mut url = base.clone();
    url.set_fragment(None);

    if encoded.is_empty() {
        return url;
    }

    let joined = encoded.join("&");
    let query = match base.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{joined}"),
        _ => joined,
    };
    url.set_query(Some(&query));
    url
}

fn form_body(key: &str, text: &str, params: Option<&Params>) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair(key, text);
    if let Some(params) = params {
        for (name, value) in params.pairs_except(RESERVED_PARAMS) {
            form.append_pair(name, value);
        }
    }
    form.finish()
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Precondition(format!("invalid header value '{value}': {e}")))
}
