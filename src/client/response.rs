use bytes::Bytes;
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use oxigraph::model::{Dataset as RdfDataset, Graph};

use crate::{
    error::{Error, Result},
    media_types::MediaType,
    rdf::{self, ResultSet, Solutions},
};

/// Longest upstream error body echoed into an error message
const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// A fully buffered HTTP response from a remote protocol service.
///
/// The connection is released once the body has been read, so decoding never
/// holds network resources.
#[derive(Debug, Clone)]
pub struct ProtocolResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProtocolResponse {
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(Self {
            status,
            content_type,
            headers,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Content type essence, parameters removed
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(MediaType::essence_of)
    }

    /// Turn a non-2xx answer into a classified `Upstream` error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let text = String::from_utf8_lossy(&self.body);
        let message = if text.trim().is_empty() {
            self.status
                .canonical_reason()
                .unwrap_or("no reason given")
                .to_string()
        } else {
            text.trim().chars().take(MAX_ERROR_MESSAGE_LEN).collect()
        };

        let error = Error::upstream(self.status, message);
        Err(error.with_origin_headers(&self.headers))
    }

    pub fn into_graph(self) -> Result<Graph> {
        let response = self.error_for_status()?;
        let content_type = response.require_content_type()?;
        rdf::parse_graph(&content_type, &response.body)
    }

    pub fn into_dataset(self) -> Result<RdfDataset> {
        let response = self.error_for_status()?;
        let content_type = response.require_content_type()?;
        rdf::parse_dataset(&content_type, &response.body)
    }

    pub fn into_results(self) -> Result<ResultSet> {
        let response = self.error_for_status()?;
        let content_type = response.require_content_type()?;
        rdf::parse_results(&content_type, &response.body)
    }

    pub fn into_solutions(self) -> Result<Solutions> {
        match self.into_results()? {
            ResultSet::Solutions(solutions) => Ok(solutions),
            ResultSet::Boolean(_) => Err(Error::parse(
                "expected a solution sequence, got a boolean result",
            )),
        }
    }

    pub fn into_boolean(self) -> Result<bool> {
        match self.into_results()? {
            ResultSet::Boolean(value) => Ok(value),
            ResultSet::Solutions(_) => Err(Error::parse(
                "expected a boolean result, got a solution sequence",
            )),
        }
    }

    fn require_content_type(&self) -> Result<String> {
        self.media_type()
            .filter(|essence| !essence.is_empty())
            .ok_or_else(|| {
                Error::UnsupportedMediaType("response carries no content type".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use http::HeaderValue;

    use super::*;
    use crate::error::UpstreamErrorKind;

    fn response(status: u16, content_type: Option<&str>, body: &str) -> ProtocolResponse {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        }
        ProtocolResponse {
            status: StatusCode::from_u16(status).unwrap(),
            content_type: content_type.map(str::to_string),
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn non_success_becomes_classified_error() {
        let err = response(404, Some("text/plain"), "graph not found")
            .into_graph()
            .unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamErrorKind::NotFound));
        assert!(err.to_string().contains("graph not found"));

        let err = response(502, None, "").error_for_status().unwrap_err();
        assert!(matches!(
            err,
            Error::Upstream {
                kind: UpstreamErrorKind::BadGateway,
                status: 502,
                ..
            }
        ));
    }

    #[test]
    fn decodes_by_content_type() {
        let graph = response(
            200,
            Some("application/n-triples; charset=utf-8"),
            "<http://a> <http://b> <http://c> .\n",
        )
        .into_graph()
        .unwrap();
        assert_eq!(graph.len(), 1);

        let value = response(
            200,
            Some("application/sparql-results+json"),
            r#"{"head":{},"boolean":true}"#,
        )
        .into_boolean()
        .unwrap();
        assert!(value);

        let dataset = response(
            200,
            Some("application/n-quads"),
            "<http://a> <http://b> <http://c> <http://g> .\n",
        )
        .into_dataset()
        .unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn missing_content_type_is_unsupported() {
        assert!(matches!(
            response(200, None, "<http://a> <http://b> <http://c> .").into_graph(),
            Err(Error::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn shape_mismatch_is_a_parse_error() {
        let result = response(
            200,
            Some("application/sparql-results+json"),
            r#"{"head":{},"boolean":false}"#,
        )
        .into_solutions();
        assert!(matches!(result, Err(Error::Parse { .. })));
    }
}
