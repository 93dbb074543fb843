use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, Method, Uri};

use crate::proxy::{ProxyRequest, ProxyResource, ProxyResponse};

pub(crate) struct ProtocolHttpApiController;

impl ProtocolHttpApiController {
    pub(crate) async fn handle_request(
        State(resource): State<Arc<ProxyResource>>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> ProxyResponse {
        resource
            .handle(ProxyRequest::new(method, uri.query(), headers, body))
            .await
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}
