use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{Router, extract::DefaultBodyLimit, routing::any};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::protocol_controller::ProtocolHttpApiController;
use crate::proxy::ProxyResource;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpApiConfig {
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub max_body_bytes: usize,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Protocol resource mounted at `/sparql` and `/service`
pub struct HttpApiRouter {
    config: HttpApiConfig,
    router: Router,
}

impl HttpApiRouter {
    pub fn new(config: &HttpApiConfig, resource: Arc<ProxyResource>) -> Self {
        tracing::info!(
            dataset = resource.dataset_name(),
            "Mounting protocol resource"
        );

        let mut router = Router::new()
            .route("/sparql", any(ProtocolHttpApiController::handle_request))
            .route("/service", any(ProtocolHttpApiController::handle_request))
            .with_state(resource);

        // Layer order (last added runs first):
        // 1. Body size limit, replacing axum's built-in default
        // 2. Request tracing (outermost)
        router = router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes));
        tracing::info!(
            max_body_bytes = config.max_body_bytes,
            "Request body limit set"
        );

        router = router.layer(TraceLayer::new_for_http());

        Self {
            config: config.to_owned(),
            router,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured port on the loopback interface
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port));
        TcpListener::bind(addr).await
    }

    pub async fn listen_and_handle_http_requests(
        self,
        listener: TcpListener,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> io::Result<()> {
        tracing::info!(address = %listener.local_addr()?, "HTTP API listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                tracing::info!("HTTP server shutting down gracefully");
            })
            .await
    }
}
