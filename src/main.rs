use std::sync::Arc;

use sparql_mirror::{
    client::HttpTransport,
    config::{self, Config},
    dataset::{Dataset, DatasetBackendType, MemoryDataset, RemoteDataset},
    http_api::HttpApiRouter,
    logger,
    proxy::ProxyResource,
};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() {
    let config = config::initialize_configuration().expect("Failed to load configuration");
    logger::initialize(&config.logger);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.dataset.backend,
        "Starting SPARQL mirror"
    );

    let dataset = build_dataset(&config);
    let router = HttpApiRouter::new(&config.http_api, Arc::new(ProxyResource::new(dataset)));
    let listener = router.bind().await.expect("Failed to bind HTTP listener");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to listen for Ctrl-C");
            // Keep serving; dropping the sender would stop the server
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl-C, shutting down");
        let _ = shutdown_tx.send(());
    });

    if let Err(error) = router
        .listen_and_handle_http_requests(listener, shutdown_rx)
        .await
    {
        tracing::error!(error = %error, "HTTP server failed");
    }
}

fn build_dataset(config: &Config) -> Arc<dyn Dataset> {
    match config.dataset.backend {
        DatasetBackendType::Remote => {
            let (sparql_endpoint, graph_store_endpoint) = config
                .origin
                .endpoints()
                .expect("Invalid origin configuration");
            let transport =
                HttpTransport::new(&config.client).expect("Failed to build HTTP client");

            Arc::new(RemoteDataset::connect(
                sparql_endpoint,
                graph_store_endpoint,
                transport,
            ))
        }
        DatasetBackendType::Memory => {
            Arc::new(MemoryDataset::new().expect("Failed to create in-memory dataset"))
        }
    }
}
