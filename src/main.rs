use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use wavelink::common::logger;
use wavelink::configs::Config;
use wavelink::server::AppState;
use wavelink::transport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;
    logger::init(&config);

    let state = Arc::new(AppState::from_config(config.clone())?);

    let app = transport::http_server::router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let address = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("wavelink relay listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {}", e);
        return;
    }
    info!("Shutdown signal received, draining connections");
}
