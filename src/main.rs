use std::sync::Arc;

use frontend_gateway::{filters, AppState, GatewayConfig, ProcessEnv, StartupError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = GatewayConfig::from_env(&ProcessEnv)?;
    let state = Arc::new(AppState::new(&config)?);

    for rule in state.table.rewrites() {
        tracing::info!(source = %rule.source, destination = %rule.destination, "rewrite rule");
    }

    let routes = filters::routes(state);
    let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(config.listen_addr, async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutting down");
    })?;

    tracing::info!(%addr, backend = %config.backend, "API gateway listening");
    server.await;

    Ok(())
}
