mod ai_client;
mod bridge_loop;
mod config;
mod error;
mod observer;
#[cfg(feature = "recorder")]
mod recorder;
mod registry;
mod server;
mod session;
mod storage;
mod telephony_client;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use config::{Args, BridgeConfig};
use registry::SessionRegistry;
use server::AppState;
use storage::NullSink;

const SHUTDOWN_BOUND: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = BridgeConfig::load(args)?;
    info!(address = %config.address, ai_ws_url = %config.ai_ws_url, "starting bridge");

    let registry = Arc::new(SessionRegistry::new());
    let state = AppState {
        registry: registry.clone(),
        config: Arc::new(config.clone()),
        storage: Some(Arc::new(NullSink)),
    };

    let app = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(config.address).await?;
    info!(address = %config.address, "listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal());
    serve.await?;

    server::shutdown_all(&registry, SHUTDOWN_BOUND).await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining sessions");
}
