use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trafficsync::api;
use trafficsync::authority::Authority;
use trafficsync::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars
    let args = cli::Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trafficsync=debug,tower_http=debug".into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let settings = args.into_settings();
    // Socket server listen address setup
    let listen_address: IpAddr = settings
        .listen_address
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid ip address: {}", settings.listen_address))?;
    let socket_address = SocketAddr::from((listen_address, settings.listen_port));

    let authority = Authority::from_settings(settings).await?;
    if authority.settings.admin_token.is_none() {
        warn!("No admin token configured; admin and user routes will reject every request");
    }
    if authority.nodes.is_empty() {
        info!("No node keys configured; every sync will be rejected until nodes are registered");
    }

    // Build Axum Router
    let api = api::api(authority).await?;

    // Start server
    info!("Starting trafficsync on {}", socket_address);
    let listener = tokio::net::TcpListener::bind(socket_address).await?;
    axum::serve(listener, api)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("trafficsync stopped; undelivered events are discarded");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
