//! Chat relay — WebSocket fan-out + HTTP broadcast bridge.
//!
//! Optional env: HOST, PORT, FANOUT_POLICY, PING_INTERVAL_SECS,
//! OUTBOUND_BUFFER, BRIDGE_API_KEY

use std::net::SocketAddr;

use relayer::{api, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    let state = api::AppState::new(config);
    let relay = state.relay.clone();

    tracing::info!(
        policy = %relay.policy(),
        bridge_auth = state.config.bridge_api_key.is_some(),
        "Relayer listening on {}",
        addr
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    api::serve(listener, state, shutdown_signal()).await?;

    if let Ok(stats) = relay.stats() {
        tracing::info!(
            connections = stats.connections,
            "Relayer stopped, open sockets left to close with the process"
        );
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
