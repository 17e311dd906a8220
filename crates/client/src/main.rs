//! Chat relay client — publish through the bridge or listen on channels.
//!
//! Optional env: RELAY_URL, RELAY_WS_URL, BRIDGE_API_KEY

use std::env;

use clap::Parser;
use relay_client::{bridge::BridgeClient, cli, subscriber};
use shared::BroadcastRequest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let bridge = BridgeClient::from_env();

    match cli.command {
        cli::Commands::Listen { channels } => {
            let ws_url = env::var("RELAY_WS_URL")
                .unwrap_or_else(|_| subscriber::ws_url_from_base(bridge.base_url()));
            subscriber::listen(&ws_url, &channels, |event| println!("{}", event)).await?;
        }
        cli::Commands::Publish {
            channel,
            kind,
            message,
        } => {
            let message = serde_json::from_str(&message)
                .unwrap_or_else(|_| serde_json::Value::String(message));
            let req = BroadcastRequest {
                kind,
                channel,
                message,
            };
            bridge
                .publish(&req)
                .await
                .map_err(|e| anyhow::anyhow!("Publish failed: {}", e))?;
            println!("Published to {}", req.channel);
        }
    }

    Ok(())
}
