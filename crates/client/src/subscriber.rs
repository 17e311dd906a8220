//! WebSocket listener: subscribe to channels and stream relayed events.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use shared::Frame;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const RECONNECT_DELAY_SECS: u64 = 5;

/// Derive the socket url from an http(s) bridge base url.
pub fn ws_url_from_base(base_url: &str) -> String {
    let ws = base_url
        .replace("https://", "wss://")
        .replace("http://", "ws://");
    format!("{}/ws", ws.trim_end_matches('/'))
}

/// A text frame from the relay, as the listener sees it.
#[derive(Debug, PartialEq)]
pub enum Incoming {
    /// Confirmation of our own subscribe frame.
    Subscribed(String),
    Event(Value),
    Ignored,
}

pub fn classify(text: &str) -> Incoming {
    match Frame::parse(text) {
        Ok(Frame::Subscribe { channel }) => Incoming::Subscribed(channel),
        Ok(Frame::Event(event)) => Incoming::Event(event.payload),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring frame from relay");
            Incoming::Ignored
        }
    }
}

/// Listen forever, reconnecting and re-subscribing after every drop.
pub async fn listen<F>(ws_url: &str, channels: &[String], mut on_event: F) -> Result<()>
where
    F: FnMut(Value),
{
    loop {
        match run_session(ws_url, channels, &mut on_event).await {
            Ok(()) => tracing::info!("Relay closed the connection"),
            Err(e) => tracing::warn!("Connection error: {}", e),
        }
        tracing::info!("Reconnecting in {}s", RECONNECT_DELAY_SECS);
        tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
    }
}

/// One connection: subscribe, then hand every event to `on_event` until the
/// socket ends.
pub async fn run_session<F>(ws_url: &str, channels: &[String], on_event: &mut F) -> Result<()>
where
    F: FnMut(Value),
{
    let (ws, _) = connect_async(ws_url).await?;
    tracing::info!("Connected to relay at {}", ws_url);
    let (mut ws_tx, mut ws_rx) = ws.split();

    for channel in channels {
        ws_tx
            .send(Message::Text(Frame::subscribe(channel.as_str()).to_json()))
            .await?;
    }

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Err(e) => return Err(e.into()),
            _ => continue,
        };
        match classify(&text) {
            Incoming::Subscribed(channel) => tracing::debug!(channel = %channel, "subscribed"),
            Incoming::Event(payload) => on_event(payload),
            Incoming::Ignored => {}
        }
    }

    Ok(())
}
