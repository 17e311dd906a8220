//! Per-connection socket lifecycle.
//!
//! Each accepted socket gets one registry entry, one writer task that owns
//! the sink, and a reader loop on the upgrade task. Whichever side ends
//! first, the connection is unregistered; the registry dropping its queue
//! sender is what stops the writer.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::api::AppState;
use crate::relay::{protocol, ConnectionId, Outbound, RelayState};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, outbound) = match state.relay.connect() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "cannot register connection");
            return;
        }
    };
    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        outbound,
        state.config.ping_interval(),
        conn_id,
    ));

    tokio::select! {
        _ = read_loop(&state.relay, conn_id, ws_rx) => {}
        _ = &mut writer => {}
    }
    state.relay.disconnect(conn_id);
}

async fn read_loop(relay: &RelayState, conn_id: ConnectionId, mut ws_rx: SplitStream<WebSocket>) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = protocol::handle_text(relay, conn_id, text.as_str()) {
                    tracing::error!(connection_id = %conn_id, error = %e, "relay unavailable");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %conn_id, "client sent close frame");
                break;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %conn_id, "ignoring binary frame");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %conn_id, error = %e, "websocket read error");
                break;
            }
        }
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    ping_every: Option<Duration>,
    conn_id: ConnectionId,
) {
    let mut ping = ping_every.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = ws_tx.send(Message::Text(frame.to_string().into())).await {
                    tracing::debug!(connection_id = %conn_id, error = %e, "websocket write failed");
                    break;
                }
            }
            _ = next_ping(&mut ping) => {
                if let Err(e) = ws_tx.send(Message::Ping(Bytes::new())).await {
                    tracing::debug!(connection_id = %conn_id, error = %e, "keepalive ping failed");
                    break;
                }
            }
        }
    }
    let _ = ws_tx.close().await;
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
