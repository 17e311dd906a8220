//! Chat relay — channel subscriptions, WebSocket fan-out, HTTP broadcast bridge.

pub mod api;
pub mod config;
pub mod relay;
