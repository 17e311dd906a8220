//! Shared wire types for the chat relay workspace.

mod models;

// Explicit re-exports (avoids rust-analyzer issues with `pub use models::*`)
pub use models::ws_types;
pub use models::{BroadcastRequest, BroadcastResponse, Event, Frame, FrameError};
