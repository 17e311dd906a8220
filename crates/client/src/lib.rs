//! Chat relay client — publish through the HTTP bridge, listen on channels.

pub mod bridge;
pub mod cli;
pub mod subscriber;
