//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relay-client")]
#[command(about = "Chat relay client — publish events and listen on channels")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to channels and print every event as one JSON line
    Listen {
        /// Channel names, e.g. `srv1-gen` or `dm-alice-bob`
        #[arg(value_name = "CHANNEL", required = true)]
        channels: Vec<String>,
    },

    /// Publish an event through the HTTP bridge
    Publish {
        #[arg(long)]
        channel: String,

        /// Event type (relay defaults to `message`)
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,

        /// Message body; parsed as JSON, sent as a string otherwise
        #[arg(value_name = "MESSAGE")]
        message: String,
    },
}
