//! agentlink protocol
//!
//! Types exchanged with the agent backend. Real-time frames travel as JSON
//! text over the `/ws` WebSocket; the `rest` module mirrors the JSON bodies
//! of the file/config/project HTTP endpoints.

use uuid::Uuid;

pub mod client;
pub mod rest;
pub mod server;
pub mod types;

pub use client::ClientMessage;
pub use server::{InboundFrame, ServerMessage};
pub use types::*;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
