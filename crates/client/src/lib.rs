//! agentlink client
//!
//! Keeps a local view of an agent chat in sync with the server over one
//! WebSocket: reconnection with backoff, an offline send queue, frame
//! deduplication and the conversation state store. `ApiClient` covers the
//! REST side (files, projects, agent config).

pub mod api;
pub mod app;
pub mod backoff;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod store;
pub mod timers;
pub mod transport;

pub use api::ApiClient;
pub use app::{ChatClient, ClientUpdate};
pub use backoff::ReconnectPolicy;
pub use config::ClientConfig;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionStatus};
pub use error::{ApiError, ClientError, TransportError};
pub use store::{ChatMessage, ConversationState, ProjectGate, ProjectIdStatus};
pub use transport::{Connector, WsConnector};
