//! Server → Client messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::*;

/// One inbound frame: the optional envelope fields plus the tagged payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub message: ServerMessage,
}

impl InboundFrame {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    // Session sync
    SessionsList {
        sessions: Vec<SessionSummary>,
        current_session_id: Option<String>,
    },
    SessionMessages {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default)]
        messages: Vec<HistoryMessage>,
    },

    // Conversation
    User {
        #[serde(default)]
        content: String,
    },
    Tool {
        tool_name: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
    #[serde(alias = "response")]
    Assistant {
        /// Some backends send `null` for an empty reply.
        #[serde(default)]
        content: Option<String>,
    },
    Complete,
    Error {
        #[serde(default)]
        content: Option<String>,
    },

    // Workspace
    FileChange,

    // Project binding
    ProjectIdSet {
        project_id: ProjectId,
    },
    RequireProjectId,

    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Wire name of the frame, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::SessionsList { .. } => "sessions_list",
            ServerMessage::SessionMessages { .. } => "session_messages",
            ServerMessage::User { .. } => "user",
            ServerMessage::Tool { .. } => "tool",
            ServerMessage::Assistant { .. } => "assistant",
            ServerMessage::Complete => "complete",
            ServerMessage::Error { .. } => "error",
            ServerMessage::FileChange => "file_change",
            ServerMessage::ProjectIdSet { .. } => "project_id_set",
            ServerMessage::RequireProjectId => "require_project_id",
            ServerMessage::Unknown => "unknown",
        }
    }
}
