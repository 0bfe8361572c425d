//! Client → Server messages

use serde::{Deserialize, Serialize};

use crate::types::ProjectId;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // Chat
    Message {
        content: String,
    },

    // Session management
    CreateSession,
    SwitchSession {
        session_id: String,
    },
    DeleteSession {
        session_id: String,
    },
    GetSessions,

    // Project binding
    SetProjectId {
        project_id: ProjectId,
    },
}

impl ClientMessage {
    /// Wire name of the frame, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Message { .. } => "message",
            ClientMessage::CreateSession => "create_session",
            ClientMessage::SwitchSession { .. } => "switch_session",
            ClientMessage::DeleteSession { .. } => "delete_session",
            ClientMessage::GetSessions => "get_sessions",
            ClientMessage::SetProjectId { .. } => "set_project_id",
        }
    }
}
