//! Outbound command encoder.
//!
//! Builders for every client→server frame plus `CommandEncoder`, which
//! pushes them through the connection manager. Only chat content is
//! validated; ids are forwarded as given and the server decides.

use agentlink_protocol::{ClientMessage, ProjectId};

use crate::connection::ConnectionHandle;

/// `{type:"message"}`; `None` for blank content.
pub fn chat_message(content: &str) -> Option<ClientMessage> {
    if content.trim().is_empty() {
        return None;
    }
    Some(ClientMessage::Message {
        content: content.to_string(),
    })
}

pub fn create_session() -> ClientMessage {
    ClientMessage::CreateSession
}

pub fn switch_session(session_id: &str) -> ClientMessage {
    ClientMessage::SwitchSession {
        session_id: session_id.to_string(),
    }
}

pub fn delete_session(session_id: &str) -> ClientMessage {
    ClientMessage::DeleteSession {
        session_id: session_id.to_string(),
    }
}

pub fn get_sessions() -> ClientMessage {
    ClientMessage::GetSessions
}

pub fn set_project_id(raw: &str) -> ClientMessage {
    ClientMessage::SetProjectId {
        project_id: ProjectId::parse(raw),
    }
}

/// Sends encoded frames through the connection manager
#[derive(Clone)]
pub struct CommandEncoder {
    connection: ConnectionHandle,
}

impl CommandEncoder {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub async fn send(&self, msg: ClientMessage) {
        self.connection.send(msg).await;
    }
}
