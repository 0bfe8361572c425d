//! Conversation state store
//!
//! The client-side projection of the chat: messages, sessions, in-flight
//! tool status, loading/creating flags and project-id gating. Every change
//! goes through a synchronous method that returns the `Effect`s the owner
//! must carry out (frames to send, timers to arm or cancel). No IO here.

use agentlink_protocol::{
    new_id, ClientMessage, HistoryMessage, InboundFrame, MessageRole, ServerMessage,
    SessionSummary,
};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands;
use crate::connection::ConnectionStatus;
use crate::error::ClientError;

/// A message as rendered in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub tool_name: Option<String>,
    pub tool_status: Option<String>,
    pub tool_args: Option<Value>,
    pub is_streaming: bool,
}

impl ChatMessage {
    fn new(id: String, role: MessageRole, content: String, timestamp: DateTime<Local>) -> Self {
        Self {
            id,
            role,
            content,
            timestamp,
            tool_name: None,
            tool_status: None,
            tool_args: None,
            is_streaming: false,
        }
    }

    fn from_history(msg: HistoryMessage, received_at: DateTime<Local>) -> Self {
        let timestamp = msg
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(received_at);
        Self {
            tool_name: msg.tool_name,
            tool_status: msg.tool_status,
            ..Self::new(msg.id, msg.role, msg.content, timestamp)
        }
    }
}

/// Server timestamps are RFC 3339 or naive ISO-8601 in server-local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Key shared by every status update of one tool in one session
pub fn tool_message_id(session_id: Option<&str>, tool_name: &str) -> String {
    format!("tool-{}-{}", session_id.unwrap_or_default(), tool_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectIdStatus {
    #[default]
    Idle,
    Updating,
    Success,
}

/// Project id staged by the user vs. the one in effect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGate {
    pub committed: Option<String>,
    pub pending: String,
    /// Server demanded a project before chatting
    pub required: bool,
    pub is_set: bool,
    pub status: ProjectIdStatus,
}

impl ProjectGate {
    /// Confirm is enabled only for a non-empty pending value that differs
    /// from the committed one.
    pub fn can_confirm(&self) -> bool {
        let pending = self.pending.trim();
        !pending.is_empty() && self.committed.as_deref() != Some(pending)
    }

    pub fn blocks_sending(&self) -> bool {
        self.required && !self.is_set
    }
}

/// Everything a renderer needs, published as one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub connection: ConnectionStatus,
    pub messages: Vec<ChatMessage>,
    pub sessions: Vec<SessionSummary>,
    /// At least one `sessions_list` has arrived
    pub sessions_loaded: bool,
    pub current_session_id: Option<String>,
    pub creating_session: bool,
    /// Awaiting the agent's response
    pub loading: bool,
    /// Loading has lasted past the debounce window
    pub show_thinking: bool,
    pub project: ProjectGate,
}

/// Work the store's owner performs after a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(ClientMessage),
    LoadingStarted,
    LoadingFinished,
    CreatingStarted,
    CreatingSettled,
    ProjectStatusUpdating,
    FilesChanged,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    state: ConversationState,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    // -- Inbound frames --------------------------------------------------

    /// Apply one decoded server frame.
    pub fn apply(&mut self, frame: InboundFrame, now: DateTime<Local>) -> Vec<Effect> {
        let InboundFrame {
            id,
            timestamp,
            message,
        } = frame;
        let mut effects = Vec::new();

        match message {
            ServerMessage::SessionsList {
                sessions,
                current_session_id,
            } => {
                self.state.sessions = sessions;
                self.state.sessions_loaded = true;
                self.state.current_session_id = current_session_id;
                self.settle_creating(&mut effects);
            }
            ServerMessage::SessionMessages { messages, .. } => {
                self.state.messages = messages
                    .into_iter()
                    .map(|msg| ChatMessage::from_history(msg, now))
                    .collect();
                self.settle_creating(&mut effects);
            }
            // Our own message was already appended when it was sent.
            ServerMessage::User { .. } => {}
            ServerMessage::Tool {
                tool_name,
                status,
                result,
                args,
            } => {
                let timestamp = timestamp.as_deref().and_then(parse_timestamp).unwrap_or(now);
                let id = tool_message_id(self.state.current_session_id.as_deref(), &tool_name);
                let message = ChatMessage {
                    tool_name: Some(tool_name),
                    tool_status: Some(status),
                    tool_args: args,
                    ..ChatMessage::new(
                        id.clone(),
                        MessageRole::Tool,
                        result.unwrap_or_default(),
                        timestamp,
                    )
                };
                match self.state.messages.iter_mut().find(|m| m.id == id) {
                    Some(existing) => *existing = message,
                    None => self.state.messages.push(message),
                }
            }
            ServerMessage::Assistant { content } => {
                let timestamp = timestamp.as_deref().and_then(parse_timestamp).unwrap_or(now);
                let id = id.unwrap_or_else(|| format!("assistant-{}", new_id()));
                if !self.state.messages.iter().any(|m| m.id == id) {
                    self.state.messages.push(ChatMessage::new(
                        id,
                        MessageRole::Assistant,
                        content.unwrap_or_default(),
                        timestamp,
                    ));
                }
                self.finish_loading(&mut effects);
            }
            ServerMessage::Complete => self.finish_loading(&mut effects),
            ServerMessage::Error { content } => {
                let text = content.unwrap_or_else(|| "unknown error".to_string());
                self.state.messages.push(ChatMessage::new(
                    format!("error-{}", new_id()),
                    MessageRole::Assistant,
                    format!("❌ Error: {text}"),
                    now,
                ));
                self.finish_loading(&mut effects);
            }
            ServerMessage::FileChange => effects.push(Effect::FilesChanged),
            ServerMessage::ProjectIdSet { project_id } => {
                let value = project_id.to_string();
                let project = &mut self.state.project;
                project.committed = Some(value.clone());
                project.pending = value;
                project.is_set = true;
                project.required = false;
            }
            ServerMessage::RequireProjectId => self.state.project.required = true,
            ServerMessage::Unknown => {}
        }

        effects
    }

    /// Track the connection status. A lost connection abandons the pending
    /// response; a fresh one gets the committed project id again.
    pub fn set_connection(&mut self, status: ConnectionStatus) -> Vec<Effect> {
        self.state.connection = status;
        let mut effects = Vec::new();
        match status {
            ConnectionStatus::Connected => {
                if let Some(project_id) = &self.state.project.committed {
                    effects.push(Effect::Send(commands::set_project_id(project_id)));
                    self.state.project.is_set = true;
                }
            }
            ConnectionStatus::Disconnected => self.finish_loading(&mut effects),
            ConnectionStatus::Connecting => {}
        }
        effects
    }

    // -- User actions ----------------------------------------------------

    /// Optimistically append the user's message, then hand back the frame.
    pub fn submit_message(
        &mut self,
        content: &str,
        now: DateTime<Local>,
    ) -> Result<Vec<Effect>, ClientError> {
        let frame = commands::chat_message(content).ok_or(ClientError::EmptyMessage)?;
        self.require_connected()?;
        if self.state.project.blocks_sending() {
            return Err(ClientError::ProjectIdRequired);
        }
        if self.state.loading {
            return Err(ClientError::AwaitingResponse);
        }

        self.state.messages.push(ChatMessage::new(
            new_id(),
            MessageRole::User,
            content.to_string(),
            now,
        ));
        self.state.loading = true;
        self.state.show_thinking = false;
        Ok(vec![Effect::LoadingStarted, Effect::Send(frame)])
    }

    pub fn create_session(&mut self) -> Result<Vec<Effect>, ClientError> {
        self.require_connected()?;
        if self.state.creating_session {
            return Err(ClientError::CreateInProgress);
        }
        self.state.creating_session = true;
        self.state.messages.clear();
        Ok(vec![Effect::CreatingStarted, Effect::Send(commands::create_session())])
    }

    pub fn switch_session(&mut self, session_id: &str) -> Result<Vec<Effect>, ClientError> {
        self.require_connected()?;
        Ok(vec![Effect::Send(commands::switch_session(session_id))])
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<Vec<Effect>, ClientError> {
        self.require_connected()?;
        Ok(vec![Effect::Send(commands::delete_session(session_id))])
    }

    pub fn refresh_sessions(&mut self) -> Result<Vec<Effect>, ClientError> {
        self.require_connected()?;
        Ok(vec![Effect::Send(commands::get_sessions())])
    }

    pub fn set_pending_project_id(&mut self, value: &str) {
        self.state.project.pending = value.to_string();
    }

    pub fn confirm_project_id(&mut self) -> Result<Vec<Effect>, ClientError> {
        if !self.state.project.can_confirm() {
            return Err(ClientError::NothingToConfirm);
        }
        let value = self.state.project.pending.trim().to_string();
        let project = &mut self.state.project;
        project.committed = Some(value.clone());
        project.pending = value.clone();
        project.is_set = true;

        // Offline, the id goes out with the next `connected` transition.
        if self.state.connection != ConnectionStatus::Connected {
            return Ok(Vec::new());
        }
        self.state.project.status = ProjectIdStatus::Updating;
        Ok(vec![
            Effect::Send(commands::set_project_id(&value)),
            Effect::ProjectStatusUpdating,
        ])
    }

    // -- Timer callbacks -------------------------------------------------

    pub fn show_thinking(&mut self) {
        if self.state.loading {
            self.state.show_thinking = true;
        }
    }

    pub fn creating_timed_out(&mut self) {
        self.state.creating_session = false;
    }

    /// `updating → success → idle`; returns the new status if it moved.
    pub fn advance_project_status(&mut self) -> Option<ProjectIdStatus> {
        let next = match self.state.project.status {
            ProjectIdStatus::Updating => ProjectIdStatus::Success,
            ProjectIdStatus::Success => ProjectIdStatus::Idle,
            ProjectIdStatus::Idle => return None,
        };
        self.state.project.status = next;
        Some(next)
    }

    // -- Helpers ---------------------------------------------------------

    fn require_connected(&self) -> Result<(), ClientError> {
        if self.state.connection == ConnectionStatus::Connected {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn finish_loading(&mut self, effects: &mut Vec<Effect>) {
        if self.state.loading {
            self.state.loading = false;
            self.state.show_thinking = false;
            effects.push(Effect::LoadingFinished);
        }
    }

    fn settle_creating(&mut self, effects: &mut Vec<Effect>) {
        if self.state.creating_session {
            self.state.creating_session = false;
            effects.push(Effect::CreatingSettled);
        }
    }
}
