//! Core types shared across the protocol

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Summary of a session for list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub last_message_at: String,
    #[serde(default)]
    pub message_count: u64,
}

/// A message as stored by the server and replayed in `session_messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<String>,
}

/// Project identifier as it travels on the wire.
///
/// The server expects an integer. Input that does not parse as one is
/// forwarded verbatim so the server can reject it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectId {
    Number(i64),
    Raw(String),
}

impl ProjectId {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => ProjectId::Number(n),
            Err(_) => ProjectId::Raw(trimmed.to_string()),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectId::Number(n) => write!(f, "{n}"),
            ProjectId::Raw(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_parses_integers_and_forwards_the_rest() {
        assert_eq!(ProjectId::parse(" 42 "), ProjectId::Number(42));
        assert_eq!(ProjectId::parse("abc"), ProjectId::Raw("abc".to_string()));
        assert_eq!(ProjectId::parse("12").to_string(), "12");
    }

    #[test]
    fn history_message_tolerates_missing_optional_fields() {
        let json = r#"{"id":"m1","role":"tool","content":"ok","tool_name":"build","tool_status":null}"#;
        let msg: HistoryMessage = serde_json::from_str(json).expect("parse history message");
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_name.as_deref(), Some("build"));
        assert!(msg.tool_status.is_none());
        assert!(msg.timestamp.is_none());
    }
}
