//! Line-oriented transcript rendering for `agentlink chat`.
//!
//! The renderer diffs each store snapshot against what it already printed
//! and returns only the new lines: fresh messages, tool status changes, the
//! thinking indicator and session switches.

use std::collections::HashMap;

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Table};
use console::style;

use agentlink_client::{ChatMessage, ConnectionStatus, ConversationState};
use agentlink_protocol::{MessageRole, SessionSummary};

#[derive(Debug, Default)]
pub struct Renderer {
    /// id → last printed tool status (`None` for non-tool messages)
    printed: HashMap<String, Option<String>>,
    session_id: Option<String>,
    thinking_shown: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, state: &ConversationState) -> Vec<String> {
        let mut lines = Vec::new();

        if state.current_session_id != self.session_id {
            self.session_id = state.current_session_id.clone();
            self.printed.clear();
            if let Some(id) = &self.session_id {
                lines.push(session_header(id, &state.sessions));
            }
        }

        // History replaced with something we never printed: start over.
        if !state.messages.is_empty()
            && !self.printed.is_empty()
            && !state.messages.iter().any(|m| self.printed.contains_key(&m.id))
        {
            self.printed.clear();
        }

        for msg in &state.messages {
            match self.printed.get(&msg.id) {
                None => lines.push(message_line(msg)),
                Some(status) if status.as_deref() != msg.tool_status.as_deref() => {
                    lines.push(tool_line(msg))
                }
                Some(_) => continue,
            }
            self.printed.insert(msg.id.clone(), msg.tool_status.clone());
        }

        if state.show_thinking && !self.thinking_shown {
            lines.push(style("… thinking").dim().italic().to_string());
        }
        self.thinking_shown = state.show_thinking;

        lines
    }
}

fn session_header(id: &str, sessions: &[SessionSummary]) -> String {
    let title = sessions
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.title.as_str())
        .unwrap_or("untitled");
    style(format!("── {title} ({id}) ──")).cyan().bold().to_string()
}

fn message_line(msg: &ChatMessage) -> String {
    let time = msg.timestamp.format("%H:%M");
    match msg.role {
        MessageRole::User => format!(
            "{} {} {}",
            style(time).dim(),
            style("you").green().bold(),
            msg.content
        ),
        MessageRole::Assistant => format!(
            "{} {} {}",
            style(time).dim(),
            style("agent").magenta().bold(),
            msg.content
        ),
        MessageRole::Tool => tool_line(msg),
    }
}

fn tool_line(msg: &ChatMessage) -> String {
    let name = msg.tool_name.as_deref().unwrap_or("tool");
    let status = msg.tool_status.as_deref().unwrap_or("pending");
    let status = match status {
        "completed" | "success" => style(status).green(),
        "error" | "failed" => style(status).red(),
        _ => style(status).yellow(),
    };
    let mut line = format!("  {} {} [{}]", style("⚙").dim(), style(name).bold(), status);
    if !msg.content.is_empty() {
        line.push_str(&format!(" {}", style(first_line(&msg.content)).dim()));
    }
    line
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

pub fn connection_line(status: ConnectionStatus) -> String {
    let label = match status {
        ConnectionStatus::Connected => style("● connected").green(),
        ConnectionStatus::Connecting => style("◌ connecting…").yellow(),
        ConnectionStatus::Disconnected => style("○ disconnected").red(),
    };
    label.to_string()
}

pub fn sessions_table(sessions: &[SessionSummary], current: Option<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["", "ID", "Title", "Messages", "Last message"]);
    for session in sessions {
        let marker = if current == Some(session.id.as_str()) { "*" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&session.id),
            Cell::new(&session.title),
            Cell::new(session.message_count),
            Cell::new(&session.last_message_at),
        ]);
    }
    table
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
