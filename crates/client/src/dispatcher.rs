//! Message dispatcher: raw text frame → typed frame → store.
//!
//! Frames carrying an `id` that was already processed are dropped, so a
//! server replay after reconnect does not duplicate messages.

use std::collections::HashSet;

use agentlink_protocol::{InboundFrame, ServerMessage};
use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::store::{ConversationStore, Effect};

const PREVIEW_CHARS: usize = 120;

/// Ids of inbound frames already applied
#[derive(Debug, Default)]
pub struct SeenIds {
    ids: HashSet<String>,
}

impl SeenIds {
    /// Record `id`; false when it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn reset<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.ids = ids.into_iter().collect();
    }
}

/// Outcome of dispatching one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Applied(Vec<Effect>),
    Duplicate,
    Malformed,
    Ignored,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    seen: SeenIds,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> &SeenIds {
        &self.seen
    }

    pub fn dispatch(
        &mut self,
        raw: &str,
        store: &mut ConversationStore,
        now: DateTime<Local>,
    ) -> Dispatch {
        let frame = match InboundFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    component = "dispatcher",
                    event = "ws.frame.malformed",
                    error = %e,
                    preview = %preview(raw),
                    "Failed to parse inbound frame"
                );
                return Dispatch::Malformed;
            }
        };

        if let Some(id) = frame.id.as_deref() {
            if !self.seen.insert(id) {
                debug!(
                    component = "dispatcher",
                    event = "ws.frame.duplicate",
                    id,
                    kind = frame.message.kind(),
                    "Duplicate frame dropped"
                );
                return Dispatch::Duplicate;
            }
        }

        if matches!(frame.message, ServerMessage::Unknown) {
            debug!(
                component = "dispatcher",
                event = "ws.frame.unknown",
                preview = %preview(raw),
                "Unknown frame type ignored"
            );
            return Dispatch::Ignored;
        }

        let history_ids = match &frame.message {
            ServerMessage::SessionMessages { messages, .. } => {
                Some(messages.iter().map(|m| m.id.clone()).collect::<Vec<_>>())
            }
            _ => None,
        };

        debug!(
            component = "dispatcher",
            event = "ws.frame.received",
            kind = frame.message.kind(),
            "Frame dispatched"
        );
        let effects = store.apply(frame, now);

        if let Some(ids) = history_ids {
            self.seen.reset(ids);
        }
        Dispatch::Applied(effects)
    }
}

fn preview(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
