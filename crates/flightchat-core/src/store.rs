//! UI-agnostic conversation state
//!
//! The result store keeps the append-only chat log and, separately, the most
//! recent terminal response that drives the visualization panel. Nothing here
//! depends on a specific UI framework.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::api::ApiResponse;

/// Who produced a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    System,
}

/// One entry in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    /// For user messages the question; for system messages the question that
    /// produced the attached response.
    pub text: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ApiResponse>,
}

#[derive(Debug, Default)]
pub struct ResultStore {
    messages: Vec<ChatMessage>,
    latest: Option<ApiResponse>,
    next_id: u64,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user's question.
    pub fn record_submission(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push(Sender::User, text.into(), None)
    }

    /// Append a system message for a terminal response and make it the latest
    /// result. `text` is the question this response answers, carried from
    /// submission time by the poll controller.
    pub fn record_terminal(&mut self, text: impl Into<String>, response: ApiResponse) -> &ChatMessage {
        self.latest = Some(response.clone());
        self.push(Sender::System, text.into(), Some(response))
    }

    pub fn latest(&self) -> Option<&ApiResponse> {
        self.latest.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, sender: Sender, text: String, response: Option<ApiResponse>) -> &ChatMessage {
        // Wall clock can step backwards; keep the log's timestamps non-decreasing
        let now = Local::now();
        let timestamp = match self.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: self.next_id,
            sender,
            text,
            timestamp,
            response,
        });
        &self.messages[self.messages.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_has_no_response() {
        let mut store = ResultStore::new();
        let msg = store.record_submission("Which airline has the most flights?");
        assert_eq!(msg.sender, Sender::User);
        assert!(msg.response.is_none());
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_terminal_updates_latest() {
        let mut store = ResultStore::new();
        store.record_submission("q1");
        let response = ApiResponse::failed("id-1", "dataset not loaded");
        let msg = store.record_terminal("q1", response.clone());
        assert_eq!(msg.sender, Sender::System);
        assert_eq!(msg.text, "q1");
        assert_eq!(msg.response.as_ref(), Some(&response));
        assert_eq!(store.latest(), Some(&response));
    }

    #[test]
    fn test_order_ids_and_timestamps_are_monotonic() {
        let mut store = ResultStore::new();
        store.record_submission("a");
        store.record_terminal("a", ApiResponse::failed("1", "x"));
        store.record_submission("b");
        store.record_terminal("b", ApiResponse::failed("2", "y"));

        let texts: Vec<&str> = store.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "a", "b", "b"]);
        for pair in store.messages().windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert_eq!(store.latest().map(|r| r.id.as_str()), Some("2"));
        assert_eq!(store.len(), 4);
    }
}
