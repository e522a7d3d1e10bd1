use std::sync::Arc;

use anyhow::Result;
use ratatui::layout::Rect;
use tokio::sync::mpsc;

use flightchat_core::{
    route, suggestions, ApiResponse, Config, PollController, PollMessage, PollOutcome,
    QueryClient, RenderInstruction, ResultStore,
};

/// Shown inline in the chat for answers drawn in the visualization panel
pub const VISUALIZATION_NOTE: &str = "[Visualization available in the panel]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Visualization,
    Input,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Input => FocusPane::Chat,
            FocusPane::Chat => FocusPane::Visualization,
            FocusPane::Visualization => FocusPane::Input,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub show_help: bool,

    // Query input
    pub query_input: String,
    pub query_cursor: usize,
    /// Index into the suggested questions while cycling through them
    pub suggestion_idx: Option<usize>,

    // Chat state
    pub store: ResultStore,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Visualization state
    pub viz_scroll: u16,

    // Status line and processing animation
    pub status_message: Option<String>,
    pub animation_frame: u8,
    pub api_url: String,

    // Panel areas for mouse hit-testing
    pub chat_area: Option<Rect>,
    pub viz_area: Option<Rect>,

    pub poller: PollController<QueryClient>,
}

impl App {
    pub fn new(config: &Config, poll_tx: mpsc::UnboundedSender<PollMessage>) -> Result<Self> {
        let client = QueryClient::with_timeout(config.api_url(), config.request_timeout())?;
        let poller = PollController::new(Arc::new(client), config.poll_config(), poll_tx);

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            show_help: false,

            query_input: String::new(),
            query_cursor: 0,
            suggestion_idx: None,

            store: ResultStore::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            viz_scroll: 0,

            status_message: None,
            animation_frame: 0,
            api_url: config.api_url().to_string(),

            chat_area: None,
            viz_area: None,

            poller,
        })
    }

    pub fn is_processing(&self) -> bool {
        self.poller.is_busy()
    }

    /// Submit the current input. The question is recorded in the chat only
    /// once the poller has accepted it.
    pub fn submit_query(&mut self) -> bool {
        let query = self.query_input.trim().to_string();
        if query.is_empty() || !self.poller.submit(query.clone()) {
            return false;
        }

        tracing::info!(query = %query, "Query submitted");
        self.store.record_submission(query);
        self.query_input.clear();
        self.query_cursor = 0;
        self.suggestion_idx = None;
        self.status_message = None;
        self.viz_scroll = 0;
        self.scroll_chat_to_bottom();
        true
    }

    pub fn apply_poll_message(&mut self, message: PollMessage) {
        if let Some(outcome) = self.poller.handle_message(message) {
            self.apply_outcome(outcome);
        }
    }

    pub fn apply_outcome(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Finished {
                query,
                response,
                failure,
            } => {
                tracing::info!(status = response.status.as_str(), "Query finished");
                self.status_message = failure.map(|f| f.to_string());
                self.store.record_terminal(query, response);
                self.viz_scroll = 0;
                self.scroll_chat_to_bottom();
            }
            PollOutcome::Rejected { failure, .. } => {
                tracing::warn!(error = %failure, "Query was not accepted");
                self.status_message = Some(failure.to_string());
            }
        }
    }

    /// Abandon the in-flight query, if any
    pub fn cancel_query(&mut self) {
        if self.poller.cancel() {
            self.status_message = Some("Query cancelled".to_string());
        }
    }

    /// Stop background polling before the app goes away
    pub fn shutdown(&mut self) {
        self.poller.cancel();
    }

    /// What the visualization panel should draw right now
    pub fn current_instruction(&self) -> Option<RenderInstruction> {
        if self.is_processing() {
            return Some(RenderInstruction::Processing);
        }
        self.store.latest().map(route)
    }

    /// Replace the input with the next (or previous) suggested question
    pub fn recall_suggestion(&mut self, forward: bool) {
        let idx = suggestions::cycle(self.suggestion_idx, forward);
        self.suggestion_idx = Some(idx);
        self.query_input = suggestions::SUGGESTED_QUESTIONS[idx].to_string();
        self.query_cursor = self.query_input.chars().count();
    }

    /// Input is empty or still shows an untouched suggestion
    pub fn can_recall_suggestion(&self) -> bool {
        match self.suggestion_idx {
            Some(idx) => suggestions::SUGGESTED_QUESTIONS[idx] == self.query_input,
            None => self.query_input.is_empty(),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_processing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_viz_down(&mut self, lines: u16) {
        self.viz_scroll = self.viz_scroll.saturating_add(lines);
    }

    pub fn scroll_viz_up(&mut self, lines: u16) {
        self.viz_scroll = self.viz_scroll.saturating_sub(lines);
    }

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.store.messages() {
            let body = match &msg.response {
                Some(response) => format!("{}\n{}", msg.text, reply_text(response)),
                None => msg.text.clone(),
            };
            total_lines = total_lines.saturating_add(1); // Sender line
            for line in body.lines() {
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add(char_count / wrap_width + 1);
            }
            total_lines = total_lines.saturating_add(2); // Timestamp + blank line
        }

        if self.is_processing() {
            total_lines = total_lines.saturating_add(2);
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        // Paragraph scroll offsets are u16; anything past that pins to the end
        let hidden = total_lines.saturating_sub(visible_height as usize);
        self.chat_scroll = u16::try_from(hidden).unwrap_or(u16::MAX);
    }
}

/// Inline chat summary of a terminal response
pub fn reply_text(response: &ApiResponse) -> String {
    match route(response) {
        RenderInstruction::Text { content } => content,
        RenderInstruction::Chart { .. } => VISUALIZATION_NOTE.to_string(),
        RenderInstruction::Error { message } => format!("Error: {}", message),
        RenderInstruction::Unsupported { kind } => format!("Unsupported visualization type: {}", kind),
        RenderInstruction::Processing => "Processing...".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::{AppEvent, EventHandler};
    use flightchat_core::{QueryFailure, QueryResult, Sender};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn test_app(api_url: &str) -> (App, EventHandler) {
        let events = EventHandler::detached();
        let config = Config {
            api_url: Some(api_url.to_string()),
            ..Config::new()
        };
        let app = App::new(&config, events.poll_sender()).unwrap();
        (app, events)
    }

    /// An address nothing listens on
    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_reply_text() {
        let text = ApiResponse::complete("1", QueryResult::new("text", Some(json!({"text": "United"}))));
        assert_eq!(reply_text(&text), "United");

        let chart = ApiResponse::complete("2", QueryResult::new("bar_chart", None));
        assert_eq!(reply_text(&chart), VISUALIZATION_NOTE);

        let failed = ApiResponse::failed("3", "");
        assert_eq!(reply_text(&failed), "Error: An error occurred");

        let odd = ApiResponse::complete("4", QueryResult::new("heatmap", None));
        assert_eq!(reply_text(&odd), "Unsupported visualization type: heatmap");
    }

    #[tokio::test]
    async fn test_long_answer_pins_scroll_to_end() {
        let (mut app, _events) = test_app("http://localhost:8000");
        let text = "row\n".repeat(70_000);
        app.apply_outcome(PollOutcome::Finished {
            query: "Every booking".to_string(),
            response: ApiResponse::complete("q-1", QueryResult::new("text", Some(json!({"text": text})))),
            failure: None,
        });

        assert_eq!(app.store.len(), 1);
        assert_eq!(app.chat_scroll, u16::MAX);
    }

    #[tokio::test]
    async fn test_finished_outcome_updates_store_and_panel() {
        let (mut app, _events) = test_app("http://localhost:8000");
        let response = ApiResponse::complete("q-1", QueryResult::new("pie_chart", None));

        app.apply_outcome(PollOutcome::Finished {
            query: "Top destinations".to_string(),
            response: response.clone(),
            failure: None,
        });

        assert_eq!(app.store.messages()[0].sender, Sender::System);
        assert_eq!(app.store.latest(), Some(&response));
        assert_eq!(app.current_instruction().map(|i| i.label().to_string()), Some("pie_chart".to_string()));
        assert_eq!(app.status_message, None);
    }

    #[tokio::test]
    async fn test_poll_failure_sets_status_line() {
        let (mut app, _events) = test_app("http://localhost:8000");
        let failure = QueryFailure::Exhausted { attempts: 3 };

        app.apply_outcome(PollOutcome::Finished {
            query: "q".to_string(),
            response: ApiResponse::failed("q-1", failure.to_string()),
            failure: Some(failure.clone()),
        });

        assert_eq!(app.status_message, Some(failure.to_string()));
        assert_eq!(app.current_instruction().map(|i| i.label().to_string()), Some("error".to_string()));
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_user_message() {
        let url = closed_port_url().await;
        let (mut app, mut events) = test_app(&url);
        app.query_input = "Which airline has the most flights?".to_string();

        assert!(app.submit_query());
        assert!(app.is_processing());
        assert!(app.query_input.is_empty());

        // Second submission is refused while the first is in flight
        app.query_input = "Another".to_string();
        assert!(!app.submit_query());
        assert_eq!(app.query_input, "Another");

        while app.is_processing() {
            match events.next().await {
                Some(AppEvent::Poll(message)) => app.apply_poll_message(message),
                Some(_) => {}
                None => panic!("event channel closed"),
            }
        }

        assert_eq!(app.store.len(), 1);
        assert_eq!(app.store.messages()[0].sender, Sender::User);
        assert!(app.store.latest().is_none());
        assert!(app
            .status_message
            .as_deref()
            .is_some_and(|s| s.starts_with("Failed to submit query")));
    }

    #[tokio::test]
    async fn test_blank_input_is_not_submitted() {
        let (mut app, _events) = test_app("http://localhost:8000");
        app.query_input = "   ".to_string();
        assert!(!app.submit_query());
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_suggestion_recall() {
        let (mut app, _events) = test_app("http://localhost:8000");
        assert!(app.can_recall_suggestion());

        app.recall_suggestion(true);
        assert_eq!(app.query_input, suggestions::SUGGESTED_QUESTIONS[0]);
        assert_eq!(app.query_cursor, app.query_input.chars().count());
        assert!(app.can_recall_suggestion());

        app.query_input.push('?');
        assert!(!app.can_recall_suggestion());
    }

    #[test]
    fn test_focus_cycles() {
        assert_eq!(FocusPane::Input.next(), FocusPane::Chat);
        assert_eq!(FocusPane::Chat.next(), FocusPane::Visualization);
        assert_eq!(FocusPane::Visualization.next(), FocusPane::Input);
    }
}
