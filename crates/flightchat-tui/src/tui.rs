use std::io::{self, Stderr};
use std::time::Duration;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use flightchat_core::PollMessage;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Animation cadence for the processing indicator
const ANIMATION_TICK: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    /// Progress from the poll controller's background tasks
    Poll(PollMessage),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    poll_tx: mpsc::UnboundedSender<PollMessage>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let poll_tx = Self::spawn_poll_forwarder(tx.clone());

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let Ok(evt) = evt else { continue };
                let app_event = match evt {
                    // Only handle key press events, not release
                    Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
                    Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
                    _ => None,
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        let tx_tick = tx;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ANIMATION_TICK);
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, poll_tx }
    }

    /// Build a handler that only carries poll messages. Used where no
    /// terminal is attached.
    #[cfg(test)]
    pub fn detached() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let poll_tx = Self::spawn_poll_forwarder(tx);
        Self { rx, poll_tx }
    }

    fn spawn_poll_forwarder(tx: mpsc::UnboundedSender<AppEvent>) -> mpsc::UnboundedSender<PollMessage> {
        let (poll_tx, mut poll_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(message) = poll_rx.recv().await {
                if tx.send(AppEvent::Poll(message)).is_err() {
                    break;
                }
            }
        });
        poll_tx
    }

    /// Sender handed to the poll controller
    pub fn poll_sender(&self) -> mpsc::UnboundedSender<PollMessage> {
        self.poll_tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
