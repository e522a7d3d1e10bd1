//! Query lifecycle controller
//!
//! Drives one question at a time through `Idle -> Submitting -> Polling -> Idle`.
//!
//! ```text
//!   submit()            Submitted(Ok)            Status(processing)
//!  Idle ──────► Submitting ──────────► Polling ◄──────────────┐
//!   ▲               │                   │  │  Tick ─► check ───┘
//!   │  Submitted(Err)                   │  │
//!   └───────────────┘◄──────────────────┘  └─ Status(complete|error|Err), ceiling
//! ```
//!
//! The controller never blocks. Network calls and the poll timer run as tokio
//! tasks that report back through an unbounded channel as [`PollMessage`]s; the
//! owner feeds each message to [`PollController::handle_message`] on its own
//! task. Every message carries the ticket of the query that produced it, and a
//! message whose ticket is not the active one is dropped. That is what keeps a
//! late response from an abandoned query, or a tick that was already queued when
//! the timer stopped, from touching the current query.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiResponse, QueryHandle, QueryService};
use crate::error::{NetworkError, QueryFailure};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 300;
/// Shortest cadence the timer accepts; shorter intervals are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status checks
    pub interval: Duration,
    /// Status checks allowed per query; `None` polls until a terminal status
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Polling,
}

/// A completion or timer tick destined for [`PollController::handle_message`].
#[derive(Debug)]
pub struct PollMessage(Event);

#[derive(Debug)]
enum Event {
    Submitted {
        ticket: u64,
        result: Result<QueryHandle, NetworkError>,
    },
    Tick {
        ticket: u64,
    },
    Status {
        ticket: u64,
        result: Result<ApiResponse, NetworkError>,
    },
}

impl Event {
    fn ticket(&self) -> u64 {
        match self {
            Event::Submitted { ticket, .. } | Event::Tick { ticket } | Event::Status { ticket, .. } => {
                *ticket
            }
        }
    }
}

/// How a query left the controller
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A terminal response to record. `failure` is set when the response was
    /// synthesized because polling failed or ran out of attempts.
    Finished {
        query: String,
        response: ApiResponse,
        failure: Option<QueryFailure>,
    },
    /// The submit call failed; the backend never issued a handle.
    Rejected { query: String, failure: QueryFailure },
}

impl PollOutcome {
    pub fn query(&self) -> &str {
        match self {
            PollOutcome::Finished { query, .. } | PollOutcome::Rejected { query, .. } => query,
        }
    }
}

struct ActiveQuery {
    ticket: u64,
    query: String,
    handle: Option<QueryHandle>,
    attempts: u32,
    check_in_flight: bool,
}

pub struct PollController<S: QueryService> {
    service: Arc<S>,
    config: PollConfig,
    tx: mpsc::UnboundedSender<PollMessage>,
    active: Option<ActiveQuery>,
    next_ticket: u64,
    timer: Option<JoinHandle<()>>,
}

impl<S: QueryService> PollController<S> {
    pub fn new(service: Arc<S>, mut config: PollConfig, tx: mpsc::UnboundedSender<PollMessage>) -> Self {
        config.interval = config.interval.max(MIN_POLL_INTERVAL);
        Self {
            service,
            config,
            tx,
            active: None,
            next_ticket: 0,
            timer: None,
        }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    pub fn phase(&self) -> Phase {
        match &self.active {
            None => Phase::Idle,
            Some(active) if active.handle.is_none() => Phase::Submitting,
            Some(_) => Phase::Polling,
        }
    }

    /// True from an accepted submission until its terminal outcome.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// The question currently being answered
    pub fn active_query(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.query.as_str())
    }

    /// Status checks issued for the active query
    pub fn attempts(&self) -> u32 {
        self.active.as_ref().map_or(0, |active| active.attempts)
    }

    /// Start answering `query`. Returns false, without side effects, when a
    /// query is already active or `query` is blank.
    pub fn submit(&mut self, query: impl Into<String>) -> bool {
        let query = query.into();
        if self.active.is_some() {
            debug!("submission ignored while a query is active");
            return false;
        }
        if query.trim().is_empty() {
            return false;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.active = Some(ActiveQuery {
            ticket,
            query: query.clone(),
            handle: None,
            attempts: 0,
            check_in_flight: false,
        });
        info!(ticket, "submitting query");

        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.submit(&query).await;
            let _ = tx.send(PollMessage(Event::Submitted { ticket, result }));
        });

        true
    }

    /// Abandon the active query: stop the timer and forget the handle. Any
    /// completion still in flight is ignored when it arrives. Returns false if
    /// nothing was active.
    pub fn cancel(&mut self) -> bool {
        match self.finish() {
            Some(active) => {
                info!(ticket = active.ticket, "query abandoned");
                true
            }
            None => false,
        }
    }

    /// Apply one message. Returns the outcome when it ends the active query.
    pub fn handle_message(&mut self, message: PollMessage) -> Option<PollOutcome> {
        let event = message.0;
        let ticket = event.ticket();
        if self.active.as_ref().map(|active| active.ticket) != Some(ticket) {
            debug!(ticket, "dropping message for inactive query");
            return None;
        }

        match event {
            Event::Submitted { result, .. } => self.on_submitted(result),
            Event::Tick { .. } => self.on_tick(),
            Event::Status { result, .. } => self.on_status(result),
        }
    }

    fn on_submitted(&mut self, result: Result<QueryHandle, NetworkError>) -> Option<PollOutcome> {
        match result {
            Ok(handle) => {
                let active = self.active.as_mut()?;
                if active.handle.is_some() {
                    warn!(ticket = active.ticket, "duplicate submission acknowledgement");
                    return None;
                }
                debug!(ticket = active.ticket, handle = %handle, "query accepted, polling");
                active.handle = Some(handle);
                let ticket = active.ticket;
                self.start_timer(ticket);
                None
            }
            Err(err) => {
                let active = self.finish()?;
                warn!(ticket = active.ticket, error = %err, "query submission failed");
                Some(PollOutcome::Rejected {
                    query: active.query,
                    failure: QueryFailure::Submission(err),
                })
            }
        }
    }

    fn on_tick(&mut self) -> Option<PollOutcome> {
        let max_attempts = self.config.max_attempts;
        let active = self.active.as_mut()?;
        let Some(handle) = active.handle.clone() else {
            return None;
        };
        if active.check_in_flight {
            debug!(ticket = active.ticket, "previous status check still running");
            return None;
        }

        if let Some(max) = max_attempts {
            if active.attempts >= max {
                let failure = QueryFailure::Exhausted {
                    attempts: active.attempts,
                };
                return self.fail(handle, failure);
            }
        }

        active.attempts += 1;
        active.check_in_flight = true;
        let ticket = active.ticket;
        debug!(ticket, attempt = active.attempts, "checking query status");

        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.check_status(&handle).await;
            let _ = tx.send(PollMessage(Event::Status { ticket, result }));
        });

        None
    }

    fn on_status(&mut self, result: Result<ApiResponse, NetworkError>) -> Option<PollOutcome> {
        let active = self.active.as_mut()?;
        let handle = active.handle.clone()?;
        active.check_in_flight = false;

        match result {
            Ok(response) if !response.is_terminal() => None,
            Ok(response) => {
                let active = self.finish()?;
                info!(
                    ticket = active.ticket,
                    status = response.status.as_str(),
                    attempts = active.attempts,
                    "query finished"
                );
                Some(PollOutcome::Finished {
                    query: active.query,
                    response,
                    failure: None,
                })
            }
            Err(err) => self.fail(handle, QueryFailure::Poll(err)),
        }
    }

    fn fail(&mut self, handle: QueryHandle, failure: QueryFailure) -> Option<PollOutcome> {
        let active = self.finish()?;
        warn!(ticket = active.ticket, error = %failure, "polling stopped");
        Some(PollOutcome::Finished {
            query: active.query,
            response: ApiResponse::failed(handle.as_str(), failure.to_string()),
            failure: Some(failure),
        })
    }

    fn finish(&mut self) -> Option<ActiveQuery> {
        self.stop_timer();
        self.active.take()
    }

    fn start_timer(&mut self, ticket: u64) {
        self.stop_timer();

        let period = self.config.interval;
        let tx = self.tx.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(PollMessage(Event::Tick { ticket })).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<S: QueryService> Drop for PollController<S> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
