pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod poll;
pub mod router;
pub mod store;
pub mod suggestions;

// Re-export main types for convenience
pub use api::{ApiResponse, QueryClient, QueryHandle, QueryResult, QueryService, QueryStatus, Report};
pub use chart::{ResultKind, Visualization};
pub use config::Config;
pub use error::{NetworkError, QueryFailure, UnknownName};
pub use poll::{Phase, PollConfig, PollController, PollMessage, PollOutcome};
pub use router::{route, RenderInstruction};
pub use store::{ChatMessage, ResultStore, Sender};
