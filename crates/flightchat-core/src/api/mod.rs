//! Backend HTTP contract
//!
//! Wire types for `POST /api/query` and `GET /api/query/status/{id}`, plus the
//! [`QueryService`] seam the poll controller talks through.

pub mod client;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NetworkError, UnknownName};

pub use client::QueryClient;

/// Default backend address
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Body of `POST /api/query`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
}

/// Lifecycle status reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// Still working. `pending` is what the backend reports before its worker picks the query up.
    #[serde(alias = "pending")]
    Processing,
    Complete,
    Error,
}

impl QueryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, QueryStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Processing => "processing",
            QueryStatus::Complete => "complete",
            QueryStatus::Error => "error",
        }
    }
}

/// The `result` object of a complete response.
///
/// `kind` is kept as the raw string so that types this client does not know
/// about still reach the router and can be reported by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Set by the backend on `type: "error"` results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResult {
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
            title: None,
            message: None,
        }
    }
}

/// Response body of both query endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub id: String,
    pub status: QueryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
}

impl ApiResponse {
    pub fn processing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: QueryStatus::Processing,
            error: None,
            intermediate_result: None,
            result: None,
        }
    }

    pub fn complete(id: impl Into<String>, result: QueryResult) -> Self {
        Self {
            status: QueryStatus::Complete,
            result: Some(result),
            ..Self::processing(id)
        }
    }

    /// An error response, either reported by the backend or synthesized locally
    /// when polling fails.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Error,
            error: Some(error.into()),
            ..Self::processing(id)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Opaque identifier the backend issues for a submitted query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryHandle(String);

impl QueryHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `GET /`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Precomputed reports served directly by the backend (no polling involved)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    CategoryCounts,
    Trends,
    ByAccount,
    Recent,
}

impl Report {
    pub fn as_str(&self) -> &'static str {
        match self {
            Report::CategoryCounts => "category_counts",
            Report::Trends => "trends",
            Report::ByAccount => "by_account",
            Report::Recent => "recent",
        }
    }

    pub fn all() -> Vec<Report> {
        vec![
            Report::CategoryCounts,
            Report::Trends,
            Report::ByAccount,
            Report::Recent,
        ]
    }

    pub fn path(&self) -> String {
        format!("/api/failures/{}", self.as_str())
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Report::CategoryCounts => "Failure counts by category",
            Report::Trends => "Failure trends over time",
            Report::ByAccount => "Failures by account",
            Report::Recent => "Recent failures",
        }
    }
}

/// Accepts the wire names, hyphenated forms and a few short aliases.
impl FromStr for Report {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "category_counts" | "categories" => Ok(Report::CategoryCounts),
            "trends" => Ok(Report::Trends),
            "by_account" | "accounts" => Ok(Report::ByAccount),
            "recent" => Ok(Report::Recent),
            _ => Err(UnknownName {
                what: "report",
                value: s.to_string(),
                expected: Report::all()
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// The two calls the poll controller needs from the backend.
///
/// Implementations hold no per-query state and never retry.
#[async_trait]
pub trait QueryService: Send + Sync + 'static {
    /// Submit a question and return the handle to poll.
    async fn submit(&self, query: &str) -> Result<QueryHandle, NetworkError>;

    /// Fetch the current status of a submitted question.
    async fn check_status(&self, handle: &QueryHandle) -> Result<ApiResponse, NetworkError>;
}
