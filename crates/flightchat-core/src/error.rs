//! Error types for the query lifecycle

use thiserror::Error;

/// A request to the analysis backend failed before a usable response arrived.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The request never completed (connection refused, timeout, reset).
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        /// Path that was requested
        endpoint: String,
        /// Underlying transport error text
        message: String,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Path that was requested
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The body could not be decoded as the expected JSON shape.
    #[error("could not decode response from {endpoint}: {message}")]
    Decode {
        /// Path that was requested
        endpoint: String,
        /// Decoder error text
        message: String,
    },
}

impl NetworkError {
    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Why a query ended without a backend-produced terminal response.
///
/// A backend `status: "error"` payload is not a failure here: it is a valid
/// terminal response and travels through unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryFailure {
    /// The submit call failed; no handle was ever issued.
    #[error("Failed to submit query: {0}")]
    Submission(NetworkError),

    /// A status check failed while polling.
    #[error("Failed to check query status: {0}")]
    Poll(NetworkError),

    /// The attempt ceiling was reached while the backend still reported processing.
    #[error("Polling exhausted after {attempts} status checks")]
    Exhausted {
        /// Number of status checks issued
        attempts: u32,
    },
}

/// A name that matches none of the variants of `what`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown {what} '{value}' (expected one of: {expected})")]
pub struct UnknownName {
    /// What was being parsed
    pub what: &'static str,
    /// The rejected input
    pub value: String,
    /// Comma-separated accepted names
    pub expected: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages_name_the_cause() {
        let err = QueryFailure::Poll(NetworkError::Status {
            endpoint: "/api/query/status/abc".to_string(),
            status: 404,
        });
        assert_eq!(
            err.to_string(),
            "Failed to check query status: /api/query/status/abc returned HTTP 404"
        );

        let err = QueryFailure::Exhausted { attempts: 30 };
        assert_eq!(err.to_string(), "Polling exhausted after 30 status checks");
    }
}
