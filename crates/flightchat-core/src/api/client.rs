use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use super::{ApiResponse, HealthStatus, QueryHandle, QueryRequest, QueryResult, QueryService, Report};
use crate::error::NetworkError;

/// HTTP client for the flight analysis backend
#[derive(Clone)]
pub struct QueryClient {
    client: Client,
    base_url: String,
}

impl QueryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::from_reqwest("client", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /` health endpoint
    pub async fn health(&self) -> Result<HealthStatus, NetworkError> {
        self.get_json("/").await
    }

    /// Fetch one of the backend's precomputed reports. These come back as a bare
    /// `{type, data}` result rather than a pollable response.
    pub async fn fetch_report(&self, report: Report) -> Result<QueryResult, NetworkError> {
        self.get_json(&report.path()).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, NetworkError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(endpoint, e))?;

        if !response.status().is_success() {
            return Err(NetworkError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| NetworkError::from_reqwest(endpoint, e))
    }
}

#[async_trait]
impl QueryService for QueryClient {
    async fn submit(&self, query: &str) -> Result<QueryHandle, NetworkError> {
        let endpoint = "/api/query";
        let url = format!("{}{}", self.base_url, endpoint);

        let request = QueryRequest {
            query: query.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(endpoint, e))?;

        if !response.status().is_success() {
            return Err(NetworkError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let accepted: ApiResponse = response
            .json()
            .await
            .map_err(|e| NetworkError::from_reqwest(endpoint, e))?;

        if accepted.id.is_empty() {
            return Err(NetworkError::Decode {
                endpoint: endpoint.to_string(),
                message: "response carried an empty query id".to_string(),
            });
        }

        Ok(QueryHandle::new(accepted.id))
    }

    async fn check_status(&self, handle: &QueryHandle) -> Result<ApiResponse, NetworkError> {
        self.get_json(&status_endpoint(handle.as_str())).await
    }
}

/// Status path for `handle`, percent-encoded as a single path segment
fn status_endpoint(handle: &str) -> String {
    Url::parse("http://backend/api/query/status")
        .ok()
        .and_then(|mut url| {
            url.path_segments_mut().ok()?.push(handle);
            Some(url.path().to_string())
        })
        .unwrap_or_else(|| format!("/api/query/status/{}", handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_endpoint_encodes_handle() {
        assert_eq!(status_endpoint("q-42"), "/api/query/status/q-42");
        assert_eq!(status_endpoint("a/b c"), "/api/query/status/a%2Fb%20c");
        assert_eq!(status_endpoint("x?y#z"), "/api/query/status/x%3Fy%23z");
    }
}
