//! Croft HTTP Client
//!
//! A simple, type-safe HTTP client for the Croft orchestrator API: submit
//! import and report jobs, then poll them until they finish.
//!
//! # Example
//!
//! ```no_run
//! use croft_client::OrchestratorClient;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> croft_client::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let accepted = client
//!         .submit_import("species_id,event_type,date\n".to_string())
//!         .await?;
//!
//!     let job = client
//!         .wait_for_job(accepted.job_id, Duration::from_secs(2), None)
//!         .await?;
//!     println!("Job {} finished: {}", job.id, job.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;

// Re-export commonly used types
pub use croft_core::dto::job::JobAccepted;
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Croft orchestrator API
///
/// Covers job submission (imports and investor reports), job status
/// queries and job logs.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use croft_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
