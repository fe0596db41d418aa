//! Retry logic with exponential backoff
//!
//! [`RequestExecutor`] turns one logical HTTP request into up to
//! `max_retries + 1` attempts. Transport errors, `5xx` responses and `401`
//! responses are retried; every other response is handed back to the caller
//! untouched, so 4xx interpretation stays with the caller.
//!
//! Note that `401` is retried like a server error, so bad credentials surface
//! as "request failed after 3 retries with status code: 401".
//!
//! # Example
//!
//! ```no_run
//! use imperva_export::config::RetryConfig;
//! use imperva_export::deadline::Deadline;
//! use imperva_export::retry::RequestExecutor;
//! use std::time::Duration;
//!
//! # async fn example() -> imperva_export::Result<()> {
//! let client = reqwest::Client::new();
//! let executor = RequestExecutor::new(client.clone(), RetryConfig::default());
//! let request = client
//!     .get("https://example.com/status")
//!     .build()
//!     .expect("static URL is valid");
//! let response = executor
//!     .execute(request, &Deadline::after(Duration::from_secs(60)))
//!     .await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use reqwest::{Request, Response, StatusCode};

/// Trait for outcomes that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the request should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for StatusCode {
    fn is_retryable(&self) -> bool {
        self.is_server_error() || *self == StatusCode::UNAUTHORIZED
    }
}

/// Connection, timeout and body failures are transient; a request that could
/// not be built or a rejected redirect fails the same way every time
impl IsRetryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        !(self.is_builder() || self.is_redirect())
    }
}

/// Sends requests with bounded retries and cancellable backoff
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    client: reqwest::Client,
    config: RetryConfig,
}

impl RequestExecutor {
    /// Create an executor over a shared HTTP client
    pub fn new(client: reqwest::Client, config: RetryConfig) -> Self {
        Self { client, config }
    }

    /// Execute `request`, retrying transient failures
    ///
    /// Each attempt sends a fresh copy of `request`. A body that cannot be
    /// cloned is sent once and never retried.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `deadline` fires during a request or a backoff wait
    /// - [`Error::Transport`] if the final attempt, or any non-retryable one,
    ///   failed at the transport level
    /// - [`Error::RetriesExhausted`] if the final attempt returned a retryable status
    pub async fn execute(&self, request: Request, deadline: &Deadline) -> Result<Response> {
        let max_retries = self.config.max_retries;
        let method = request.method().clone();
        let url = request.url().clone();
        let mut template = Some(request);
        let mut attempt: u32 = 0;

        loop {
            if deadline.is_expired() {
                return Err(Error::Cancelled);
            }

            let attempt_request = match template.as_ref().and_then(Request::try_clone) {
                Some(cloned) => cloned,
                None => template.take().ok_or_else(|| {
                    Error::Protocol("request body cannot be replayed for a retry".to_string())
                })?,
            };

            let outcome = tokio::select! {
                biased;
                _ = deadline.expired() => return Err(Error::Cancelled),
                outcome = self.client.execute(attempt_request) => outcome,
            };

            match outcome {
                Ok(response) if !response.status().is_retryable() => {
                    if attempt > 0 {
                        tracing::info!(
                            attempts = attempt + 1,
                            status = response.status().as_u16(),
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    drain(response, deadline).await;

                    if attempt == max_retries {
                        tracing::error!(
                            %method,
                            %url,
                            status = status.as_u16(),
                            retries = max_retries,
                            "Request failed after all retry attempts exhausted"
                        );
                        return Err(Error::RetriesExhausted {
                            retries: max_retries,
                            status: status.as_u16(),
                        });
                    }

                    tracing::warn!(
                        %method,
                        %url,
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        max_retries,
                        "Retryable status, retrying"
                    );
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(%method, %url, error = %e, "Request failed permanently");
                    return Err(Error::Transport {
                        retries: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    if attempt == max_retries {
                        tracing::error!(
                            %method,
                            %url,
                            error = %e,
                            retries = max_retries,
                            "Request failed after all retry attempts exhausted"
                        );
                        return Err(Error::Transport {
                            retries: max_retries,
                            source: e,
                        });
                    }

                    tracing::warn!(
                        %method,
                        %url,
                        error = %e,
                        attempt = attempt + 1,
                        max_retries,
                        "Request failed, retrying"
                    );
                }
            }

            let delay = self.config.delay_for_attempt(attempt);
            tracing::debug!(delay_ms = delay.as_millis(), "Backing off before retry");
            if !deadline.sleep(delay).await {
                return Err(Error::Cancelled);
            }
            attempt += 1;
        }
    }
}

/// Read a discarded response to the end so its connection can be reused
async fn drain(response: Response, deadline: &Deadline) {
    tokio::select! {
        _ = deadline.expired() => {}
        result = response.bytes() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Error discarding response body");
            }
        }
    }
}
