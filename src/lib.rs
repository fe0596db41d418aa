//! # imperva-export
//!
//! Client library for the Imperva Account-Export API.
//!
//! An export is an asynchronous job: the service accepts a request for one
//! account, hands back a job handle, and later serves the finished Terraform
//! archive for that handle. This crate wraps the three steps:
//! - **Submit** - start an export and obtain its handle
//! - **Wait** - poll the job with capped exponential backoff, then download
//! - **Download** - fetch a finished archive with a single request
//!
//! Every HTTP request goes through a retrying executor, every operation is
//! bounded by a [`Deadline`], and archives are written atomically so a failed
//! download never leaves a partial file behind.
//!
//! ## Quick Start
//!
//! ```no_run
//! use imperva_export::{Config, Deadline, ExportClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.api_id = "12345".to_string();
//!     config.api.api_key = "secret".to_string();
//!     config.output_dir = "./exports".into();
//!
//!     let client = ExportClient::new(config)?;
//!
//!     // Subscribe to progress events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let deadline = Deadline::after(Duration::from_secs(600));
//!     let export = client.run_export(123456, &deadline).await?;
//!     println!("saved {}", export.artifact.path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Export API client (decomposed into per-operation submodules)
pub mod client;
/// Configuration types
pub mod config;
/// Deadlines and cancellation
pub mod deadline;
/// Error types
pub mod error;
/// Atomic archive persistence
pub mod persist;
/// Retrying request executor
pub mod retry;
/// Core types and events
pub mod types;
/// Input validation
pub mod validation;

// Re-export commonly used types
pub use client::ExportClient;
pub use config::{ApiConfig, Config, PollConfig, RetryConfig, TimeoutConfig};
pub use deadline::Deadline;
pub use error::{
    ApiError, ApiErrors, Error, ErrorKind, Result, ResultExt, TimeoutError, ValidationError,
};
pub use retry::{IsRetryable, RequestExecutor};
pub use types::{Artifact, CompletedExport, Event, ExportState, SubmitResponse};

/// Cancel `token` when the process receives a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use imperva_export::{Deadline, cancel_on_signal};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let shutdown = CancellationToken::new();
///     tokio::spawn(cancel_on_signal(shutdown.clone()));
///
///     let deadline = Deadline::after(Duration::from_secs(60)).with_parent(&shutdown);
///     // ... pass `deadline` to client operations
/// #   drop(deadline);
/// }
/// ```
pub async fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => token.cancel(),
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut terminate), Ok(mut interrupt)) => {
            tokio::select! {
                _ = terminate.recv() => tracing::info!("Received SIGTERM, cancelling"),
                _ = interrupt.recv() => tracing::info!("Received SIGINT (Ctrl+C), cancelling"),
            }
        }
        (Ok(mut terminate), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            terminate.recv().await;
            tracing::info!("Received SIGTERM, cancelling");
        }
        (Err(e), Ok(mut interrupt)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            interrupt.recv().await;
            tracing::info!("Received SIGINT (Ctrl+C), cancelling");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, cancelling");
}
