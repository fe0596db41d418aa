//! Export client split into focused submodules.
//!
//! The `ExportClient` struct and its methods are organized by operation:
//! - [`submit`] - Start an export job and obtain its handle
//! - [`poll`] - Wait for a job to complete, then persist the archive
//! - [`download`] - Fetch a finished archive with a single request

mod download;
mod poll;
mod submit;


use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::{ApiErrors, Error, Result, TimeoutError, ValidationError};
use crate::persist;
use crate::retry::RequestExecutor;
use crate::types::{Artifact, CompletedExport, Event};
use reqwest::{Method, Request, Response};
use tokio::sync::broadcast;

/// Header carrying the API id
pub const API_ID_HEADER: &str = "x-API-Id";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-API-Key";

/// Client identifier sent with every request
pub const USER_AGENT: &str = concat!("imperva-export-cli/", env!("CARGO_PKG_VERSION"));

/// Client for the Account-Export API
///
/// Every operation takes a [`Deadline`] scoping all of its requests, retries
/// and waits.
#[derive(Clone)]
pub struct ExportClient {
    config: Config,
    http: reqwest::Client,
    executor: RequestExecutor,
    event_tx: broadcast::Sender<Event>,
}

impl ExportClient {
    /// Create a client from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {e}"),
                key: None,
            })?;
        let executor = RequestExecutor::new(http.clone(), config.retry.clone());
        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            config,
            http,
            executor,
            event_tx,
        })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to progress events
    ///
    /// Events are dropped when nobody is subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Submit an export, wait for it and download the archive
    ///
    /// Both phases share `deadline`.
    pub async fn run_export(&self, account_id: i64, deadline: &Deadline) -> Result<CompletedExport> {
        tracing::info!(account_id, "Initiating export");

        let handle = self.submit_export(account_id, deadline).await?;
        let artifact = self.wait_for_export(account_id, &handle, deadline).await?;

        tracing::debug!(account_id, handle = %handle, "Export completed successfully");
        Ok(CompletedExport { handle, artifact })
    }

    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn export_url(&self, account_id: i64) -> String {
        format!("{}/v3/export?caid={account_id}", self.base_url())
    }

    pub(crate) fn download_url(&self, account_id: i64, handle: &str) -> String {
        format!("{}/v3/download/{handle}?caid={account_id}", self.base_url())
    }

    fn base_url(&self) -> &str {
        self.config.api.base_url.trim_end_matches('/')
    }

    /// Build an authenticated request for `url`
    pub(crate) fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Request> {
        let parsed = url::Url::parse(url).map_err(|e| ValidationError::Url {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = self
            .http
            .request(method, parsed)
            .header(API_ID_HEADER, &self.config.api.api_id)
            .header(API_KEY_HEADER, &self.config.api.api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        builder.build().map_err(|e| Error::Config {
            message: format!("failed to create request: {e}"),
            key: None,
        })
    }

    /// Send `request` through the retrying executor
    pub(crate) async fn send(&self, request: Request, deadline: &Deadline) -> Result<Response> {
        tracing::debug!(method = %request.method(), url = %request.url(), "Sending request");
        self.executor.execute(request, deadline).await
    }

    /// Stream a `200 OK` archive response to disk, bounded by `deadline`
    pub(crate) async fn persist_archive(
        &self,
        account_id: i64,
        handle: &str,
        response: Response,
        deadline: &Deadline,
    ) -> Result<Artifact> {
        self.emit_event(Event::Downloading {
            handle: handle.to_string(),
        });

        let body = persist::body_reader(response);
        let saved = tokio::select! {
            biased;
            _ = deadline.expired() => return Err(TimeoutError::Deadline.into()),
            saved = persist::save_export(&self.config.output_dir, account_id, handle, body) => saved,
        };
        let artifact = saved.map_err(|e| e.context("failed to save export file"))?;

        self.emit_event(Event::Saved {
            path: artifact.path.clone(),
            bytes: artifact.bytes,
        });
        Ok(artifact)
    }
}

/// Turn a terminal non-success response into an error
///
/// A structured `{"errors": [...]}` payload becomes [`Error::Api`]; anything
/// else keeps the raw body text.
pub(crate) async fn response_error(response: Response) -> Error {
    let status = response.status();
    tracing::debug!(status = status.as_u16(), "Received error status code");

    match response.bytes().await {
        Ok(body) => match ApiErrors::parse(&body) {
            Some(errors) => Error::Api(errors),
            None => Error::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            },
        },
        Err(e) => Error::Protocol(format!("failed to read response body: {e}")),
    }
}

/// Report cancellation of a waiting operation as a timeout
pub(crate) fn cancelled_as_timeout(error: Error) -> Error {
    match error {
        Error::Cancelled => TimeoutError::Deadline.into(),
        other => other,
    }
}
