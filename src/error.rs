//! Error types for imperva-export
//!
//! This module provides the error taxonomy shared by every component:
//! - Input validation failures that never reach the network
//! - Transport and exhausted-retry failures from the request executor
//! - Structured API errors decoded from the remote service
//! - Protocol, timeout and local I/O failures
//! - Operation context attached as errors cross component boundaries

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imperva-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imperva-export
///
/// Every terminal failure surfaced by the client is one of these variants.
/// Transient failures are retried inside the request executor and only show
/// up here once the retry budget is spent.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api-id")
        key: Option<String>,
    },

    /// Input rejected before any I/O was attempted
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network or connection failure on the final attempt
    #[error("request failed after {retries} retries: {source}")]
    Transport {
        /// Number of retries performed after the first attempt
        retries: u32,
        /// The transport error from the final attempt
        #[source]
        source: reqwest::Error,
    },

    /// The server kept answering with a retryable status until the budget ran out
    #[error("request failed after {retries} retries with status code: {status}")]
    RetriesExhausted {
        /// Number of retries performed after the first attempt
        retries: u32,
        /// Status code of the final response
        status: u16,
    },

    /// The caller's deadline or cancellation signal fired during a request
    #[error("request context canceled")]
    Cancelled,

    /// Structured error payload returned by the API
    #[error(transparent)]
    Api(#[from] ApiErrors),

    /// Non-success status without a structured error payload
    #[error("unexpected status code {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Raw response body text
        body: String,
    },

    /// The export exists but is still being prepared
    #[error("export {handle} is not ready yet")]
    NotReady {
        /// The job handle that was queried
        handle: String,
    },

    /// Malformed or unexpected response shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Polling did not reach a terminal state in time
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// Local filesystem failure while staging or promoting the artifact
    #[error("{context} ({}): {source}", .path.display())]
    Io {
        /// What was being done when the failure happened
        context: String,
        /// The path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An error annotated with the operation it crossed on the way up
    #[error("{operation}: {source}")]
    Context {
        /// Name of the operation that failed
        operation: &'static str,
        /// The wrapped cause
        #[source]
        source: Box<Error>,
    },
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Account id is zero or negative
    #[error("invalid caid: {0}")]
    AccountId(i64),

    /// Job handle is blank
    #[error("handler is required")]
    EmptyHandle,

    /// Job handle is not a lowercase 8-4-4-4-12 UUID
    #[error("invalid handler format: {0}")]
    Handle(String),

    /// Output directory contains a traversal segment
    #[error("invalid output directory: {0}")]
    OutputDir(String),

    /// File path contains a traversal segment
    #[error("invalid file path: {0}")]
    FilePath(String),

    /// Absolute file path outside the system temp directory
    #[error("absolute paths are only allowed in the system temp directory: {0}")]
    AbsolutePath(String),

    /// Parent directory of a file path failed the output directory check
    #[error("invalid directory in file path: {0}")]
    ParentDir(String),

    /// URL could not be parsed
    #[error("invalid URL '{url}': {reason}")]
    Url {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },
}

/// Polling timeouts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutError {
    /// The wall-clock deadline expired or the caller cancelled
    #[error("timed out while waiting for export to complete")]
    Deadline,

    /// The poll attempt budget was spent while the export was still running
    #[error("maximum number of attempts ({attempts}) reached while waiting for export to complete")]
    MaxAttempts {
        /// The configured attempt budget
        attempts: u32,
    },
}

/// A single entry of the API's `errors` array
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiError {
    /// HTTP status reported by the service
    pub status: u16,
    /// Error instance id
    pub id: String,
    /// Machine-readable error code
    pub code: String,
    /// Location of the offending input
    pub source: ApiErrorSource,
    /// Short summary
    pub title: String,
    /// Human-readable explanation
    pub detail: String,
}

/// Pointer to the request element an [`ApiError`] refers to
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiErrorSource {
    /// JSON pointer into the request
    pub pointer: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "API error: {} - {} (Status Code: {})",
            self.title, self.detail, self.status
        )
    }
}

/// Error envelope returned by the API on failure
///
/// ```json
/// {"errors": [{"status": 400, "id": "e1", "code": "BadRequest",
///              "source": {"pointer": "/export"},
///              "title": "Bad Request", "detail": "Invalid input"}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrors {
    /// Every error reported in the payload
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl std::fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "API errors: {}", messages.join("; "))
    }
}

impl std::error::Error for ApiErrors {}

impl ApiErrors {
    /// Decode a structured error payload, returning `None` when the body is
    /// not JSON of the expected shape or carries no errors.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .filter(|parsed| !parsed.errors.is_empty())
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad configuration
    Config,
    /// Bad account id, handle, path or URL
    Validation,
    /// Network failure or exhausted retries
    Transport,
    /// Cancelled by the caller's deadline or signal
    Cancelled,
    /// Structured or unstructured failure reported by the service
    Api,
    /// Unexpected response shape or state
    Protocol,
    /// Deadline or poll budget exceeded
    Timeout,
    /// Local filesystem failure
    Io,
}

impl ErrorKind {
    /// Machine-readable name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Api => "api_error",
            ErrorKind::Protocol => "protocol_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Io => "io_error",
        }
    }
}

impl Error {
    /// Wrap this error with the name of the operation it escaped from
    pub fn context(self, operation: &'static str) -> Self {
        Error::Context {
            operation,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any operation context
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Classify the underlying error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Config,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Transport { .. } | Error::RetriesExhausted { .. } => ErrorKind::Transport,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Api(_) | Error::UnexpectedStatus { .. } => ErrorKind::Api,
            Error::NotReady { .. } | Error::Protocol(_) => ErrorKind::Protocol,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Io { .. } => ErrorKind::Io,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// True when polling gave up because of the deadline or the attempt budget
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub(crate) fn io(
        context: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }
}

/// Attach operation context to a fallible result
pub trait ResultExt<T> {
    /// Wrap the error, if any, with `operation`
    fn context(self, operation: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| e.context(operation))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, ErrorKind)> {
        vec![
            (
                Error::Config {
                    message: "API ID must be provided".into(),
                    key: Some("api-id".into()),
                },
                ErrorKind::Config,
            ),
            (
                Error::Validation(ValidationError::AccountId(0)),
                ErrorKind::Validation,
            ),
            (
                Error::RetriesExhausted {
                    retries: 3,
                    status: 503,
                },
                ErrorKind::Transport,
            ),
            (Error::Cancelled, ErrorKind::Cancelled),
            (Error::Api(ApiErrors::default()), ErrorKind::Api),
            (
                Error::UnexpectedStatus {
                    status: 302,
                    body: String::new(),
                },
                ErrorKind::Api,
            ),
            (
                Error::NotReady {
                    handle: "h".into(),
                },
                ErrorKind::Protocol,
            ),
            (Error::Protocol("bad".into()), ErrorKind::Protocol),
            (Error::Timeout(TimeoutError::Deadline), ErrorKind::Timeout),
            (
                Error::io(
                    "failed to create temp file",
                    "/tmp/x",
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                ),
                ErrorKind::Io,
            ),
        ]
    }

    #[test]
    fn every_variant_has_a_kind() {
        for (error, expected) in all_error_variants() {
            assert_eq!(error.kind(), expected, "wrong kind for {error}");
            assert_eq!(
                error.context("outer").kind(),
                expected,
                "context must not change the kind"
            );
        }
    }

    #[test]
    fn retries_exhausted_message_names_budget_and_status() {
        let err = Error::RetriesExhausted {
            retries: 3,
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "request failed after 3 retries with status code: 500"
        );
    }

    #[test]
    fn context_prefixes_operation_and_keeps_root() {
        let err = Error::Timeout(TimeoutError::MaxAttempts { attempts: 60 })
            .context("waiting for export");
        assert_eq!(
            err.to_string(),
            "waiting for export: maximum number of attempts (60) reached while waiting for export to complete"
        );
        assert!(err.is_timeout());
        assert!(matches!(
            err.root(),
            Error::Timeout(TimeoutError::MaxAttempts { attempts: 60 })
        ));
    }

    #[test]
    fn parse_structured_api_errors() {
        let body = br#"{"errors":[{"status":400,"id":"error1","code":"BadRequest","source":{"pointer":"/export"},"title":"Bad Request","detail":"Invalid input"},{"status":401,"title":"Authentication Error","detail":"Authentication missing or invalid"}]}"#;
        let parsed = ApiErrors::parse(body).unwrap();

        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].source.pointer, "/export");
        assert_eq!(parsed.errors[1].code, "");
        assert_eq!(
            parsed.to_string(),
            "API errors: API error: Bad Request - Invalid input (Status Code: 400); \
             API error: Authentication Error - Authentication missing or invalid (Status Code: 401)"
        );
    }

    #[test]
    fn parse_rejects_empty_or_foreign_payloads() {
        assert!(ApiErrors::parse(b"").is_none());
        assert!(ApiErrors::parse(b"not json").is_none());
        assert!(ApiErrors::parse(br#"{"errors":[]}"#).is_none());
        assert!(ApiErrors::parse(br#"{"message":"nope"}"#).is_none());
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ErrorKind::Timeout.as_str(), "timeout");
        assert_eq!(ErrorKind::Validation.as_str(), "validation_error");
    }
}
