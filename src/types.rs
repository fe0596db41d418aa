//! Core types and events for imperva-export

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// State of one export operation, derived from status endpoint answers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    /// Accepted by the submit endpoint, not yet polled
    Submitted,
    /// Status endpoint answered `202 Accepted`
    InProgress,
    /// Status endpoint answered `200 OK`; the body is the archive
    Completed,
    /// Status endpoint answered anything else
    Failed,
    /// Deadline or poll budget ran out
    TimedOut,
}

impl ExportState {
    /// Map a status endpoint answer to the state it implies
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => ExportState::Completed,
            StatusCode::ACCEPTED => ExportState::InProgress,
            _ => ExportState::Failed,
        }
    }

    /// True for states that end the operation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportState::Completed | ExportState::Failed | ExportState::TimedOut
        )
    }

    /// The state after the deadline or poll budget ran out
    ///
    /// Terminal states are kept as they are.
    pub fn expire(self) -> Self {
        if self.is_terminal() {
            self
        } else {
            ExportState::TimedOut
        }
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportState::Submitted => "submitted",
            ExportState::InProgress => "in_progress",
            ExportState::Completed => "completed",
            ExportState::Failed => "failed",
            ExportState::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Body of the submit endpoint's `202 Accepted` answer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Opaque job handle
    #[serde(default)]
    pub handler: String,
    /// Free-form status text
    #[serde(default)]
    pub status: String,
}

/// An export archive persisted to disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Final path of the archive
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes: u64,
}

/// Result of the combined submit, wait and download flow
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedExport {
    /// Handle issued by the submit call
    pub handle: String,
    /// The downloaded archive
    pub artifact: Artifact,
}

/// Event emitted during an export operation
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The service accepted an export job
    Submitted {
        /// Account being exported
        account_id: i64,
        /// Handle of the new job
        handle: String,
    },

    /// The job is still running
    InProgress {
        /// Handle of the job
        handle: String,
        /// Status requests issued so far
        attempt: u32,
        /// Wait before the next status request
        next_poll: Duration,
    },

    /// The archive is ready and is being written
    Downloading {
        /// Handle of the job
        handle: String,
    },

    /// The archive was written to its final path
    Saved {
        /// Final path of the archive
        path: PathBuf,
        /// Number of bytes written
        bytes: u64,
    },
}
