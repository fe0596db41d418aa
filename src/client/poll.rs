//! Waiting for export jobs to complete.

use crate::deadline::Deadline;
use crate::error::{Error, Result, ResultExt, TimeoutError};
use crate::types::{Artifact, Event, ExportState};
use crate::validation::{validate_account_id, validate_handle, validate_output_dir};
use reqwest::Method;

use super::{ExportClient, cancelled_as_timeout, response_error};

impl ExportClient {
    /// Poll the job until it completes, then stream the archive to disk
    ///
    /// Polling stops with a timeout error when `deadline` expires or is
    /// cancelled, and with a max-attempts error once the configured number of
    /// status requests all reported the job as still running.
    pub async fn wait_for_export(
        &self,
        account_id: i64,
        handle: &str,
        deadline: &Deadline,
    ) -> Result<Artifact> {
        self.poll_until_complete(account_id, handle, deadline)
            .await
            .context("error checking export status")
    }

    async fn poll_until_complete(
        &self,
        account_id: i64,
        handle: &str,
        deadline: &Deadline,
    ) -> Result<Artifact> {
        validate_account_id(account_id)?;
        let handle = validate_handle(handle)?;
        validate_output_dir(&self.config.output_dir)?;

        let poll = &self.config.poll;
        let url = self.download_url(account_id, handle);
        let mut interval = poll.initial_interval;
        let mut attempts: u32 = 0;
        let mut state = ExportState::Submitted;

        tracing::info!(account_id, handle, "Waiting for export to complete");

        loop {
            if deadline.is_expired() {
                return Err(time_out(state, handle, attempts, TimeoutError::Deadline));
            }

            let request = self.build_request(Method::GET, &url, None)?;
            let sent = self
                .send(request, deadline)
                .await
                .map_err(cancelled_as_timeout);
            let response = match sent {
                Ok(response) => response,
                Err(Error::Timeout(reason)) => {
                    return Err(time_out(state, handle, attempts, reason));
                }
                Err(e) => return Err(e),
            };
            attempts += 1;

            let next = ExportState::from_status(response.status());
            if next != state {
                tracing::debug!(from = %state, to = %next, status = response.status().as_u16(), "Export state changed");
                state = next;
            }

            match state {
                ExportState::Completed => {
                    tracing::info!(handle, attempts, "Export completed, saving file");
                    return self
                        .persist_archive(account_id, handle, response, deadline)
                        .await;
                }
                ExportState::InProgress => {
                    drop(response);
                }
                _ => return Err(response_error(response).await),
            }

            if attempts >= poll.max_attempts {
                let reason = TimeoutError::MaxAttempts {
                    attempts: poll.max_attempts,
                };
                return Err(time_out(state, handle, attempts, reason));
            }

            tracing::info!(
                handle,
                attempt = attempts,
                next_poll_ms = interval.as_millis(),
                "Export still in progress"
            );
            self.emit_event(Event::InProgress {
                handle: handle.to_string(),
                attempt: attempts,
                next_poll: interval,
            });

            if !deadline.sleep(interval).await {
                return Err(time_out(state, handle, attempts, TimeoutError::Deadline));
            }
            interval = poll.next_interval(interval);
        }
    }
}

/// Move an unfinished poll to [`ExportState::TimedOut`] and build its error
fn time_out(state: ExportState, handle: &str, attempts: u32, reason: TimeoutError) -> Error {
    let expired = state.expire();
    tracing::debug!(from = %state, to = %expired, "Export state changed");
    tracing::warn!(handle, attempts, %reason, "Stopped waiting for export");
    reason.into()
}
