//! Single-shot archive download.

use crate::deadline::Deadline;
use crate::error::{Error, Result, ResultExt};
use crate::types::{Artifact, ExportState};
use crate::validation::{validate_account_id, validate_handle, validate_output_dir};
use reqwest::Method;

use super::{ExportClient, cancelled_as_timeout, response_error};

impl ExportClient {
    /// Download the archive of a finished job with one status request
    ///
    /// A job that is still running yields [`Error::NotReady`] instead of
    /// waiting; use [`ExportClient::wait_for_export`] to poll.
    pub async fn download_export(
        &self,
        account_id: i64,
        handle: &str,
        deadline: &Deadline,
    ) -> Result<Artifact> {
        self.download(account_id, handle, deadline)
            .await
            .context("error downloading export file")
    }

    async fn download(&self, account_id: i64, handle: &str, deadline: &Deadline) -> Result<Artifact> {
        let handle = validate_handle(handle)?;
        validate_account_id(account_id)?;
        validate_output_dir(&self.config.output_dir)?;

        let url = self.download_url(account_id, handle);
        let request = self.build_request(Method::GET, &url, None)?;
        let response = self
            .send(request, deadline)
            .await
            .map_err(cancelled_as_timeout)?;

        match ExportState::from_status(response.status()) {
            ExportState::Completed => {
                self.persist_archive(account_id, handle, response, deadline)
                    .await
            }
            ExportState::InProgress => Err(Error::NotReady {
                handle: handle.to_string(),
            }),
            _ => Err(response_error(response).await),
        }
    }
}
