//! Starting export jobs.

use crate::deadline::Deadline;
use crate::error::{Error, Result, ResultExt};
use crate::types::{Event, SubmitResponse};
use crate::validation::validate_account_id;
use reqwest::Method;

use super::{ExportClient, response_error};

impl ExportClient {
    /// Start an export for `account_id` and return the job handle
    ///
    /// The handle is returned exactly as issued by the service; it is
    /// validated when it is later used for polling or downloading.
    pub async fn submit_export(&self, account_id: i64, deadline: &Deadline) -> Result<String> {
        self.submit(account_id, deadline)
            .await
            .context("failed to initiate export")
    }

    async fn submit(&self, account_id: i64, deadline: &Deadline) -> Result<String> {
        validate_account_id(account_id)?;

        let url = self.export_url(account_id);
        tracing::debug!(account_id, url = %url, "Initiating export");

        let request = self.build_request(Method::POST, &url, None)?;
        let response = self.send(request, deadline).await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Protocol(format!("failed to read export initiation response: {e}")))?;
        let accepted: SubmitResponse = serde_json::from_slice(&body).map_err(|e| {
            Error::Protocol(format!("failed to decode export initiation response: {e}"))
        })?;

        if accepted.handler.is_empty() {
            return Err(Error::Protocol("received empty handler in response".to_string()));
        }

        tracing::info!(
            account_id,
            handle = %accepted.handler,
            status = %accepted.status,
            "Export initiated"
        );
        self.emit_event(Event::Submitted {
            account_id,
            handle: accepted.handler.clone(),
        });

        Ok(accepted.handler)
    }
}
