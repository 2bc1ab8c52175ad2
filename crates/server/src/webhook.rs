//! Calls an action's integration and parses its reply.

use postaction_core::{PostActionIntegrationRequest, PostActionIntegrationResponse};
use reqwest::header::ACCEPT;
use reqwest::{Response, StatusCode};
use tracing::{debug, error, instrument, warn};

use crate::egress::Egress;
use crate::error::DispatchError;
use crate::outbound::HttpService;

/// Largest integration reply read into memory.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Performs the outbound POST for a fired action.
#[derive(Debug, Clone)]
pub struct WebhookInvoker {
    http: HttpService,
}

impl WebhookInvoker {
    #[must_use]
    pub const fn new(http: HttpService) -> Self {
        Self { http }
    }

    /// POST `request` to `url` and parse the integration's reply.
    ///
    /// At most [`MAX_RESPONSE_BYTES`] of the reply are read. A rejected
    /// status has its body read and discarded up to the same limit.
    ///
    /// # Errors
    ///
    /// - `IntegrationUnreachable` if the address is forbidden or the request
    ///   cannot be sent
    /// - `IntegrationError` for any status other than 200
    /// - `IntegrationMalformedResponse` if the body is too large or not the
    ///   expected JSON
    #[instrument(skip(self, request), fields(post_id = %request.post_id, egress = ?egress))]
    pub async fn invoke(
        &self,
        url: &str,
        request: &PostActionIntegrationRequest,
        egress: Egress,
    ) -> Result<PostActionIntegrationResponse, DispatchError> {
        let unreachable = |reason: String| DispatchError::IntegrationUnreachable {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .http
            .post(egress, url)
            .await
            .map_err(|e| unreachable(e.to_string()))?
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "integration request failed");
                unreachable(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            discard_body(&mut response).await;
            error!(status = status.as_u16(), "integration returned an error status");
            return Err(DispatchError::IntegrationError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || {
            warn!(limit = MAX_RESPONSE_BYTES, "integration response too large");
            DispatchError::IntegrationMalformedResponse {
                url: url.to_string(),
                reason: format!("response exceeds {MAX_RESPONSE_BYTES} bytes"),
            }
        };

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unreachable(e.to_string()))?
        {
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let parsed: PostActionIntegrationResponse =
            serde_json::from_slice(&body).map_err(|e| DispatchError::IntegrationMalformedResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            has_update = parsed.update.is_some(),
            has_ephemeral = !parsed.ephemeral_text.is_empty(),
            "integration responded"
        );

        Ok(parsed)
    }
}

/// Read and drop an unwanted body, giving up after [`MAX_RESPONSE_BYTES`].
async fn discard_body(response: &mut Response) {
    let mut read = 0;
    while read <= MAX_RESPONSE_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len(),
            Ok(None) | Err(_) => break,
        }
    }
}
