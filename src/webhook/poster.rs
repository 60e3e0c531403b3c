use super::payload::{EmbedOptions, WebhookPayload};
use crate::feed::FeedEntry;
use crate::render::RenderResult;
use crate::util::truncate_chars;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Response body excerpt kept for the failure log.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// What happened to one post. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Delivered,
    /// The endpoint answered with a non-2xx status.
    Rejected { status: u16 },
    /// No usable response: connection error, timeout, bad request body.
    Failed { reason: String },
}

impl PostOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PostOutcome::Delivered)
    }
}

/// Posts rendered diffs to a chat webhook.
pub struct WebhookPoster {
    client: reqwest::Client,
    url: SecretString,
    timeout: Duration,
    options: EmbedOptions,
}

impl WebhookPoster {
    pub fn new(
        client: reqwest::Client,
        url: SecretString,
        timeout: Duration,
        options: EmbedOptions,
    ) -> Self {
        Self {
            client,
            url,
            timeout,
            options,
        }
    }

    /// Sends one message for `entry` with `render` attached.
    ///
    /// One attempt only. Anything but a 2xx answer is logged at `warn`
    /// with the entry title, link and status.
    pub async fn post(&self, entry: &FeedEntry, render: &RenderResult) -> PostOutcome {
        let payload = WebhookPayload::for_entry(entry, render.complete, &self.options);
        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(e) => return self.failed(entry, format!("Cannot encode payload: {e}")),
        };

        let file = match Part::bytes(render.png.clone())
            .file_name(self.options.attachment_name.clone())
            .mime_str("image/png")
        {
            Ok(part) => part,
            Err(e) => return self.failed(entry, e.without_url().to_string()),
        };
        let form = Form::new().text("payload_json", json).part("file", file);

        let request = self
            .client
            .post(self.url.expose_secret())
            .multipart(form)
            .send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => return self.failed(entry, "Request timed out".to_string()),
            // The URL holds the webhook token
            Ok(Err(e)) => return self.failed(entry, e.without_url().to_string()),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(title = %entry.title, status = status.as_u16(), "Entry posted");
            return PostOutcome::Delivered;
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
        tracing::warn!(
            title = %entry.title,
            link = %entry.link,
            status = status.as_u16(),
            body = %truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
            "Failed to post entry"
        );
        PostOutcome::Rejected {
            status: status.as_u16(),
        }
    }

    fn failed(&self, entry: &FeedEntry, reason: String) -> PostOutcome {
        tracing::warn!(
            title = %entry.title,
            link = %entry.link,
            error = %reason,
            "Failed to post entry"
        );
        PostOutcome::Failed { reason }
    }
}

impl std::fmt::Debug for WebhookPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookPoster")
            .field("url", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("options", &self.options)
            .finish()
    }
}
