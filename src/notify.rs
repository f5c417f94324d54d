//! Bark push delivery.
//!
//! The gatekeeper decides whether a notification may go out; this module
//! delivers it. A [`BarkTarget`] is one owner's device on one Bark server,
//! and [`BarkNotifier`] posts a [`BarkMessage`] to it.

use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Public Bark server used when a deployment does not run its own.
pub const DEFAULT_BARK_BASE_URL: &str = "https://api.day.app";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TITLE: &str = "Notification";
/// Characters of a failed response body kept in the error.
const ERROR_BODY_LIMIT: usize = 200;

/// Errors raised while delivering a push notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Base URL or device token is empty
    #[error("Missing Bark base URL or device token")]
    MissingTarget,

    /// Transport failure, including timeouts
    #[error("Bark request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with something other than 200
    #[error("Bark returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Where a Bark push is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarkTarget {
    base_url: String,
    token: String,
}

impl BarkTarget {
    /// Create a target, normalizing the base URL.
    ///
    /// Surrounding whitespace and trailing slashes are removed from
    /// `base_url`. An empty base URL or token is rejected.
    pub fn new(base_url: &str, token: &str) -> Result<Self, NotifyError> {
        let base_url = base_url.trim().trim_end_matches('/');
        let token = token.trim();
        if base_url.is_empty() || token.is_empty() {
            return Err(NotifyError::MissingTarget);
        }
        Ok(Self {
            base_url: base_url.to_string(),
            token: token.to_string(),
        })
    }

    /// URL the message is posted to.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// A push notification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarkMessage {
    pub title: String,
    pub body: String,
    /// Link opened when the notification is tapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BarkMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            title: if title.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title
            },
            body: body.into(),
            url: None,
        }
    }

    /// Attach a jump link. Empty links are ignored.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.url = (!url.is_empty()).then_some(url);
        self
    }
}

/// Sends Bark push notifications over HTTP.
#[derive(Debug, Clone)]
pub struct BarkNotifier {
    client: reqwest::Client,
}

impl BarkNotifier {
    /// Create a notifier whose requests time out after five seconds.
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Create a notifier over an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Deliver `message` to `target`.
    pub async fn send(&self, target: &BarkTarget, message: &BarkMessage) -> Result<(), NotifyError> {
        debug!(base_url = %target.base_url(), "Sending Bark notification");

        let response = self
            .client
            .post(target.endpoint())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            warn!(status = status.as_u16(), "Bark delivery rejected");
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
