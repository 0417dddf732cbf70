//! Operator notification sink.
//!
//! A fire-and-forget text webhook (Feishu/Lark bot format). Delivery
//! uses its own short-timeout client so a slow webhook can never stall
//! the main session, and failures are the caller's to log — the loop
//! continues regardless.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Webhook/notification request timeout.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Abstraction over the notification channel, so the loop can be
/// tested with a recording double.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a plain-text message to the operator.
    async fn notify(&self, text: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Webhook implementation
// ---------------------------------------------------------------------------

/// Posts text messages to a bot webhook URL.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { http, url })
    }

    /// The bot API's text-message payload.
    fn payload(text: &str) -> serde_json::Value {
        json!({
            "msg_type": "text",
            "content": {
                "text": text,
            }
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(&Self::payload(text))
            .send()
            .await
            .context("Webhook request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Webhook delivery failed {status}: {body}");
        }

        debug!(chars = text.len(), "Notification delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
