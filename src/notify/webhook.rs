use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;

use super::{render_digest_lines, Digest, Notifier};

const WEBHOOK_ITEM_CAP: usize = 50;

/// Incoming-webhook channel (Teams/Slack-style JSON card).
pub struct WebhookNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// `None` when NOTIFY_WEBHOOK_URL is unset: the channel is disabled,
    /// not an error.
    pub fn from_env() -> Option<Self> {
        match std::env::var("NOTIFY_WEBHOOK_URL") {
            Ok(url) if !url.trim().is_empty() => Some(Self::new(url)),
            _ => {
                tracing::debug!("webhook channel disabled (no NOTIFY_WEBHOOK_URL)");
                None
            }
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let title = format!(
            "News Tracker — Fresh (last {}h)",
            digest.window_hours
        );
        let lines = render_digest_lines(digest, WEBHOOK_ITEM_CAP);
        let text = format!("{} fresh item(s)\n\n{}", digest.items.len(), lines.join("\n"));
        let payload = serde_json::json!({ "title": title, "text": text });

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook_url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("webhook request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
