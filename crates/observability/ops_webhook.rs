use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::dispatcher::{Alert, AlertSink};

const CONTENT_LIMIT: usize = 2000;
const ELLIPSIS: &str = "\n…";

/// Posts alerts as `{"content": "..."}` to a chat-style operations webhook.
pub(crate) struct OpsWebhookSink {
    url: Url,
    client: Client,
}

impl OpsWebhookSink {
    pub(crate) fn new(url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl AlertSink for OpsWebhookSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "content": render(alert) }))
            .send()
            .await
            // The URL embeds a credential; keep it out of the error text.
            .map_err(|err| anyhow::anyhow!("ops webhook unreachable (timeout: {})", err.is_timeout()))?;

        if !response.status().is_success() {
            bail!("ops webhook answered {}", response.status());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ops-webhook"
    }
}

pub(crate) fn render(alert: &Alert) -> String {
    let mut out = format!(
        "[{}] {} ({}/{}) {}\n{}",
        alert.level,
        alert.labels.service,
        alert.labels.stage,
        alert.labels.component,
        alert.at.to_rfc3339_opts(SecondsFormat::Secs, true),
        alert.target,
    );

    if !alert.span_path.is_empty() {
        out.push_str(&format!(" in {}", alert.span_path.join("/")));
    }

    let message = alert.message.trim();
    if !message.is_empty() {
        out.push_str(&format!("\n{message}"));
    }

    for (key, value) in &alert.fields {
        out.push_str(&format!("\n  {key}={value}"));
    }

    clip(out)
}

fn clip(content: String) -> String {
    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }
    let keep = CONTENT_LIMIT - ELLIPSIS.chars().count();
    let mut clipped: String = content.chars().take(keep).collect();
    clipped.push_str(ELLIPSIS);
    clipped
}
