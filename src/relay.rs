use serde_json::Value;
use tracing::{debug, warn};

use crate::metrics::RELAYED_EVENTS;

// Downstream plugin hosts that get every event pokepro does not consume
pub struct Relay {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl Relay {
    // Comma-separated urls, empty means relaying is off
    pub fn new(client: reqwest::Client, urls_str: &str) -> Self {
        let urls = urls_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                if url.starts_with("http") {
                    url.to_string()
                } else {
                    format!("http://{}", url)
                }
            })
            .collect();
        Self { client, urls }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    // Failures are logged per host and never retried
    pub async fn forward(&self, event: &Value) {
        // some implementations report ids as strings
        let self_id = match event.get("self_id") {
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::String(id)) => id.clone(),
            _ => String::new(),
        };

        for url in &self.urls {
            let result = self
                .client
                .post(url)
                .header("X-Self-ID", self_id.as_str())
                .json(event)
                .send()
                .await
                .and_then(|res| res.error_for_status());

            match result {
                Ok(_) => {
                    RELAYED_EVENTS.inc();
                    debug!("Relayed event to {}", url);
                }
                Err(e) => warn!("Relay to {} failed: {}", url, e),
            }
        }
    }
}
