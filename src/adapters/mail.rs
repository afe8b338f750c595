use crate::domain::model::NotificationDraft;
use crate::domain::ports::{NotificationSink, Storage};
use crate::utils::error::{FormError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

/// POSTs each draft as JSON to a mail relay / webhook endpoint.
pub struct HttpRelaySink {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
    timeout: Duration,
}

impl HttpRelaySink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            timeout,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

#[async_trait]
impl NotificationSink for HttpRelaySink {
    async fn send(&self, draft: &NotificationDraft) -> Result<()> {
        tracing::debug!("📨 Relaying notification to: {}", self.endpoint);

        let mut request = self.client.post(&self.endpoint).json(draft);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.timeout(self.timeout).send().await?;
        tracing::debug!("📨 Relay response status: {}", response.status());

        if !response.status().is_success() {
            return Err(FormError::NotificationError {
                message: format!("relay returned {}", response.status()),
            });
        }

        Ok(())
    }
}

/// 把通知草稿寫成 JSON 檔，交給外部寄信程序處理
pub struct OutboxSink<S: Storage> {
    storage: S,
}

impl<S: Storage> OutboxSink<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn file_name(draft: &NotificationDraft) -> String {
        let mut hasher = Sha256::new();
        hasher.update(draft.subject.as_bytes());
        hasher.update(draft.html_body.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!(
            "outbox/{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            &digest[..12]
        )
    }
}

#[async_trait]
impl<S: Storage> NotificationSink for OutboxSink<S> {
    async fn send(&self, draft: &NotificationDraft) -> Result<()> {
        let path = Self::file_name(draft);
        let data = serde_json::to_vec_pretty(draft)?;
        self.storage.write_file(&path, &data).await?;
        tracing::debug!("📥 Notification queued in {}", path);
        Ok(())
    }
}
