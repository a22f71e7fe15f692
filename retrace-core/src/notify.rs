//! Completion notification
//!
//! When every domain has been replayed, downstream diffing is told which
//! service and version just finished. The bus must acknowledge the message;
//! anything else fails the run before checkpoints are cleared.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::{IdentityConfig, NotifyConfig};
use crate::error::{ReplayError, Result};
use crate::identity::RunMetadata;

/// Message announcing the end of a replay run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayCompletion {
    /// Account namespace
    pub namespace: String,
    /// Service that was replayed
    pub service: String,
    /// JSON-encoded [`RunMetadata`]
    pub metadata: String,
    /// Version under test
    pub version: String,
}

impl ReplayCompletion {
    /// Completion for `identity` at `version`
    pub fn new(identity: &IdentityConfig, version: &str) -> Result<Self> {
        Ok(Self {
            namespace: identity.namespace.clone(),
            service: identity.service.clone(),
            metadata: RunMetadata::new(version).to_json()?,
            version: version.to_string(),
        })
    }

    /// Publish request body: a single message carrying the completion as
    /// attributes
    pub fn to_publish_body(&self) -> serde_json::Value {
        serde_json::json!({
            "messages": [{ "attributes": self }]
        })
    }
}

/// Delivers the completion message
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Send `completion`; succeeds only once the receiver acknowledged it
    async fn notify(&self, completion: &ReplayCompletion) -> Result<()>;
}

/// Publishes the completion to a message bus topic over HTTP
pub struct PubSubNotifier {
    client: Client,
    url: String,
    token: Option<String>,
}

impl PubSubNotifier {
    /// Notifier posting to `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>, config: &NotifyConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(|e| {
            ReplayError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            url: url.into(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl CompletionNotifier for PubSubNotifier {
    async fn notify(&self, completion: &ReplayCompletion) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&completion.to_publish_body());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReplayError::Notification {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            service = %completion.service,
            version = %completion.version,
            "Published replay completion"
        );
        Ok(())
    }
}

/// Notifier that only logs the completion
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn notify(&self, completion: &ReplayCompletion) -> Result<()> {
        tracing::info!(
            namespace = %completion.namespace,
            service = %completion.service,
            version = %completion.version,
            metadata = %completion.metadata,
            "Replay complete"
        );
        Ok(())
    }
}

/// Notifier for `config`: publishes when a URL is set, logs otherwise
pub fn notifier_from_config(config: &NotifyConfig) -> Result<Box<dyn CompletionNotifier>> {
    match &config.url {
        Some(url) => Ok(Box::new(PubSubNotifier::new(url.clone(), config)?)),
        None => Ok(Box::new(LogNotifier)),
    }
}
