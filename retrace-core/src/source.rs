//! Trace document retrieval
//!
//! Captured documents live in an object store under a per-service prefix.
//! The newest object (lexicographically last name) is replayed. A local
//! cache keeps the fetched document so an interrupted run resumes against
//! the same input.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::error::{ReplayError, Result};
use crate::span::TraceDocument;

/// Produces the raw text of the newest trace document under a prefix
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Fetch the newest document stored under `prefix`
    async fn fetch_latest(&self, prefix: &str) -> Result<String>;
}

/// Object-store JSON API client
pub struct ObjectStoreSource {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectListing {
    #[serde(default)]
    items: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

impl ObjectStoreSource {
    /// Build a client from source configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(|e| {
            ReplayError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
        })
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token)
        } else {
            request
        }
    }

    async fn latest_object(&self, prefix: &str) -> Result<String> {
        let url = format!(
            "{}/storage/v1/b/{}/o?prefix={}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(prefix)
        );

        let response = self.add_auth(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReplayError::Source(format!(
                "Listing {} failed ({}): {}",
                prefix, status, text
            )));
        }

        let listing: ObjectListing = response.json().await?;
        listing
            .items
            .into_iter()
            .map(|entry| entry.name)
            .max()
            .ok_or_else(|| ReplayError::Source(format!("No trace documents under {}", prefix)))
    }
}

#[async_trait]
impl TraceSource for ObjectStoreSource {
    async fn fetch_latest(&self, prefix: &str) -> Result<String> {
        let name = self.latest_object(prefix).await?;
        tracing::info!(object = %name, bucket = %self.bucket, "Downloading trace document");

        let url = format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(&name)
        );

        let response = self.add_auth(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReplayError::Source(format!(
                "Download of {} failed ({}): {}",
                name, status, text
            )));
        }

        Ok(response.text().await?)
    }
}

/// Loads the trace document, preferring the local cache when resuming
pub struct TraceDocumentLoader {
    source: Arc<dyn TraceSource>,
    prefix: String,
    cache_path: PathBuf,
}

impl TraceDocumentLoader {
    /// Loader reading `prefix` from `source`, caching at `cache_path`
    pub fn new(
        source: Arc<dyn TraceSource>,
        prefix: impl Into<String>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            prefix: prefix.into(),
            cache_path: cache_path.into(),
        }
    }

    /// Cache file location
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Load the document.
    ///
    /// When `resuming` and the cache is readable the cached copy is used, so
    /// checkpoint indices keep pointing at the same traces. Otherwise the
    /// newest document is fetched and written to the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails, the cache cannot be written, or
    /// the document is not valid JSON.
    pub async fn load(&self, resuming: bool) -> Result<TraceDocument> {
        if resuming {
            match tokio::fs::read_to_string(&self.cache_path).await {
                Ok(text) => {
                    tracing::info!(
                        cache = %self.cache_path.display(),
                        "Resuming from cached trace document"
                    );
                    return TraceDocument::from_json(&text);
                }
                Err(e) => {
                    tracing::warn!(
                        cache = %self.cache_path.display(),
                        error = %e,
                        "Checkpoint present but cache unreadable, fetching fresh document"
                    );
                }
            }
        }

        let text = self.source.fetch_latest(&self.prefix).await?;
        let document = TraceDocument::from_json(&text)?;

        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.cache_path, &text).await?;
        tracing::debug!(
            cache = %self.cache_path.display(),
            traces = document.len(),
            "Cached trace document"
        );

        Ok(document)
    }

    /// Remove the cached document; a missing cache is not an error
    pub async fn clear_cache(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.cache_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
