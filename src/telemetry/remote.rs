//! # Remote Store
//!
//! Keyed write primitive used to upload drained records.
//!
//! Writes are idempotent: the same key overwrites the same entry, so sending
//! a record twice is harmless.

use async_trait::async_trait;
use tracing::debug;

use super::record::RecordPayload;
use crate::config::RemoteConfig;
use crate::error::{GreenhouseError, Result};

/// Keyed write into the remote store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Write `payload` under `key`
    ///
    /// # Returns
    ///
    /// * `Ok(status)` - The store answered with this status code
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Network` when no status code was obtained
    async fn put(&self, key: &str, payload: &RecordPayload) -> Result<u16>;
}

/// REST remote store (`PUT <host>/<collection>/<key>.json`)
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    host: String,
    collection: String,
    auth_secret: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: config.host.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            auth_secret: Some(config.auth_secret.clone()).filter(|s| !s.is_empty()),
        }
    }

    /// URL for a record key
    pub fn entry_url(&self, key: &str) -> String {
        match &self.auth_secret {
            Some(secret) => format!("{}/{}/{}.json?auth={}", self.host, self.collection, key, secret),
            None => format!("{}/{}/{}.json", self.host, self.collection, key),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn put(&self, key: &str, payload: &RecordPayload) -> Result<u16> {
        let response = self
            .client
            .put(self.entry_url(key))
            .json(payload)
            .send()
            .await
            .map_err(|e| GreenhouseError::Network(format!("PUT {} failed: {}", key, e)))?;

        let status = response.status().as_u16();
        debug!(key, status, "Remote store response");
        Ok(status)
    }
}
