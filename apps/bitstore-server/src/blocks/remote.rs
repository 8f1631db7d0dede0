//! Remote block storage
//!
//! Talks to a block service over its HTTP surface. Failures to reach the
//! service are reported as `BlockError::Transport` and never confused with a
//! block that is genuinely absent.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Response, StatusCode};

use crate::config::StorageConfig;
use crate::routes::blocks::BLOCKS_PATH;

use super::digest::Digest;
use super::types::{BlockError, BlockStore, PutOutcome};

/// HTTP client for a remote block service
#[derive(Clone)]
pub struct RemoteBlockStore {
    client: Client,
    base_url: String,
}

impl RemoteBlockStore {
    /// Create a client for the service at `config.url`
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self, BlockError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlockError::Storage(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = format!("{}{}", config.url.trim_end_matches('/'), BLOCKS_PATH);
        tracing::info!(url = %base_url, "Using remote block store");

        Ok(Self { client, base_url })
    }

    fn block_url(&self, digest: &Digest) -> String {
        format!("{}/{}", self.base_url, digest)
    }
}

#[async_trait]
impl BlockStore for RemoteBlockStore {
    async fn put(&self, data: Bytes) -> Result<PutOutcome, BlockError> {
        let expected = Digest::of(&data);

        let response = self
            .client
            .post(&self.base_url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, None).await);
        }

        let outcome: PutOutcome = response.json().await.map_err(|e| {
            BlockError::Storage(format!("Malformed response from block store: {}", e))
        })?;

        if outcome.digest != expected {
            return Err(BlockError::Corrupt {
                expected,
                actual: outcome.digest,
            });
        }

        tracing::debug!(digest = %outcome.digest, created = outcome.created, "Uploaded block");
        Ok(outcome)
    }

    async fn exists(&self, digest: &Digest) -> Result<bool, BlockError> {
        let response = self
            .client
            .head(self.block_url(digest))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response, Some(digest)).await),
        }
    }

    async fn get(&self, digest: &Digest) -> Result<Bytes, BlockError> {
        let response = self
            .client
            .get(self.block_url(digest))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, Some(digest)).await);
        }

        response.bytes().await.map_err(transport_error)
    }
}

fn transport_error(e: reqwest::Error) -> BlockError {
    BlockError::Transport(e.to_string())
}

async fn status_error(response: Response, digest: Option<&Digest>) -> BlockError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match (status, digest) {
        (StatusCode::NOT_FOUND, Some(digest)) => BlockError::NotFound(digest.clone()),
        (StatusCode::BAD_REQUEST, Some(digest)) => BlockError::InvalidDigest(digest.to_string()),
        _ => BlockError::Storage(format!("Block store returned {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::Router;

    use crate::blocks::MemoryBlockStore;
    use crate::routes;

    async fn spawn_block_service() -> (String, Arc<MemoryBlockStore>) {
        let store = Arc::new(MemoryBlockStore::new());
        let app: Router = Router::new().nest(BLOCKS_PATH, routes::blocks::router(store.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), store)
    }

    fn client_for(url: &str) -> RemoteBlockStore {
        let config = StorageConfig {
            url: url.to_string(),
            ..StorageConfig::default()
        };
        RemoteBlockStore::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_exists_over_http() {
        let (url, backing) = spawn_block_service().await;
        let remote = client_for(&url);

        let first = remote.put(Bytes::from_static(b"remote block")).await.unwrap();
        let second = remote.put(Bytes::from_static(b"remote block")).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.digest, Digest::of(b"remote block"));
        assert_eq!(backing.len().await, 1);

        assert!(remote.exists(&first.digest).await.unwrap());
        assert_eq!(&remote.get(&first.digest).await.unwrap()[..], b"remote block");
    }

    #[tokio::test]
    async fn test_missing_block_is_not_found() {
        let (url, _backing) = spawn_block_service().await;
        let remote = client_for(&url);
        let digest = Digest::of(b"absent");

        assert!(!remote.exists(&digest).await.unwrap());
        assert!(matches!(remote.get(&digest).await, Err(BlockError::NotFound(d)) if d == digest));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = client_for(&format!("http://{}", addr));
        let digest = Digest::of(b"anything");

        assert!(matches!(remote.get(&digest).await, Err(BlockError::Transport(_))));
        assert!(matches!(remote.exists(&digest).await, Err(BlockError::Transport(_))));
        assert!(matches!(
            remote.put(Bytes::from_static(b"anything")).await,
            Err(BlockError::Transport(_))
        ));
    }
}
