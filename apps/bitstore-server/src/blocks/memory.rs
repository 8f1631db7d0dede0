//! In-memory block storage

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::digest::Digest;
use super::types::{BlockError, BlockStore, PutOutcome};

/// Block store held entirely in process memory
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Digest, Bytes>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blocks stored
    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }

    /// Drop a block, returning whether it was present
    pub async fn remove(&self, digest: &Digest) -> bool {
        self.blocks.write().await.remove(digest).is_some()
    }

    /// Overwrite the bytes stored under `digest` without rehashing
    #[cfg(test)]
    pub async fn insert_raw(&self, digest: Digest, data: Bytes) {
        self.blocks.write().await.insert(digest, data);
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put(&self, data: Bytes) -> Result<PutOutcome, BlockError> {
        let digest = Digest::of(&data);

        let mut blocks = self.blocks.write().await;
        if blocks.contains_key(&digest) {
            return Ok(PutOutcome::existing(digest));
        }
        blocks.insert(digest.clone(), data);

        Ok(PutOutcome::created(digest))
    }

    async fn exists(&self, digest: &Digest) -> Result<bool, BlockError> {
        Ok(self.blocks.read().await.contains_key(digest))
    }

    async fn get(&self, digest: &Digest) -> Result<Bytes, BlockError> {
        self.blocks
            .read()
            .await
            .get(digest)
            .cloned()
            .ok_or_else(|| BlockError::NotFound(digest.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dedup_keeps_single_copy() {
        let store = MemoryBlockStore::new();

        let a = store.put(Bytes::from_static(b"block")).await.unwrap();
        let b = store.put(Bytes::from_static(b"block")).await.unwrap();

        assert!(a.created);
        assert!(!b.created);
        assert_eq!(a.digest, b.digest);
        assert_eq!(store.len().await, 1);
        assert_eq!(&store.get(&a.digest).await.unwrap()[..], b"block");
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryBlockStore::new();
        let outcome = store.put(Bytes::from_static(b"gone soon")).await.unwrap();

        assert!(store.remove(&outcome.digest).await);
        assert!(!store.exists(&outcome.digest).await.unwrap());
        assert!(matches!(
            store.get(&outcome.digest).await,
            Err(BlockError::NotFound(_))
        ));
        assert!(store.is_empty().await);
    }
}
