//! Local filesystem block storage
//!
//! Blocks live at `{root}/{hex[0..2]}/{hex}`. Writes go to a uniquely named
//! temporary file in the same directory and are renamed into place, so a
//! reader never sees a partially written block and two writers racing on the
//! same digest simply replace identical bytes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::StorageConfig;

use super::digest::Digest;
use super::types::{BlockError, BlockStore, PutOutcome};

/// Filesystem-backed block store
pub struct LocalBlockStore {
    root: PathBuf,
    verify_on_read: bool,
}

impl LocalBlockStore {
    /// Open (and create if needed) the storage root described by `config`
    pub async fn open(config: &StorageConfig) -> Result<Self, BlockError> {
        tokio::fs::create_dir_all(&config.root).await?;

        tracing::info!(
            root = %config.root.display(),
            verify_on_read = config.verify_on_read,
            "Opened local block store"
        );

        Ok(Self {
            root: config.root.clone(),
            verify_on_read: config.verify_on_read,
        })
    }

    /// Release the store. Every write is already durable on return from
    /// `put`, so there is nothing left to flush.
    pub async fn close(&self) {
        tracing::info!(root = %self.root.display(), "Closed local block store");
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.prefix()).join(digest.as_str())
    }
}

#[async_trait]
impl BlockStore for LocalBlockStore {
    async fn put(&self, data: Bytes) -> Result<PutOutcome, BlockError> {
        let digest = Digest::of(&data);
        let path = self.block_path(&digest);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() == data.len() as u64 => {
                tracing::debug!(digest = %digest, size = data.len(), "Block already exists, skipping write");
                return Ok(PutOutcome::existing(digest));
            }
            Ok(meta) if meta.is_file() => {
                tracing::warn!(
                    digest = %digest,
                    expected = data.len(),
                    actual = meta.len(),
                    "Rewriting truncated block"
                );
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        if let Err(e) = write_synced(&tmp_path, &data).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!(digest = %digest, size = data.len(), "Stored new block");
        Ok(PutOutcome::created(digest))
    }

    async fn exists(&self, digest: &Digest) -> Result<bool, BlockError> {
        match tokio::fs::metadata(self.block_path(digest)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, digest: &Digest) -> Result<Bytes, BlockError> {
        let data = match tokio::fs::read(self.block_path(digest)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlockError::NotFound(digest.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if self.verify_on_read {
            let actual = Digest::of(&data);
            if actual != *digest {
                tracing::error!(expected = %digest, actual = %actual, "Block corruption detected on read");
                return Err(BlockError::Corrupt {
                    expected: digest.clone(),
                    actual,
                });
            }
        }

        Ok(Bytes::from(data))
    }
}

/// Write `data` to a new file and flush it to disk before returning
async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
