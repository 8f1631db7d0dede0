//! File Orchestrator
//!
//! Turns whole files into blocks and back:
//! - upload: chunk, `put` every chunk, then persist the metadata record
//! - download: look up the record, `get` every digest in order, concatenate
//!
//! Chunk requests for one file are dispatched concurrently (bounded), but the
//! digest sequence is always collected in chunk order. The metadata record is
//! written only after every chunk has been stored, so a failed or timed-out
//! upload never leaves a record pointing at a partial file.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::blocks::{BlockStore, PutOutcome};
use crate::config::{Config, DuplicatePolicy, DEFAULT_CHUNK_SIZE};
use crate::db::MetadataRepository;

use super::chunker::Chunker;
use super::types::{validate_file_name, FileError, FileMetadata, NewFileMetadata, UploadReceipt};

/// Tunables for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub chunk_size: usize,
    pub concurrency: usize,
    pub operation_timeout: Duration,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 4,
            operation_timeout: Duration::from_secs(30),
            duplicate_policy: DuplicatePolicy::Replace,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            concurrency: config.chunking.concurrency,
            operation_timeout: config.limits.operation_timeout,
            duplicate_policy: config.chunking.duplicate_policy,
        }
    }
}

/// Coordinates the block store and the metadata repository
#[derive(Clone)]
pub struct FileOrchestrator {
    inner: Arc<FileOrchestratorInner>,
}

struct FileOrchestratorInner {
    blocks: Arc<dyn BlockStore>,
    metadata: Arc<dyn MetadataRepository>,
    chunker: Chunker,
    concurrency: usize,
    operation_timeout: Duration,
    duplicate_policy: DuplicatePolicy,
}

impl FileOrchestrator {
    pub fn new(
        blocks: Arc<dyn BlockStore>,
        metadata: Arc<dyn MetadataRepository>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(FileOrchestratorInner {
                blocks,
                metadata,
                chunker: Chunker::new(options.chunk_size),
                concurrency: options.concurrency.max(1),
                operation_timeout: options.operation_timeout,
                duplicate_policy: options.duplicate_policy,
            }),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.chunker.chunk_size()
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.inner.duplicate_policy
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Store `data` under `file_name`
    pub async fn upload(&self, file_name: &str, data: Bytes) -> Result<UploadReceipt, FileError> {
        validate_file_name(file_name)?;

        if self.inner.duplicate_policy == DuplicatePolicy::Reject
            && self.bounded(self.inner.metadata.find_by_name(file_name)).await?.is_some()
        {
            return Err(FileError::AlreadyExists(file_name.to_string()));
        }

        let chunks = self.inner.chunker.split(&data);
        let chunk_count = chunks.len();

        let outcomes: Vec<PutOutcome> = stream::iter(chunks)
            .map(|chunk| self.bounded(self.inner.blocks.put(chunk.data)))
            .buffered(self.inner.concurrency)
            .try_collect()
            .await
            .map_err(|e| {
                tracing::warn!(
                    file_name = %file_name,
                    chunks = chunk_count,
                    error = %e,
                    "Upload aborted before metadata was written"
                );
                e
            })?;

        let new_blocks = outcomes.iter().filter(|o| o.created).count();
        let record = NewFileMetadata {
            file_name: file_name.to_string(),
            size: data.len() as u64,
            block_hashes: outcomes.into_iter().map(|o| o.digest).collect(),
        };

        let file = match self.inner.duplicate_policy {
            DuplicatePolicy::Replace => self.bounded(self.inner.metadata.replace(record)).await?,
            DuplicatePolicy::Reject => self.bounded(self.inner.metadata.create(record)).await?,
        };

        tracing::info!(
            file_id = file.id,
            file_name = %file.file_name,
            size = file.size,
            chunks = chunk_count,
            new_blocks = new_blocks,
            reused_blocks = chunk_count - new_blocks,
            "File uploaded"
        );

        Ok(UploadReceipt {
            file,
            new_blocks,
            reused_blocks: chunk_count - new_blocks,
        })
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Reassemble the file stored under `file_name`
    pub async fn download(&self, file_name: &str) -> Result<Bytes, FileError> {
        let file = self.metadata(file_name).await?;
        self.reassemble(&file).await
    }

    /// Reassemble a file by its record id, returning the record alongside
    pub async fn download_by_id(&self, id: i64) -> Result<(FileMetadata, Bytes), FileError> {
        let file = self
            .bounded(self.inner.metadata.find_by_id(id))
            .await?
            .ok_or_else(|| FileError::NotFound(format!("id {}", id)))?;
        let data = self.reassemble(&file).await?;
        Ok((file, data))
    }

    /// Look up the metadata record for `file_name`
    pub async fn metadata(&self, file_name: &str) -> Result<FileMetadata, FileError> {
        self.bounded(self.inner.metadata.find_by_name(file_name))
            .await?
            .ok_or_else(|| FileError::NotFound(file_name.to_string()))
    }

    /// All metadata records, oldest first
    pub async fn list(&self) -> Result<Vec<FileMetadata>, FileError> {
        self.bounded(self.inner.metadata.list()).await
    }

    async fn reassemble(&self, file: &FileMetadata) -> Result<Bytes, FileError> {
        let blocks: Vec<Bytes> = stream::iter(file.block_hashes.clone())
            .map(|digest| {
                let store = self.inner.blocks.clone();
                self.bounded(async move { store.get(&digest).await })
            })
            .buffered(self.inner.concurrency)
            .try_collect()
            .await
            .map_err(|e| {
                tracing::error!(file_name = %file.file_name, error = %e, "Reassembly failed");
                e
            })?;

        let total: usize = blocks.iter().map(Bytes::len).sum();
        if total as u64 != file.size {
            tracing::error!(
                file_name = %file.file_name,
                expected = file.size,
                actual = total,
                "Reassembled length does not match record"
            );
            return Err(FileError::ReassemblyLengthMismatch {
                expected: file.size,
                actual: total as u64,
            });
        }

        let mut buf = BytesMut::with_capacity(total);
        for block in &blocks {
            buf.extend_from_slice(block);
        }

        tracing::debug!(
            file_name = %file.file_name,
            size = total,
            blocks = blocks.len(),
            "File reassembled"
        );

        Ok(buf.freeze())
    }

    /// Run a storage call under the operation timeout
    async fn bounded<T, E, F>(&self, fut: F) -> Result<T, FileError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<FileError>,
    {
        match tokio::time::timeout(self.inner.operation_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(FileError::Timeout(self.inner.operation_timeout)),
        }
    }
}
