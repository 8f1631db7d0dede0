//! In-memory metadata repository

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::files::{FileMetadata, NewFileMetadata};

use super::repository::{MetadataError, MetadataRepository};

/// Metadata repository held in process memory, keyed by id
#[derive(Default)]
pub struct MemoryFileRepository {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<i64, FileMetadata>,
    next_id: i64,
}

impl MemoryState {
    fn id_for(&self, file_name: &str) -> Option<i64> {
        self.records
            .values()
            .find(|r| r.file_name == file_name)
            .map(|r| r.id)
    }

    fn insert_new(&mut self, record: NewFileMetadata) -> FileMetadata {
        self.next_id += 1;
        let now = Utc::now().to_rfc3339();
        let file = FileMetadata {
            id: self.next_id,
            file_name: record.file_name,
            size: record.size,
            block_hashes: record.block_hashes,
            created_at: now.clone(),
            updated_at: now,
        };
        self.records.insert(file.id, file.clone());
        file
    }
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataRepository for MemoryFileRepository {
    async fn create(&self, record: NewFileMetadata) -> Result<FileMetadata, MetadataError> {
        let mut state = self.state.write().await;
        if state.id_for(&record.file_name).is_some() {
            return Err(MetadataError::Conflict(record.file_name));
        }
        Ok(state.insert_new(record))
    }

    async fn replace(&self, record: NewFileMetadata) -> Result<FileMetadata, MetadataError> {
        let mut state = self.state.write().await;
        let Some(id) = state.id_for(&record.file_name) else {
            return Ok(state.insert_new(record));
        };

        let existing = state
            .records
            .get_mut(&id)
            .ok_or_else(|| MetadataError::Invalid(format!("record {} vanished", id)))?;
        existing.size = record.size;
        existing.block_hashes = record.block_hashes;
        existing.updated_at = Utc::now().to_rfc3339();
        Ok(existing.clone())
    }

    async fn find_by_name(&self, file_name: &str) -> Result<Option<FileMetadata>, MetadataError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .find(|r| r.file_name == file_name)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FileMetadata>, MetadataError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<FileMetadata>, MetadataError> {
        Ok(self.state.read().await.records.values().cloned().collect())
    }
}
