//! Metadata repository contract

use async_trait::async_trait;

use crate::files::{FileMetadata, NewFileMetadata};

/// Durable mapping from file name to its block digests
///
/// Every write is a single atomic step: readers observe either the previous
/// record or the new one, never a mix.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Insert a record; fails with `Conflict` if the name is taken
    async fn create(&self, record: NewFileMetadata) -> Result<FileMetadata, MetadataError>;

    /// Insert or replace the record for this name, keeping its id
    async fn replace(&self, record: NewFileMetadata) -> Result<FileMetadata, MetadataError>;

    async fn find_by_name(&self, file_name: &str) -> Result<Option<FileMetadata>, MetadataError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<FileMetadata>, MetadataError>;

    /// All records ordered by id
    async fn list(&self) -> Result<Vec<FileMetadata>, MetadataError>;
}

/// Metadata repository error types
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("File name already taken: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt metadata record {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("Invalid metadata record: {0}")]
    Invalid(String),
}
