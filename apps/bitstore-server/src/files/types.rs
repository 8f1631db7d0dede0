//! File orchestration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blocks::{BlockError, Digest};
use crate::db::MetadataError;

/// Longest accepted file name, in bytes
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Names shadowed by the fixed `/upload` and `/download/:id` file routes
pub const RESERVED_FILE_NAMES: [&str; 2] = ["upload", "download"];

// ============================================================================
// Metadata Records
// ============================================================================

/// Persisted description of one logical file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Repository-assigned identifier
    pub id: i64,

    /// Unique lookup key
    pub file_name: String,

    /// Total bytes uploaded
    pub size: u64,

    /// Block digests in reassembly order
    pub block_hashes: Vec<Digest>,

    pub created_at: String,
    pub updated_at: String,
}

/// A record about to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileMetadata {
    pub file_name: String,
    pub size: u64,
    pub block_hashes: Vec<Digest>,
}

/// Result of a completed upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file: FileMetadata,

    /// Chunks that caused a physical write
    pub new_blocks: usize,

    /// Chunks whose digest was already stored
    pub reused_blocks: usize,
}

// ============================================================================
// Error Types
// ============================================================================

/// File upload/download error types
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Block missing during reassembly: {0}")]
    BlockMissing(Digest),

    #[error("Reassembled {actual} bytes but the record says {expected}")]
    ReassemblyLengthMismatch { expected: u64, actual: u64 },

    #[error("Invalid digest: {0:?}")]
    InvalidDigest(String),

    #[error("Corrupt block: expected {expected}, got {actual}")]
    CorruptBlock { expected: Digest, actual: Digest },

    #[error("Block store unreachable: {0}")]
    Transport(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FileError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::InvalidFileName(_) | Self::InvalidDigest(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::BlockMissing(_)
            | Self::ReassemblyLengthMismatch { .. }
            | Self::CorruptBlock { .. }
            | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "file_not_found",
            Self::AlreadyExists(_) => "file_already_exists",
            Self::InvalidFileName(_) => "invalid_file_name",
            Self::BlockMissing(_) => "block_missing",
            Self::ReassemblyLengthMismatch { .. } => "reassembly_length_mismatch",
            Self::InvalidDigest(_) => "invalid_digest",
            Self::CorruptBlock { .. } => "corrupt_block",
            Self::Transport(_) => "transport_failure",
            Self::Timeout(_) => "timeout",
            Self::Storage(_) => "storage_io_failure",
        }
    }
}

impl From<BlockError> for FileError {
    fn from(e: BlockError) -> Self {
        match e {
            // A referenced block that cannot be found is a storage inconsistency
            BlockError::NotFound(digest) => Self::BlockMissing(digest),
            BlockError::InvalidDigest(value) => Self::InvalidDigest(value),
            BlockError::Corrupt { expected, actual } => Self::CorruptBlock { expected, actual },
            BlockError::Transport(msg) => Self::Transport(msg),
            BlockError::Storage(msg) => Self::Storage(msg),
            BlockError::Io(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<MetadataError> for FileError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::Conflict(name) => Self::AlreadyExists(name),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Reject names that cannot serve as a lookup key or download file name
pub fn validate_file_name(name: &str) -> Result<(), FileError> {
    let invalid = name.trim().is_empty()
        || name.len() > MAX_FILE_NAME_LEN
        || RESERVED_FILE_NAMES.contains(&name)
        || name.chars().any(|c| matches!(c, '/' | '\\' | '\0' | '"') || c.is_control());

    if invalid {
        return Err(FileError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("a.txt").is_ok());
        assert!(validate_file_name("report 2024 (final).pdf").is_ok());

        for bad in ["", "   ", "dir/a.txt", "..\\a", "a\"b", "tab\there"] {
            assert!(
                matches!(validate_file_name(bad), Err(FileError::InvalidFileName(_))),
                "accepted {bad:?}"
            );
        }
        assert!(validate_file_name(&"x".repeat(MAX_FILE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_route_names_are_reserved() {
        for reserved in RESERVED_FILE_NAMES {
            assert!(matches!(
                validate_file_name(reserved),
                Err(FileError::InvalidFileName(name)) if name == reserved
            ));
        }
        assert!(validate_file_name("upload.txt").is_ok());
        assert!(validate_file_name("downloads").is_ok());
    }

    #[test]
    fn test_block_not_found_becomes_block_missing() {
        let digest = Digest::of(b"gone");
        let err = FileError::from(BlockError::NotFound(digest.clone()));
        assert!(matches!(err, FileError::BlockMissing(d) if d == digest));
    }

    #[test]
    fn test_transport_is_kept_distinct() {
        let err = FileError::from(BlockError::Transport("connection refused".into()));
        assert!(matches!(err, FileError::Transport(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_metadata_conflict_maps_to_already_exists() {
        let err = FileError::from(MetadataError::Conflict("a.txt".into()));
        assert!(matches!(err, FileError::AlreadyExists(name) if name == "a.txt"));
    }
}
