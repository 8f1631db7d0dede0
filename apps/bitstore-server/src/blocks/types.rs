//! Block store types

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::digest::Digest;

// ============================================================================
// Store Trait
// ============================================================================

/// Content-addressable storage of opaque byte blocks
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store `data` under its digest. Writing a digest that is already
    /// present is skipped and reported with `created = false`.
    async fn put(&self, data: Bytes) -> Result<PutOutcome, BlockError>;

    /// Whether a block with this digest is stored
    async fn exists(&self, digest: &Digest) -> Result<bool, BlockError>;

    /// Fetch the bytes stored under `digest`
    async fn get(&self, digest: &Digest) -> Result<Bytes, BlockError>;
}

// ============================================================================
// Put Outcome
// ============================================================================

/// Result of a `put`: the canonical digest and whether this call wrote it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOutcome {
    pub digest: Digest,
    pub created: bool,
}

impl PutOutcome {
    pub fn created(digest: Digest) -> Self {
        Self { digest, created: true }
    }

    pub fn existing(digest: Digest) -> Self {
        Self { digest, created: false }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Block store error types
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("Invalid digest: {0:?}")]
    InvalidDigest(String),

    #[error("Block not found: {0}")]
    NotFound(Digest),

    #[error("Corrupt block: expected {expected}, got {actual}")]
    Corrupt { expected: Digest, actual: Digest },

    #[error("Block store unreachable: {0}")]
    Transport(String),

    #[error("Block storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlockError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidDigest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Corrupt { .. } | Self::Storage(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDigest(_) => "invalid_digest",
            Self::NotFound(_) => "block_not_found",
            Self::Corrupt { .. } => "corrupt_block",
            Self::Transport(_) => "transport_failure",
            Self::Storage(_) | Self::Io(_) => "storage_io_failure",
        }
    }
}
