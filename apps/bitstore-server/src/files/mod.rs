//! File Orchestration
//!
//! Splits uploaded files into fixed-size chunks, stores each chunk in the
//! block store (deduplicated by digest) and records the ordered digest list
//! in the metadata repository. Downloads reverse the process.

pub mod chunker;
pub mod orchestrator;
pub mod types;

pub use chunker::{Chunk, Chunker};
pub use orchestrator::{FileOrchestrator, OrchestratorOptions};
pub use types::*;
