//! Content-Addressable Block Store
//!
//! Stores opaque byte blocks under the SHA-256 of their content:
//! - `put` hashes the block and skips the write when the digest is present
//! - `exists` / `get` look blocks up by digest
//!
//! Backends: local filesystem, in-memory, and a remote HTTP client for a
//! block service running in another process.

pub mod digest;
pub mod local;
pub mod memory;
pub mod remote;
pub mod types;

pub use digest::{Digest, DIGEST_HEX_LEN};
pub use local::LocalBlockStore;
pub use memory::MemoryBlockStore;
pub use remote::RemoteBlockStore;
pub use types::*;
