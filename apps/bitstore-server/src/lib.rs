//! Bitstore Server Library
//!
//! Content-addressable file storage. Files are split into fixed-size chunks,
//! each chunk is stored once under its SHA-256 digest, and a metadata record
//! keeps the ordered digest list needed to reassemble the file.
//!
//! # Modules
//!
//! - `blocks`: Block store contract with local, remote and in-memory backends
//! - `files`: Chunking and the upload/download orchestrator
//! - `db`: File metadata persistence (SQLite and in-memory)
//! - `routes`: HTTP surfaces for blocks, files and health

pub mod blocks;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod routes;
pub mod state;
