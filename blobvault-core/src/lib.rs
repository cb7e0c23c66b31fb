//! BlobVault Core Library
//!
//! Building blocks for client-side encrypted attachment transfers.
//! This crate provides:
//! - AES-128-CBC payload encryption with per-file session keys
//! - Ciphertext chunking and manifest-ordered reassembly
//! - Content-derived blob identifiers (truncated SHA-256)
//! - Wire model shared with the storage and trust services
//! - Common error handling

pub mod chunk;
pub mod crypto;
pub mod error;
pub mod model;

pub use chunk::{reassemble, reassemble_strict, split, BlobId, Chunk};
pub use crypto::{decrypt, encrypt, encrypt_with_iv, ContentHash, SessionKey};
pub use error::{Result, VaultError};
pub use model::{
    AccessInfo, AccessScope, BlobReferenceToken, DataFile, FileData, FileEntity, FileReference,
    StorageScheme, TargetServer, TypeDescriptor,
};

/// Number of hash bytes kept in a [`BlobId`]
pub const BLOB_ID_LENGTH: usize = 6;

/// Chunk size constants
pub const MIN_CHUNK_SIZE: usize = 1; // any positive bound is valid
pub const MAX_BLOB_SIZE_BYTES: usize = 10 * 1024 * 1024; // 10 MB, server-side limit
pub const DEFAULT_CHUNK_SIZE: usize = MAX_BLOB_SIZE_BYTES;

/// Read the maximum chunk size from the environment, falling back to the
/// server limit. Values above the limit are clamped.
pub fn max_chunk_size_from_env() -> usize {
    std::env::var("BLOBVAULT_MAX_CHUNK_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|size| *size >= MIN_CHUNK_SIZE)
        .map(|size| size.min(MAX_BLOB_SIZE_BYTES))
        .unwrap_or(DEFAULT_CHUNK_SIZE)
}
