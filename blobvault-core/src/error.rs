//! Error types for BlobVault
//!
//! One error type shared by the codec, the chunking engine and the transfer
//! client. Suspension is modelled as a variant so it can travel through the
//! same `Result` plumbing, but it is a flow-control signal rather than a
//! failure and never reaches callers of the transfer facade.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for BlobVault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for BlobVault
#[derive(Error, Debug)]
pub enum VaultError {
    // ===== Transport Errors =====
    #[error("Network error: {0}")]
    Network(String),

    // ===== Service Errors =====
    #[error("Service error: status {status}{}", format_error_id(.error_id))]
    Service {
        status: u16,
        error_id: Option<String>,
        precondition: Option<String>,
    },

    #[error("Precondition failed: {precondition}")]
    PreconditionFailed {
        precondition: String,
        error_id: Option<String>,
    },

    #[error("Not found{}", format_error_id(.error_id))]
    NotFound { error_id: Option<String> },

    /// Back-pressure signal from the server; absorbed by the suspension controller
    #[error("Server requested suspension for {retry_after:?}")]
    Suspended { retry_after: Duration },

    #[error("Suspension retries exhausted after {attempts} attempts")]
    SuspensionRetriesExhausted { attempts: u32 },

    #[error("Access info lists no storage endpoint")]
    NoStorageEndpoint,

    // ===== Cryptography Errors =====
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ===== Chunk Errors =====
    #[error("Invalid blob ID: {0}")]
    InvalidBlobId(String),

    #[error("Missing chunk for blob {blob_id} at manifest position {position}")]
    MissingChunk { blob_id: String, position: usize },

    // ===== Transfer Path Errors =====
    #[error("Unsupported attachment source: {0}")]
    UnsupportedSource(String),

    #[error("Programming error: {0}")]
    Programming(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn format_error_id(error_id: &Option<String>) -> String {
    match error_id {
        Some(id) => format!(" (error id {})", id),
        None => String::new(),
    }
}

impl VaultError {
    /// Build the error for a non-success, non-suspension response.
    ///
    /// 412 responses that carry a precondition are reported separately so
    /// callers can react to the precondition value.
    pub fn from_status(status: u16, error_id: Option<String>, precondition: Option<String>) -> Self {
        match (status, precondition) {
            (412, Some(precondition)) => VaultError::PreconditionFailed {
                precondition,
                error_id,
            },
            (404, _) => VaultError::NotFound { error_id },
            (status, precondition) => VaultError::Service {
                status,
                error_id,
                precondition,
            },
        }
    }

    /// HTTP status behind a service error
    pub fn status(&self) -> Option<u16> {
        match self {
            VaultError::Service { status, .. } => Some(*status),
            VaultError::PreconditionFailed { .. } => Some(412),
            VaultError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Server error id, when the response carried one
    pub fn error_id(&self) -> Option<&str> {
        match self {
            VaultError::Service { error_id, .. }
            | VaultError::PreconditionFailed { error_id, .. }
            | VaultError::NotFound { error_id } => error_id.as_deref(),
            _ => None,
        }
    }

    /// Whether this is the back-pressure signal rather than a failure
    pub fn is_suspension(&self) -> bool {
        matches!(self, VaultError::Suspended { .. })
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
