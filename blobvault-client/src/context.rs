//! Shared transfer context

use crate::auth::{AuthProvider, SessionKeyResolver};
use crate::service::ServiceClient;
use crate::suspension::{SuspensionController, DEFAULT_MAX_SUSPENSION_RETRIES};
use crate::transfer::TransferMode;
use crate::transport::Transport;
use blobvault_core::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Runtime settings of the transfer path
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Origin of the file and trust services
    pub origin: String,
    pub max_chunk_size: usize,
    pub max_suspension_retries: u32,
    /// Fail downloads with a missing chunk instead of leaving a gap
    pub strict_reassembly: bool,
    pub mode: TransferMode,
    pub request_timeout: Duration,
    /// Scratch directory for encrypted files of the native path
    pub temp_dir: PathBuf,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            origin: "http://localhost:9000".to_string(),
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            max_suspension_retries: DEFAULT_MAX_SUSPENSION_RETRIES,
            strict_reassembly: false,
            mode: TransferMode::default(),
            request_timeout: Duration::from_secs(300),
            temp_dir: std::env::temp_dir().join("blobvault"),
        }
    }
}

/// Everything a transfer needs, cloned into each transfer task
#[derive(Clone)]
pub struct TransferContext {
    pub services: ServiceClient,
    pub keys: Arc<dyn SessionKeyResolver>,
    pub suspension: SuspensionController,
    pub settings: TransferSettings,
}

impl TransferContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        keys: Arc<dyn SessionKeyResolver>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            services: ServiceClient::new(transport, auth),
            keys,
            suspension: SuspensionController::new(settings.max_suspension_retries),
            settings,
        }
    }

    /// Share an existing controller instead of the context's own
    pub fn with_suspension(mut self, suspension: SuspensionController) -> Self {
        self.suspension = suspension;
        self
    }
}
