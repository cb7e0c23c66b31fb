//! Unified transfer interface
//!
//! In-memory and native transfers share one trait. Which implementation a
//! client gets is decided by [`TransferMode`] in the configuration.

use crate::context::TransferContext;
use crate::facade::AttachmentFacade;
use crate::native::{LocalFileApp, NativeFileApp, NativeTransfer};
use async_trait::async_trait;
use blobvault_core::crypto::SessionKey;
use blobvault_core::error::{Result, VaultError};
use blobvault_core::model::{DataFile, FileEntity, FileReference, Id};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    /// Payloads held in memory, chunked blob storage
    #[default]
    InMemory,
    /// Device files handed to a native helper
    Native,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::InMemory => write!(f, "in-memory"),
            TransferMode::Native => write!(f, "native"),
        }
    }
}

impl FromStr for TransferMode {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" | "memory" => Ok(TransferMode::InMemory),
            "native" => Ok(TransferMode::Native),
            other => Err(VaultError::Configuration(format!(
                "unknown transfer mode: {}",
                other
            ))),
        }
    }
}

/// What to upload
#[derive(Debug, Clone)]
pub enum AttachmentSource {
    Buffer(DataFile),
    Device(FileReference),
}

/// Where a download ended up
#[derive(Debug, Clone)]
pub enum AttachmentOutput {
    Buffer(DataFile),
    Device(FileReference),
}

#[async_trait]
pub trait AttachmentTransfer: Send + Sync {
    fn mode(&self) -> TransferMode;

    /// Encrypt and store an attachment, returning its file data id
    async fn upload(&self, source: AttachmentSource, key: &SessionKey) -> Result<Id>;

    async fn download(&self, file: &FileEntity) -> Result<AttachmentOutput>;
}

pub struct InMemoryTransfer {
    facade: AttachmentFacade,
}

impl InMemoryTransfer {
    pub fn new(ctx: TransferContext) -> Self {
        Self {
            facade: AttachmentFacade::new(ctx),
        }
    }

    pub fn facade(&self) -> &AttachmentFacade {
        &self.facade
    }
}

#[async_trait]
impl AttachmentTransfer for InMemoryTransfer {
    fn mode(&self) -> TransferMode {
        TransferMode::InMemory
    }

    async fn upload(&self, source: AttachmentSource, key: &SessionKey) -> Result<Id> {
        let data_file = match source {
            AttachmentSource::Buffer(data_file) => data_file,
            AttachmentSource::Device(reference) => {
                let data = tokio::fs::read(&reference.location).await?;
                DataFile::new(reference.name, reference.mime_type, data)
            }
        };
        self.facade.upload_file_blob_data(&data_file, key).await
    }

    async fn download(&self, file: &FileEntity) -> Result<AttachmentOutput> {
        self.facade
            .download_file_content(file)
            .await
            .map(AttachmentOutput::Buffer)
    }
}

#[async_trait]
impl AttachmentTransfer for NativeTransfer {
    fn mode(&self) -> TransferMode {
        TransferMode::Native
    }

    async fn upload(&self, source: AttachmentSource, key: &SessionKey) -> Result<Id> {
        match source {
            AttachmentSource::Device(reference) => self.upload_file_data_native(&reference, key).await,
            AttachmentSource::Buffer(data_file) => Err(VaultError::UnsupportedSource(format!(
                "native transfers need a device file, got buffer {}",
                data_file.name
            ))),
        }
    }

    async fn download(&self, file: &FileEntity) -> Result<AttachmentOutput> {
        self.download_file_content_native(file)
            .await
            .map(AttachmentOutput::Device)
    }
}

/// Build the transfer selected by the context's settings
///
/// Native mode uses `file_app` when given, otherwise a [`LocalFileApp`]
/// writing to the configured scratch directory.
pub fn build_transfer(
    ctx: TransferContext,
    file_app: Option<Arc<dyn NativeFileApp>>,
) -> Result<Box<dyn AttachmentTransfer>> {
    match ctx.settings.mode {
        TransferMode::InMemory => Ok(Box::new(InMemoryTransfer::new(ctx))),
        TransferMode::Native => {
            let file_app = match file_app {
                Some(file_app) => file_app,
                None => Arc::new(LocalFileApp::new(
                    ctx.settings.temp_dir.clone(),
                    ctx.settings.request_timeout,
                )?),
            };
            Ok(Box::new(NativeTransfer::new(ctx, file_app)))
        }
    }
}
