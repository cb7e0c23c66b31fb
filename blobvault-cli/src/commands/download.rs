//! Download Command
//!
//! Fetches and decrypts an attachment into a local file.

use super::{session_key, spinner, transfer_context};
use crate::markers;
use anyhow::{Context, Result};
use blobvault_client::{build_transfer, AttachmentOutput, BlobVaultConfig, TransferMode};
use blobvault_core::model::{FileEntity, IdTuple};
use std::path::PathBuf;
use tokio::fs;

/// Download configuration
pub struct DownloadConfig {
    pub file_list_id: String,
    pub file_id: String,
    pub file_data_id: String,
    pub key: String,
    pub output: PathBuf,
    pub native: bool,
}

/// Run download command
pub async fn run(cfg: &BlobVaultConfig, config: DownloadConfig) -> Result<()> {
    let key = session_key(Some(&config.key))?;
    let mut settings = cfg.transfer_settings();
    if config.native {
        settings.mode = TransferMode::Native;
    }
    let transfer = build_transfer(transfer_context(cfg, settings, &key)?, None)?;

    let name = config
        .output
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    let file = FileEntity {
        id: IdTuple::new(config.file_list_id, config.file_id),
        name,
        mime_type: None,
        size: 0,
        data: Some(config.file_data_id),
    };

    let pb = spinner(format!("Downloading {} ({})", file.name, transfer.mode()))?;
    let result = transfer.download(&file).await;
    pb.finish_and_clear();

    let size = match result.context("Failed to download file")? {
        AttachmentOutput::Buffer(data_file) => {
            fs::write(&config.output, &data_file.data)
                .await
                .context("Failed to write output file")?;
            data_file.data.len() as u64
        }
        AttachmentOutput::Device(reference) => {
            let size = fs::copy(&reference.location, &config.output)
                .await
                .context("Failed to write output file")?;
            if let Err(e) = fs::remove_file(&reference.location).await {
                tracing::warn!(path = %reference.location.display(), error = %e, "Failed to remove decrypted scratch file");
            }
            size
        }
    };

    println!(
        "{} Downloaded {} bytes to {}",
        markers::done(),
        size,
        config.output.display()
    );

    Ok(())
}
