//! Upload Command
//!
//! Encrypts a local file and stores it as an attachment.

use super::{session_key, spinner, transfer_context};
use crate::markers;
use anyhow::{Context, Result};
use blobvault_client::{build_transfer, AttachmentSource, BlobVaultConfig, TransferMode};
use blobvault_core::model::FileReference;
use console::style;
use std::path::PathBuf;
use tokio::fs;

/// Upload configuration
pub struct UploadConfig {
    pub path: PathBuf,
    pub native: bool,
    /// Base64 session key; a new one is generated when absent
    pub key: Option<String>,
}

/// Run upload command
pub async fn run(cfg: &BlobVaultConfig, config: UploadConfig) -> Result<()> {
    let path = &config.path;
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }

    let key = session_key(config.key.as_deref())?;
    let mut settings = cfg.transfer_settings();
    if config.native {
        settings.mode = TransferMode::Native;
    }
    let transfer = build_transfer(transfer_context(cfg, settings, &key)?, None)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    let size = fs::metadata(path).await?.len();
    let source = AttachmentSource::Device(FileReference {
        mime_type: mime_guess::from_path(path).first_or_octet_stream().to_string(),
        name: name.clone(),
        location: path.clone(),
        size,
    });

    let pb = spinner(format!("Uploading {} ({}, {} bytes)", name, transfer.mode(), size))?;
    let result = transfer.upload(source, &key).await;
    pb.finish_and_clear();
    let file_data_id = result.context("Failed to upload file")?;

    println!(
        "{} {}\n  File data: {}\n  {} Session key: {}",
        markers::done(),
        style("Successfully uploaded").green().bold(),
        file_data_id,
        markers::KEY,
        key.to_base64()
    );
    println!(
        "{} Keep the session key: it is needed to decrypt the file",
        markers::caution()
    );

    Ok(())
}
