//! Standalone blob commands

use super::{session_key, spinner, transfer_context};
use crate::markers;
use anyhow::{Context, Result};
use blobvault_client::{AttachmentFacade, BlobVaultConfig};
use blobvault_core::model::file_data_type;
use blobvault_core::BlobId;
use console::style;
use std::path::PathBuf;
use tokio::fs;

pub struct BlobUploadConfig {
    pub path: PathBuf,
    pub owner_group: String,
    pub key: Option<String>,
}

pub struct BlobDownloadConfig {
    pub archive_id: String,
    pub blob_id: String,
    pub key: String,
    pub output: PathBuf,
}

pub async fn upload(cfg: &BlobVaultConfig, config: BlobUploadConfig) -> Result<()> {
    let data = fs::read(&config.path)
        .await
        .with_context(|| format!("Failed to read {}", config.path.display()))?;
    let key = session_key(config.key.as_deref())?;
    let facade = AttachmentFacade::new(transfer_context(cfg, cfg.transfer_settings(), &key)?);

    let pb = spinner(format!("Uploading blob ({} bytes)", data.len()))?;
    let result = facade
        .upload_blob(&file_data_type(), &data, &config.owner_group, &key)
        .await;
    pb.finish_and_clear();
    let token = result.context("Failed to upload blob")?;

    println!(
        "{} {}\n  Reference token: {}\n  {} Session key: {}",
        markers::done(),
        style("Blob stored").green().bold(),
        token.as_str(),
        markers::KEY,
        key.to_base64()
    );
    Ok(())
}

pub async fn download(cfg: &BlobVaultConfig, config: BlobDownloadConfig) -> Result<()> {
    let blob_id = BlobId::from_base64(&config.blob_id).context("Invalid blob id")?;
    let key = session_key(Some(&config.key))?;
    let facade = AttachmentFacade::new(transfer_context(cfg, cfg.transfer_settings(), &key)?);

    let pb = spinner(format!("Downloading blob {}", blob_id))?;
    let result = facade.download_blob(&config.archive_id, &blob_id, &key).await;
    pb.finish_and_clear();
    let data = result.context("Failed to download blob")?;

    fs::write(&config.output, &data)
        .await
        .context("Failed to write output file")?;
    println!(
        "{} Downloaded {} bytes to {}",
        markers::done(),
        data.len(),
        config.output.display()
    );
    Ok(())
}
