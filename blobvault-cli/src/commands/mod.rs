//! CLI Commands

pub mod blob;
pub mod config;
pub mod download;
pub mod upload;

use anyhow::{Context, Result};
use blobvault_client::{
    BlobVaultConfig, HttpTransport, StaticKeyResolver, TransferContext, TransferSettings,
};
use blobvault_core::SessionKey;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Wire up transport, credentials and key for one command
pub fn transfer_context(
    cfg: &BlobVaultConfig,
    settings: TransferSettings,
    key: &SessionKey,
) -> Result<TransferContext> {
    cfg.validate().context("Invalid configuration")?;
    if cfg.auth.access_token.is_empty() {
        anyhow::bail!("No access token configured. Set auth.access_token or BLOBVAULT_ACCESS_TOKEN");
    }

    let transport = HttpTransport::new(&settings.origin, settings.request_timeout)
        .context("Failed to create HTTP transport")?;
    Ok(TransferContext::new(
        Arc::new(transport),
        Arc::new(cfg.credentials()),
        Arc::new(StaticKeyResolver::new(key.clone())),
        settings,
    ))
}

/// Parse a base64 session key, or generate a fresh one
pub fn session_key(encoded: Option<&str>) -> Result<SessionKey> {
    match encoded {
        Some(encoded) => SessionKey::from_base64(encoded).context("Invalid session key"),
        None => Ok(SessionKey::generate()),
    }
}

pub fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}
