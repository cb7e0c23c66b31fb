//! Configuration management
//!
//! Config directory: ~/.blobvault/ (cross-platform)
//!
//! Config file format (~/.blobvault/config.toml):
//! ```toml
//! [server]
//! origin = "https://files.example.com"
//!
//! [transfer]
//! mode = "in-memory"
//! max_chunk_size = 10485760
//! max_suspension_retries = 10
//! strict_reassembly = false
//! request_timeout_secs = 300
//!
//! [auth]
//! access_token = "..."
//! mail_group_id = "..."
//! ```

use crate::auth::SessionCredentials;
use crate::context::TransferSettings;
use crate::suspension::DEFAULT_MAX_SUSPENSION_RETRIES;
use crate::transfer::TransferMode;
use blobvault_core::error::{Result, VaultError};
use blobvault_core::{max_chunk_size_from_env, MAX_BLOB_SIZE_BYTES, MIN_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Structure of ~/.blobvault/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlobVaultConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// File and trust service location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_origin")]
    pub origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
        }
    }
}

fn default_origin() -> String {
    std::env::var("BLOBVAULT_ORIGIN").unwrap_or_else(|_| "http://localhost:9000".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_mode")]
    pub mode: TransferMode,

    /// Upper bound of one uploaded chunk, in bytes
    #[serde(default = "max_chunk_size_from_env")]
    pub max_chunk_size: usize,

    #[serde(default = "default_max_suspension_retries")]
    pub max_suspension_retries: u32,

    /// Fail downloads with missing chunks instead of leaving a gap
    #[serde(default)]
    pub strict_reassembly: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Scratch directory for native transfers
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            max_chunk_size: max_chunk_size_from_env(),
            max_suspension_retries: default_max_suspension_retries(),
            strict_reassembly: false,
            request_timeout_secs: default_request_timeout_secs(),
            temp_dir: None,
        }
    }
}

fn default_mode() -> TransferMode {
    std::env::var("BLOBVAULT_TRANSFER_MODE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn default_max_suspension_retries() -> u32 {
    std::env::var("BLOBVAULT_MAX_SUSPENSION_RETRIES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_SUSPENSION_RETRIES)
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Session credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_access_token")]
    pub access_token: String,

    #[serde(default)]
    pub user_group_id: Option<String>,

    #[serde(default)]
    pub mail_group_id: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: default_access_token(),
            user_group_id: None,
            mail_group_id: None,
        }
    }
}

fn default_access_token() -> String {
    std::env::var("BLOBVAULT_ACCESS_TOKEN").unwrap_or_default()
}

impl BlobVaultConfig {
    /// Check ranges the type system cannot express
    pub fn validate(&self) -> Result<()> {
        let size = self.transfer.max_chunk_size;
        if !(MIN_CHUNK_SIZE..=MAX_BLOB_SIZE_BYTES).contains(&size) {
            return Err(VaultError::Configuration(format!(
                "max_chunk_size must be between {} and {} bytes, got {}",
                MIN_CHUNK_SIZE, MAX_BLOB_SIZE_BYTES, size
            )));
        }
        if self.server.origin.trim().is_empty() {
            return Err(VaultError::Configuration("server origin is empty".to_string()));
        }
        Ok(())
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            origin: self.server.origin.trim_end_matches('/').to_string(),
            max_chunk_size: self.transfer.max_chunk_size,
            max_suspension_retries: self.transfer.max_suspension_retries,
            strict_reassembly: self.transfer.strict_reassembly,
            mode: self.transfer.mode,
            request_timeout: Duration::from_secs(self.transfer.request_timeout_secs),
            temp_dir: self
                .transfer
                .temp_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("blobvault")),
        }
    }

    pub fn credentials(&self) -> SessionCredentials {
        SessionCredentials {
            access_token: self.auth.access_token.clone(),
            user_group_id: self.auth.user_group_id.clone(),
            mail_group_id: self.auth.mail_group_id.clone(),
        }
    }
}

/// Get the config directory path (~/.blobvault/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| VaultError::Configuration("could not determine home directory".to_string()))?;
    let config_dir = home.join(".blobvault");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from ~/.blobvault/config.toml
/// Falls back to defaults if the file doesn't exist or can't be parsed
pub fn load_config() -> BlobVaultConfig {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(_) => BlobVaultConfig::default(),
    }
}

pub fn load_config_from(path: &Path) -> BlobVaultConfig {
    if !path.exists() {
        return BlobVaultConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse config file");
                BlobVaultConfig::default()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read config file");
            BlobVaultConfig::default()
        }
    }
}

pub fn save_config(config: &BlobVaultConfig) -> Result<()> {
    save_config_to(config, &config_file_path()?)
}

pub fn save_config_to(config: &BlobVaultConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| VaultError::Serialization(format!("failed to serialize config: {}", e)))?;
    fs::write(path, content)?;
    Ok(())
}

/// Create a default config file if it doesn't exist
pub fn ensure_config_exists() -> Result<PathBuf> {
    let path = config_file_path()?;
    if !path.exists() {
        save_config_to(&BlobVaultConfig::default(), &path)?;
    }
    Ok(path)
}
