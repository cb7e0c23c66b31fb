//! Native helper backed by the local filesystem and reqwest

use super::{EncryptedFileInfo, NativeFileApp, NativeResponse};
use crate::transport::{parse_response_meta, Headers, MediaType};
use async_trait::async_trait;
use blobvault_core::crypto::{self, SessionKey, IV_SIZE};
use blobvault_core::error::{Result, VaultError};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct LocalFileApp {
    client: Client,
    temp_dir: PathBuf,
}

impl LocalFileApp {
    pub fn new(temp_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            temp_dir: temp_dir.into(),
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    async fn scratch_path(&self, suffix: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        Ok(self.temp_dir.join(format!("{}.{}", Uuid::new_v4(), suffix)))
    }

    fn into_native_response(status: u16, headers: &reqwest::header::HeaderMap) -> NativeResponse {
        let (suspension_time, error_id, precondition) = parse_response_meta(headers);
        NativeResponse {
            status,
            file: None,
            error_id,
            precondition,
            suspension_time,
        }
    }
}

/// Write a scratch file, removing whatever landed on disk if the write fails
async fn write_scratch(path: &Path, contents: &[u8]) -> Result<()> {
    let result = tokio::fs::write(path, contents).await;
    discard_on_error(path, result).await
}

async fn discard_on_error<T>(path: &Path, result: std::io::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed partial scratch file"),
                Err(remove) if remove.kind() == std::io::ErrorKind::NotFound => {}
                Err(remove) => {
                    warn!(path = %path.display(), error = %remove, "Failed to remove partial scratch file")
                }
            }
            Err(e.into())
        }
    }
}

/// Keep only the final component of a server supplied name
fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("attachment")
        .to_string()
}

#[async_trait]
impl NativeFileApp for LocalFileApp {
    async fn encrypt_file(
        &self,
        key: &SessionKey,
        source: &Path,
        iv: [u8; IV_SIZE],
    ) -> Result<EncryptedFileInfo> {
        let plaintext = tokio::fs::read(source).await?;
        let ciphertext = crypto::encrypt_with_iv(key, &plaintext, &iv)?;

        let uri = self.scratch_path("enc").await?;
        write_scratch(&uri, &ciphertext).await?;
        debug!(source = %source.display(), encrypted = %uri.display(), "Encrypted file");

        Ok(EncryptedFileInfo {
            uri,
            unencrypted_size: plaintext.len() as u64,
        })
    }

    async fn decrypt_file(&self, key: &SessionKey, encrypted: &Path, target_name: &str) -> Result<PathBuf> {
        let ciphertext = tokio::fs::read(encrypted).await?;
        let plaintext = crypto::decrypt(key, &ciphertext)?;

        let dir = self.temp_dir.join("decrypted").join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let target = dir.join(sanitize_file_name(target_name));
        write_scratch(&target, &plaintext).await?;
        Ok(target)
    }

    async fn upload(&self, file: &Path, url: &Url, headers: &Headers) -> Result<NativeResponse> {
        let body = tokio::fs::read(file).await?;
        let mut builder = self
            .client
            .put(url.clone())
            .header("Content-Type", MediaType::Binary.content_type());
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;
        Ok(Self::into_native_response(response.status().as_u16(), response.headers()))
    }

    async fn download(&self, url: &Url, file_name: &str, headers: &Headers) -> Result<NativeResponse> {
        let mut builder = self.client.get(url.clone());
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;
        let mut native = Self::into_native_response(response.status().as_u16(), response.headers());

        if native.status == 200 {
            let body = response
                .bytes()
                .await
                .map_err(|e| VaultError::Network(e.to_string()))?;
            let path = self.scratch_path("enc").await?;
            write_scratch(&path, &body).await?;
            debug!(file = file_name, path = %path.display(), "Downloaded encrypted file");
            native.file = Some(path);
        }
        Ok(native)
    }

    async fn delete_file(&self, file: &Path) -> Result<()> {
        tokio::fs::remove_file(file).await?;
        Ok(())
    }
}
