//! Native transfers of device-resident files
//!
//! Encryption and disk I/O are delegated to a [`NativeFileApp`]. This module
//! builds the requests, interprets the response status and makes sure every
//! temporary encrypted file is deleted, whatever the outcome.

mod local;

pub use local::LocalFileApp;

use crate::auth::GroupType;
use crate::context::TransferContext;
use crate::facade::FILE_DATA_ID_QUERY_PARAM;
use crate::transport::{build_url, suspension_window, Headers, HttpMethod, BODY_QUERY_PARAM};
use crate::FILE_DATA_SERVICE_PATH;
use async_trait::async_trait;
use blobvault_core::crypto::{random_iv, SessionKey, IV_SIZE};
use blobvault_core::error::{Result, VaultError};
use blobvault_core::model::{
    FileDataDataGet, FileDataDataPost, FileDataReturnPost, FileEntity, FileReference, Id,
    BINARY_MIME_TYPE, FILES_MODEL_VERSION,
};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Result of encrypting a device file
#[derive(Debug, Clone)]
pub struct EncryptedFileInfo {
    pub uri: PathBuf,
    pub unencrypted_size: u64,
}

/// Outcome of a native upload or download
#[derive(Debug, Clone, Default)]
pub struct NativeResponse {
    pub status: u16,
    /// Downloaded encrypted file, if the helper wrote one
    pub file: Option<PathBuf>,
    pub error_id: Option<String>,
    pub precondition: Option<String>,
    pub suspension_time: Option<Duration>,
}

impl NativeResponse {
    /// Map the status onto the error taxonomy
    pub fn check(&self) -> Result<()> {
        if self.status == 200 {
            Ok(())
        } else if let Some(retry_after) = suspension_window(self.status, self.suspension_time) {
            Err(VaultError::Suspended { retry_after })
        } else {
            Err(VaultError::from_status(
                self.status,
                self.error_id.clone(),
                self.precondition.clone(),
            ))
        }
    }
}

/// Device helper performing file encryption and file transfers
#[async_trait]
pub trait NativeFileApp: Send + Sync {
    /// Encrypt `source` into a new temporary file
    async fn encrypt_file(
        &self,
        key: &SessionKey,
        source: &Path,
        iv: [u8; IV_SIZE],
    ) -> Result<EncryptedFileInfo>;

    /// Decrypt `encrypted` into a new file named `target_name`
    async fn decrypt_file(&self, key: &SessionKey, encrypted: &Path, target_name: &str) -> Result<PathBuf>;

    async fn upload(&self, file: &Path, url: &Url, headers: &Headers) -> Result<NativeResponse>;

    async fn download(&self, url: &Url, file_name: &str, headers: &Headers) -> Result<NativeResponse>;

    async fn delete_file(&self, file: &Path) -> Result<()>;
}

/// Deletes a temporary file when released or dropped
///
/// [`TempFileGuard::release`] deletes in place. Dropping an unreleased
/// guard (a cancelled transfer) hands the deletion to the runtime.
pub struct TempFileGuard {
    file_app: Arc<dyn NativeFileApp>,
    path: Option<PathBuf>,
}

impl TempFileGuard {
    pub fn new(file_app: Arc<dyn NativeFileApp>, path: PathBuf) -> Self {
        Self {
            file_app,
            path: Some(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub async fn release(mut self) {
        if let Some(path) = self.path.take() {
            delete_quietly(self.file_app.as_ref(), &path).await;
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let file_app = self.file_app.clone();
                handle.spawn(async move {
                    delete_quietly(file_app.as_ref(), &path).await;
                });
            }
            Err(_) => warn!(path = %path.display(), "No runtime to delete temporary file"),
        }
    }
}

async fn delete_quietly(file_app: &dyn NativeFileApp, path: &Path) {
    match file_app.delete_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Deleted temporary file"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete temporary file"),
    }
}

/// Transfers that stream device files through a [`NativeFileApp`]
#[derive(Clone)]
pub struct NativeTransfer {
    ctx: TransferContext,
    file_app: Arc<dyn NativeFileApp>,
}

impl NativeTransfer {
    pub fn new(ctx: TransferContext, file_app: Arc<dyn NativeFileApp>) -> Self {
        Self { ctx, file_app }
    }

    pub fn context(&self) -> &TransferContext {
        &self.ctx
    }

    /// Download a legacy file into a decrypted device file
    #[instrument(skip(self, file), fields(file = %file.name))]
    pub async fn download_file_content_native(&self, file: &FileEntity) -> Result<FileReference> {
        let key = self.ctx.keys.resolve(file).await?;
        let body = serde_json::to_string(&FileDataDataGet {
            file: file.id.clone(),
            base64: false,
        })?;
        let url = build_url(
            &self.ctx.settings.origin,
            FILE_DATA_SERVICE_PATH,
            &[(BODY_QUERY_PARAM.to_string(), body)],
        )?;
        let headers = self.ctx.services.headers(FILES_MODEL_VERSION);

        let location = self
            .ctx
            .suspension
            .execute(|| self.download_attempt(file, &key, &url, &headers))
            .await?;

        info!(location = %location.display(), "Downloaded file natively");
        Ok(FileReference {
            name: file.name.clone(),
            mime_type: file
                .mime_type
                .clone()
                .unwrap_or_else(|| BINARY_MIME_TYPE.to_string()),
            location,
            size: file.size,
        })
    }

    async fn download_attempt(
        &self,
        file: &FileEntity,
        key: &SessionKey,
        url: &Url,
        headers: &Headers,
    ) -> Result<PathBuf> {
        let response = self.file_app.download(url, &file.name, headers).await?;
        let guard = response
            .file
            .clone()
            .map(|path| TempFileGuard::new(self.file_app.clone(), path));

        let result = match (response.check(), &guard) {
            (Ok(()), Some(guard)) => {
                self.file_app
                    .decrypt_file(key, guard.path(), &file.name)
                    .await
            }
            (Ok(()), None) => Err(VaultError::Programming(
                "native download succeeded without a file".to_string(),
            )),
            (Err(e), _) => Err(e),
        };

        if let Some(guard) = guard {
            guard.release().await;
        }
        result
    }

    /// Upload a device file through the legacy file data service
    ///
    /// The encrypted copy is deleted afterwards. The source file is left
    /// for the caller.
    #[instrument(skip(self, reference, key), fields(file = %reference.name))]
    pub async fn upload_file_data_native(
        &self,
        reference: &FileReference,
        key: &SessionKey,
    ) -> Result<Id> {
        let encrypted = self
            .file_app
            .encrypt_file(key, &reference.location, random_iv())
            .await?;
        let guard = TempFileGuard::new(self.file_app.clone(), encrypted.uri.clone());

        let result = self.upload_encrypted(&guard, encrypted.unencrypted_size).await;
        guard.release().await;
        result
    }

    async fn upload_encrypted(&self, guard: &TempFileGuard, unencrypted_size: u64) -> Result<Id> {
        let post = FileDataDataPost {
            size: unencrypted_size.to_string(),
            group: self.ctx.services.auth().group_id(GroupType::Mail)?,
        };
        let services = &self.ctx.services;
        let created: FileDataReturnPost = self
            .ctx
            .suspension
            .execute(|| {
                services.request_json(
                    HttpMethod::Post,
                    FILE_DATA_SERVICE_PATH,
                    FILES_MODEL_VERSION,
                    &post,
                )
            })
            .await?;
        let file_data_id = created.file_data;

        let url = build_url(
            &self.ctx.settings.origin,
            FILE_DATA_SERVICE_PATH,
            &[(FILE_DATA_ID_QUERY_PARAM.to_string(), file_data_id.clone())],
        )?;
        let headers = self.ctx.services.headers(FILES_MODEL_VERSION);
        let (file_app, url, headers) = (&self.file_app, &url, &headers);
        self.ctx
            .suspension
            .execute(move || async move {
                file_app.upload(guard.path(), url, headers).await?.check()
            })
            .await?;

        info!(file_data = %file_data_id, "Uploaded file natively");
        Ok(file_data_id)
    }
}
