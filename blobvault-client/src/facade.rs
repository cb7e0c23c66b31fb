//! In-memory attachment transfers
//!
//! Uploads encrypt the whole payload, split the ciphertext into chunks and
//! push them one at a time. Downloads fetch every blob set of a file,
//! restore manifest order and decrypt. A transfer either completes or
//! fails as a whole.

use crate::auth::GroupType;
use crate::blob_client::BlobClient;
use crate::broker::AccessTokenBroker;
use crate::context::TransferContext;
use crate::transport::{HttpMethod, MediaType, RestRequest};
use crate::{
    BLOB_REFERENCE_SERVICE_PATH, FILE_BLOB_SERVICE_PATH, FILE_DATA_ENTITY_PATH,
    FILE_DATA_SERVICE_PATH,
};
use blobvault_core::chunk::{self, BlobId};
use blobvault_core::crypto::{self, SessionKey};
use blobvault_core::error::{Result, VaultError};
use blobvault_core::model::{
    file_data_type, BlobReferenceDataPut, BlobReferenceToken, DataFile, FileBlobServiceGetReturn,
    FileBlobServicePostReturn, FileData, FileDataDataGet, FileDataDataPost, FileDataReturnPost,
    FileEntity, Id, StorageScheme, TypeDescriptor, FILES_MODEL_VERSION, STORAGE_MODEL_VERSION,
};
use bytes::Bytes;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Query parameter naming the file data on legacy uploads
pub const FILE_DATA_ID_QUERY_PARAM: &str = "fileDataId";

pub struct AttachmentFacade {
    ctx: TransferContext,
    broker: AccessTokenBroker,
    blobs: BlobClient,
}

impl AttachmentFacade {
    pub fn new(ctx: TransferContext) -> Self {
        let broker = AccessTokenBroker::new(ctx.services.clone());
        let blobs = BlobClient::new(ctx.services.clone(), ctx.suspension.clone());
        Self { ctx, broker, blobs }
    }

    pub fn context(&self) -> &TransferContext {
        &self.ctx
    }

    /// Download and decrypt a file, whichever layout it is stored in
    #[instrument(skip(self, file), fields(file = %file.name))]
    pub async fn download_file_content(&self, file: &FileEntity) -> Result<DataFile> {
        let file_data = self.load_file_data(file).await?;
        let key = self.ctx.keys.resolve(file).await?;

        // Only the layout tag matters here; the blob service returns the
        // manifest together with the access infos it belongs to
        match StorageScheme::resolve(&file_data)? {
            StorageScheme::Legacy(_) => self.download_file_block_content(file, &key).await,
            StorageScheme::Chunked(_) => self.download_file_blob_content(file, &key).await,
        }
    }

    async fn load_file_data(&self, file: &FileEntity) -> Result<FileData> {
        let file_data_id = file.data.as_ref().ok_or_else(|| {
            VaultError::Programming(format!("file {} has no data", file.id.element_id()))
        })?;
        let path = format!("{}/{}", FILE_DATA_ENTITY_PATH, file_data_id);
        let services = &self.ctx.services;
        self.ctx
            .suspension
            .execute(|| services.load(&path, FILES_MODEL_VERSION))
            .await
    }

    /// Legacy layout: the whole ciphertext in one response
    pub async fn download_file_block_content(
        &self,
        file: &FileEntity,
        key: &SessionKey,
    ) -> Result<DataFile> {
        let request = FileDataDataGet {
            file: file.id.clone(),
            base64: false,
        };
        let services = &self.ctx.services;
        let ciphertext = self
            .ctx
            .suspension
            .execute(|| {
                services.request_bytes(
                    HttpMethod::Get,
                    FILE_DATA_SERVICE_PATH,
                    FILES_MODEL_VERSION,
                    &request,
                )
            })
            .await?;

        let plaintext = crypto::decrypt(key, &ciphertext)?;
        debug!(size = plaintext.len(), "Downloaded legacy file data");
        Ok(DataFile::from_file(file, plaintext))
    }

    /// Chunked layout: fetch every blob set, then restore manifest order
    pub async fn download_file_blob_content(
        &self,
        file: &FileEntity,
        key: &SessionKey,
    ) -> Result<DataFile> {
        let request = FileDataDataGet {
            file: file.id.clone(),
            base64: false,
        };
        let service_return: FileBlobServiceGetReturn = self
            .service_call(HttpMethod::Get, FILE_BLOB_SERVICE_PATH, FILES_MODEL_VERSION, &request)
            .await?;

        // Blob sets run concurrently, blobs within a set one at a time
        let sets = try_join_all(
            service_return
                .access_infos
                .iter()
                .map(|access| self.blobs.get_all(access)),
        )
        .await?;

        let mut fetched: HashMap<BlobId, Bytes> = HashMap::new();
        for set in sets {
            fetched.extend(set);
        }

        let ciphertext = if self.ctx.settings.strict_reassembly {
            chunk::reassemble_strict(&service_return.blobs, &fetched)?
        } else {
            chunk::reassemble(&service_return.blobs, &fetched)
        };

        let plaintext = crypto::decrypt(key, &ciphertext)?;
        info!(
            blobs = service_return.blobs.len(),
            size = plaintext.len(),
            "Downloaded chunked file data"
        );
        Ok(DataFile::from_file(file, plaintext))
    }

    /// Legacy upload: create the file data, then PUT the ciphertext in one piece
    #[instrument(skip(self, data_file, key), fields(file = %data_file.name))]
    pub async fn upload_file_data(&self, data_file: &DataFile, key: &SessionKey) -> Result<Id> {
        let ciphertext = Bytes::from(crypto::encrypt(key, &data_file.data)?);
        let post = FileDataDataPost {
            size: data_file.data.len().to_string(),
            group: self.ctx.services.auth().group_id(GroupType::Mail)?,
        };
        let created: FileDataReturnPost = self
            .service_call(HttpMethod::Post, FILE_DATA_SERVICE_PATH, FILES_MODEL_VERSION, &post)
            .await?;
        let file_data_id = created.file_data;

        let request = RestRequest::new(HttpMethod::Put, FILE_DATA_SERVICE_PATH)
            .query(FILE_DATA_ID_QUERY_PARAM, file_data_id.clone())
            .headers(self.ctx.services.headers(FILES_MODEL_VERSION))
            .body(ciphertext, MediaType::Binary);
        let services = &self.ctx.services;
        self.ctx
            .suspension
            .execute(move || services.send(request.clone()))
            .await?;

        info!(file_data = %file_data_id, "Uploaded legacy file data");
        Ok(file_data_id)
    }

    /// Chunked upload: one PUT and one reference registration per chunk
    #[instrument(skip(self, data_file, key), fields(file = %data_file.name))]
    pub async fn upload_file_blob_data(&self, data_file: &DataFile, key: &SessionKey) -> Result<Id> {
        let ciphertext = Bytes::from(crypto::encrypt(key, &data_file.data)?);
        let post = FileDataDataPost {
            size: data_file.data.len().to_string(),
            group: self.ctx.services.auth().group_id(GroupType::Mail)?,
        };
        let created: FileBlobServicePostReturn = self
            .service_call(HttpMethod::Post, FILE_BLOB_SERVICE_PATH, FILES_MODEL_VERSION, &post)
            .await?;
        let file_data_id = created.file_data;
        let access = created.access_info;

        // The write token is reused for every chunk; expiry mid-upload fails the upload
        let chunks = chunk::split(&ciphertext, self.ctx.settings.max_chunk_size)?;
        for chunk in &chunks {
            let token = self.blobs.put_chunk(chunk, &access).await?;
            let reference = BlobReferenceDataPut {
                blob_reference_token: token,
                type_descriptor: file_data_type(),
                instance_element_id: file_data_id.clone(),
            };
            self.service_call_void(
                HttpMethod::Put,
                BLOB_REFERENCE_SERVICE_PATH,
                STORAGE_MODEL_VERSION,
                &reference,
            )
            .await?;
            debug!(index = chunk.index, blob_id = %chunk.id, size = chunk.size(), "Chunk stored");
        }

        info!(
            file_data = %file_data_id,
            chunks = chunks.len(),
            size = ciphertext.len(),
            "Uploaded chunked file data"
        );
        Ok(file_data_id)
    }

    /// Store a standalone blob owned by `owner_group`
    #[instrument(skip(self, data, key), fields(size = data.len()))]
    pub async fn upload_blob(
        &self,
        type_descriptor: &TypeDescriptor,
        data: &[u8],
        owner_group: &str,
        key: &SessionKey,
    ) -> Result<BlobReferenceToken> {
        let broker = &self.broker;
        let access = self
            .ctx
            .suspension
            .execute(|| broker.request_upload_token(type_descriptor, owner_group))
            .await?;

        let ciphertext = Bytes::from(crypto::encrypt(key, data)?);
        let blob_id = BlobId::from_data(&ciphertext);
        self.blobs.put(&blob_id, ciphertext, &access).await
    }

    /// Fetch and decrypt a standalone blob
    #[instrument(skip(self, key))]
    pub async fn download_blob(
        &self,
        archive_id: &Id,
        blob_id: &BlobId,
        key: &SessionKey,
    ) -> Result<Vec<u8>> {
        let broker = &self.broker;
        let access = self
            .ctx
            .suspension
            .execute(|| broker.request_download_token(archive_id))
            .await?;

        let ciphertext = self.blobs.get(archive_id, blob_id, &access).await?;
        crypto::decrypt(key, &ciphertext)
    }

    async fn service_call<Req, Resp>(
        &self,
        method: HttpMethod,
        path: &str,
        model_version: &str,
        body: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let services = &self.ctx.services;
        self.ctx
            .suspension
            .execute(|| services.request_json(method, path, model_version, body))
            .await
    }

    async fn service_call_void<Req: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        model_version: &str,
        body: &Req,
    ) -> Result<()> {
        let services = &self.ctx.services;
        self.ctx
            .suspension
            .execute(|| services.request_void(method, path, model_version, body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionCredentials, StaticKeyResolver};
    use crate::context::TransferSettings;
    use crate::transport::{RestResponse, Transport};
    use async_trait::async_trait;
    use blobvault_core::model::IdTuple;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Serves one legacy file and records every request path
    struct LegacyFiles {
        ciphertext: Bytes,
        blocks: u32,
        paths: Mutex<Vec<(HttpMethod, String)>>,
    }

    #[async_trait]
    impl Transport for LegacyFiles {
        async fn request(&self, request: RestRequest) -> Result<RestResponse> {
            self.paths.lock().push((request.method, request.path.clone()));
            let response = match (request.method, request.path.as_str()) {
                (HttpMethod::Get, FILE_DATA_SERVICE_PATH) => RestResponse::ok(self.ciphertext.clone()),
                (HttpMethod::Get, path) if path.starts_with(FILE_DATA_ENTITY_PATH) => {
                    let file_data = serde_json::json!({
                        "_id": "fd1",
                        "size": 5,
                        "blocks": self.blocks,
                        "blobs": [],
                    });
                    RestResponse::ok(serde_json::to_vec(&file_data).unwrap())
                }
                (HttpMethod::Post, FILE_DATA_SERVICE_PATH) => {
                    RestResponse::ok(Bytes::from_static(br#"{"fileData":"fd-new"}"#))
                }
                (HttpMethod::Put, FILE_DATA_SERVICE_PATH) => RestResponse::ok(Bytes::new()),
                _ => RestResponse::with_status(404),
            };
            Ok(response)
        }
    }

    fn facade(transport: Arc<LegacyFiles>, key: SessionKey) -> AttachmentFacade {
        let ctx = TransferContext::new(
            transport,
            Arc::new(SessionCredentials::new("tok").with_mail_group("mail")),
            Arc::new(StaticKeyResolver::new(key)),
            TransferSettings::default(),
        );
        AttachmentFacade::new(ctx)
    }

    fn file() -> FileEntity {
        FileEntity {
            id: IdTuple::new("list", "f1"),
            name: "notes.txt".to_string(),
            mime_type: Some("text/plain".to_string()),
            size: 5,
            data: Some("fd1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_legacy_download_dispatch() {
        let key = SessionKey::generate();
        let ciphertext = Bytes::from(crypto::encrypt(&key, b"hello").unwrap());
        let transport = Arc::new(LegacyFiles {
            ciphertext,
            blocks: 1,
            paths: Mutex::new(Vec::new()),
        });

        let data_file = facade(transport.clone(), key).download_file_content(&file()).await.unwrap();
        assert_eq!(data_file.data, Bytes::from_static(b"hello"));
        assert_eq!(data_file.mime_type, "text/plain");

        let paths = transport.paths.lock();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1], (HttpMethod::Get, FILE_DATA_SERVICE_PATH.to_string()));
    }

    #[tokio::test]
    async fn test_file_data_without_layout() {
        let key = SessionKey::generate();
        let transport = Arc::new(LegacyFiles {
            ciphertext: Bytes::new(),
            blocks: 0,
            paths: Mutex::new(Vec::new()),
        });

        let result = facade(transport, key).download_file_content(&file()).await;
        assert!(matches!(result, Err(VaultError::Programming(_))));
    }

    #[tokio::test]
    async fn test_file_without_data() {
        let transport = Arc::new(LegacyFiles {
            ciphertext: Bytes::new(),
            blocks: 1,
            paths: Mutex::new(Vec::new()),
        });
        let mut file = file();
        file.data = None;

        let result = facade(transport.clone(), SessionKey::generate())
            .download_file_content(&file)
            .await;
        assert!(matches!(result, Err(VaultError::Programming(_))));
        assert!(transport.paths.lock().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_upload() {
        let transport = Arc::new(LegacyFiles {
            ciphertext: Bytes::new(),
            blocks: 1,
            paths: Mutex::new(Vec::new()),
        });
        let data_file = DataFile::new("a.bin", "application/octet-stream", vec![1u8; 40]);

        let id = facade(transport.clone(), SessionKey::generate())
            .upload_file_data(&data_file, &SessionKey::generate())
            .await
            .unwrap();
        assert_eq!(id, "fd-new");

        let paths = transport.paths.lock();
        assert_eq!(
            *paths,
            vec![
                (HttpMethod::Post, FILE_DATA_SERVICE_PATH.to_string()),
                (HttpMethod::Put, FILE_DATA_SERVICE_PATH.to_string()),
            ]
        );
    }
}
