//! Blob transfer client
//!
//! Moves single encrypted blobs to and from the storage service. Every call
//! targets the first server of the [`AccessInfo`] and runs through the
//! shared [`SuspensionController`].

use crate::service::ServiceClient;
use crate::suspension::SuspensionController;
use crate::transport::{Headers, HttpMethod, MediaType, RestRequest, STORAGE_ACCESS_TOKEN_HEADER};
use crate::BLOB_SERVICE_PATH;
use blobvault_core::chunk::{BlobId, Chunk};
use blobvault_core::error::{Result, VaultError};
use blobvault_core::model::{
    AccessInfo, BlobDataGet, BlobReferenceToken, Id, STORAGE_MODEL_VERSION,
};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Query parameter naming the blob on upload
pub const BLOB_ID_QUERY_PARAM: &str = "blobId";

#[derive(Clone)]
pub struct BlobClient {
    services: ServiceClient,
    suspension: SuspensionController,
}

impl BlobClient {
    pub fn new(services: ServiceClient, suspension: SuspensionController) -> Self {
        Self {
            services,
            suspension,
        }
    }

    /// Auth headers, `v` and `storageAccessToken`
    fn storage_headers(&self, access: &AccessInfo) -> Headers {
        let mut headers = self.services.headers(STORAGE_MODEL_VERSION);
        headers.insert(
            STORAGE_ACCESS_TOKEN_HEADER.to_string(),
            access.storage_access_token.clone(),
        );
        headers
    }

    /// Upload one blob and return the server's reference token
    #[instrument(skip(self, data, access), fields(size = data.len()))]
    pub async fn put(
        &self,
        blob_id: &BlobId,
        data: Bytes,
        access: &AccessInfo,
    ) -> Result<BlobReferenceToken> {
        let server = access.primary_server()?;
        let request = RestRequest::new(HttpMethod::Put, BLOB_SERVICE_PATH)
            .query(BLOB_ID_QUERY_PARAM, blob_id.to_base64())
            .headers(self.storage_headers(access))
            .body(data, MediaType::Binary)
            .base_url(server.url.clone());

        let services = &self.services;
        let body = self
            .suspension
            .execute(move || services.send(request.clone()))
            .await?;

        let token = std::str::from_utf8(&body)
            .map_err(|e| VaultError::Serialization(format!("invalid blob reference token: {}", e)))?
            .trim()
            .to_string();
        debug!(blob_id = %blob_id, "Blob stored");
        Ok(BlobReferenceToken(token))
    }

    /// Upload a chunk under its own content id
    pub async fn put_chunk(&self, chunk: &Chunk, access: &AccessInfo) -> Result<BlobReferenceToken> {
        self.put(&chunk.id, chunk.data.clone(), access).await
    }

    /// Fetch one blob of an archive
    #[instrument(skip(self, access))]
    pub async fn get(&self, archive_id: &Id, blob_id: &BlobId, access: &AccessInfo) -> Result<Bytes> {
        let server = access.primary_server()?;
        let body = serde_json::to_vec(&BlobDataGet {
            archive_id: archive_id.clone(),
            blob_id: *blob_id,
        })?;
        let request = RestRequest::new(HttpMethod::Get, BLOB_SERVICE_PATH)
            .headers(self.storage_headers(access))
            .body(body, MediaType::Json)
            .base_url(server.url.clone());

        let services = &self.services;
        let data = self
            .suspension
            .execute(move || services.send(request.clone()))
            .await?;
        debug!(blob_id = %blob_id, size = data.len(), "Blob fetched");
        Ok(data)
    }

    /// Fetch every blob listed in `access`, one at a time
    pub async fn get_all(&self, access: &AccessInfo) -> Result<HashMap<BlobId, Bytes>> {
        let archive_id = access.archive_id.clone().ok_or_else(|| {
            VaultError::Programming("access info without archive id".to_string())
        })?;

        let mut fetched = HashMap::with_capacity(access.blobs.len());
        for blob_id in &access.blobs {
            let data = self.get(&archive_id, blob_id, access).await?;
            fetched.insert(*blob_id, data);
        }
        Ok(fetched)
    }
}
