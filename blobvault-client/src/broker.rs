//! Access token broker
//!
//! Obtains scoped storage access from the trust service. One round trip
//! per call, nothing cached: callers reuse the returned [`AccessInfo`]
//! within its validity window.

use crate::service::ServiceClient;
use crate::transport::HttpMethod;
use crate::BLOB_ACCESS_TOKEN_SERVICE_PATH;
use blobvault_core::error::Result;
use blobvault_core::model::{
    AccessInfo, AccessScope, BlobAccessTokenData, BlobAccessTokenReturn, BlobWriteData, Id,
    TypeDescriptor, STORAGE_MODEL_VERSION,
};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct AccessTokenBroker {
    services: ServiceClient,
}

impl AccessTokenBroker {
    pub fn new(services: ServiceClient) -> Self {
        Self { services }
    }

    /// Write access to the archive owned by `owner_group`
    #[instrument(skip(self))]
    pub async fn request_upload_token(
        &self,
        type_descriptor: &TypeDescriptor,
        owner_group: &str,
    ) -> Result<AccessInfo> {
        let request = BlobAccessTokenData {
            write: Some(BlobWriteData {
                type_descriptor: type_descriptor.clone(),
                archive_owner_group: owner_group.to_string(),
            }),
            read_archive_id: None,
        };
        let info = self.request(&request).await?;
        debug!(servers = info.servers.len(), "Received upload token");
        Ok(info.with_scope(AccessScope::OwnerGroup(owner_group.to_string())))
    }

    /// Read access to one archive
    #[instrument(skip(self))]
    pub async fn request_download_token(&self, archive_id: &Id) -> Result<AccessInfo> {
        let request = BlobAccessTokenData {
            write: None,
            read_archive_id: Some(archive_id.clone()),
        };
        let mut info = self.request(&request).await?;
        if info.archive_id.is_none() {
            info.archive_id = Some(archive_id.clone());
        }
        debug!(servers = info.servers.len(), "Received download token");
        Ok(info.with_scope(AccessScope::Archive(archive_id.clone())))
    }

    async fn request(&self, body: &BlobAccessTokenData) -> Result<AccessInfo> {
        let response: BlobAccessTokenReturn = self
            .services
            .request_json(
                HttpMethod::Post,
                BLOB_ACCESS_TOKEN_SERVICE_PATH,
                STORAGE_MODEL_VERSION,
                body,
            )
            .await?;
        Ok(response.blob_access_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionCredentials;
    use crate::transport::{RestRequest, RestResponse, Transport};
    use async_trait::async_trait;
    use blobvault_core::error::VaultError;
    use blobvault_core::model::file_data_type;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct TokenService {
        response: RestResponse,
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl Transport for TokenService {
        async fn request(&self, request: RestRequest) -> Result<RestResponse> {
            assert_eq!(request.path, BLOB_ACCESS_TOKEN_SERVICE_PATH);
            assert_eq!(request.method, HttpMethod::Post);
            let body = request.body.unwrap_or_default();
            self.bodies.lock().push(serde_json::from_slice(&body).unwrap());
            Ok(self.response.clone())
        }
    }

    fn broker(response: RestResponse) -> (AccessTokenBroker, Arc<TokenService>) {
        let service = Arc::new(TokenService {
            response,
            bodies: Mutex::new(Vec::new()),
        });
        let services = ServiceClient::new(service.clone(), Arc::new(SessionCredentials::new("t")));
        (AccessTokenBroker::new(services), service)
    }

    const TOKEN_RESPONSE: &[u8] = br#"{"blobAccessInfo":{"storageAccessToken":"sat","servers":[{"url":"https://s1"}]}}"#;

    #[tokio::test]
    async fn test_upload_token() {
        let (broker, service) = broker(RestResponse::ok(Bytes::from_static(TOKEN_RESPONSE)));

        let info = broker
            .request_upload_token(&file_data_type(), "group-1")
            .await
            .unwrap();
        assert_eq!(info.storage_access_token, "sat");
        assert_eq!(info.scope, Some(AccessScope::OwnerGroup("group-1".to_string())));

        let bodies = service.bodies.lock();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["write"]["archiveOwnerGroup"], "group-1");
    }

    #[tokio::test]
    async fn test_download_token_fills_archive() {
        let (broker, service) = broker(RestResponse::ok(Bytes::from_static(TOKEN_RESPONSE)));

        let info = broker
            .request_download_token(&"arch-9".to_string())
            .await
            .unwrap();
        assert_eq!(info.archive_id.as_deref(), Some("arch-9"));
        assert_eq!(info.scope, Some(AccessScope::Archive("arch-9".to_string())));
        assert_eq!(service.bodies.lock()[0]["readArchiveId"], "arch-9");
    }

    #[tokio::test]
    async fn test_service_error_carries_status() {
        let mut response = RestResponse::with_status(403);
        response.error_id = Some("denied".to_string());
        let (broker, _) = broker(response);

        let err = broker
            .request_download_token(&"arch".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Service { status: 403, error_id: Some(ref id), .. } if id == "denied"
        ));
    }
}
