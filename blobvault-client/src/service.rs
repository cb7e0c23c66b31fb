//! JSON entity service framing
//!
//! Wraps a [`Transport`] with the session's auth headers and the model
//! version header. Every call is exactly one round trip; suspension
//! responses come back as [`VaultError::Suspended`] for the caller to
//! route through the suspension controller.

use crate::auth::AuthProvider;
use crate::transport::{
    Headers, HttpMethod, MediaType, RestRequest, Transport, VERSION_HEADER,
};
use blobvault_core::error::{Result, VaultError};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Shared handle to the transport and the session credentials
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
}

impl ServiceClient {
    pub fn new(transport: Arc<dyn Transport>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { transport, auth }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    /// Auth headers plus the `v` header
    pub fn headers(&self, model_version: &str) -> Headers {
        let mut headers = self.auth.auth_headers();
        headers.insert(VERSION_HEADER.to_string(), model_version.to_string());
        headers
    }

    /// Send a prepared request and map the response onto the error taxonomy
    pub async fn send(&self, request: RestRequest) -> Result<Bytes> {
        self.transport.request(request).await?.into_result()
    }

    /// JSON request with a JSON response
    pub async fn request_json<Req, Resp>(
        &self,
        method: HttpMethod,
        path: &str,
        model_version: &str,
        body: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let bytes = self.request_bytes(method, path, model_version, body).await?;
        serde_json::from_slice(&bytes).map_err(VaultError::from)
    }

    /// JSON request whose response body is ignored
    pub async fn request_void<Req>(
        &self,
        method: HttpMethod,
        path: &str,
        model_version: &str,
        body: &Req,
    ) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.request_bytes(method, path, model_version, body).await?;
        Ok(())
    }

    /// JSON request returning the raw response body
    pub async fn request_bytes<Req>(
        &self,
        method: HttpMethod,
        path: &str,
        model_version: &str,
        body: &Req,
    ) -> Result<Bytes>
    where
        Req: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        let request = RestRequest::new(method, path)
            .headers(self.headers(model_version))
            .body(body, MediaType::Json);
        self.send(request).await
    }

    /// Load one entity by path
    pub async fn load<T: DeserializeOwned>(&self, path: &str, model_version: &str) -> Result<T> {
        let request = RestRequest::new(HttpMethod::Get, path).headers(self.headers(model_version));
        let bytes = self.send(request).await?;
        serde_json::from_slice(&bytes).map_err(VaultError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionCredentials, ACCESS_TOKEN_HEADER};
    use crate::transport::RestResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Recorder {
        requests: Mutex<Vec<RestRequest>>,
        response: RestResponse,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn request(&self, request: RestRequest) -> Result<RestResponse> {
            self.requests.lock().push(request);
            Ok(self.response.clone())
        }
    }

    fn client(response: RestResponse) -> (ServiceClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            requests: Mutex::new(Vec::new()),
            response,
        });
        let client = ServiceClient::new(
            recorder.clone(),
            Arc::new(SessionCredentials::new("tok")),
        );
        (client, recorder)
    }

    #[tokio::test]
    async fn test_request_json_sets_headers() {
        let (client, recorder) = client(RestResponse::ok(Bytes::from_static(br#"{"a":1}"#)));

        let value: serde_json::Value = client
            .request_json(HttpMethod::Post, "/rest/x", "4", &serde_json::json!({"k": "v"}))
            .await
            .unwrap();
        assert_eq!(value["a"], 1);

        let requests = recorder.requests.lock();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.headers.get(ACCESS_TOKEN_HEADER).map(String::as_str), Some("tok"));
        assert_eq!(request.headers.get(VERSION_HEADER).map(String::as_str), Some("4"));
        assert_eq!(request.media_type, MediaType::Json);
        assert_eq!(request.body.as_deref(), Some(br#"{"k":"v"}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_suspension_surfaces_as_signal() {
        let (client, _) = client(RestResponse::suspended(429, Duration::from_secs(2)));
        let result = client
            .request_void(HttpMethod::Put, "/rest/x", "4", &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(VaultError::Suspended { .. })));
    }

    #[tokio::test]
    async fn test_malformed_response_body() {
        let (client, _) = client(RestResponse::ok(Bytes::from_static(b"not json")));
        let result: Result<serde_json::Value> = client.load("/rest/x/1", "4").await;
        assert!(matches!(result, Err(VaultError::Serialization(_))));
    }
}
