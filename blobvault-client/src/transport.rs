//! Transport layer
//!
//! The transfer client consumes HTTP through the [`Transport`] trait. A
//! transport performs exactly one exchange and reports the raw outcome:
//! non-success statuses are returned as responses, not errors, so the
//! caller can tell suspension apart from failure.

use async_trait::async_trait;
use blobvault_core::error::{Result, VaultError};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Request headers, merged per request
pub type Headers = BTreeMap<String, String>;

/// Protocol version header
pub const VERSION_HEADER: &str = "v";

/// Storage access token header
pub const STORAGE_ACCESS_TOKEN_HEADER: &str = "storageAccessToken";

/// Query parameter carrying the body of GET requests
pub const BODY_QUERY_PARAM: &str = "_body";

const SUSPENSION_TIME_HEADERS: [&str; 2] = ["suspension-time", "retry-after"];
const ERROR_ID_HEADER: &str = "error-id";
const PRECONDITION_HEADER: &str = "precondition";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Json,
    Binary,
}

impl MediaType {
    pub fn content_type(self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::Binary => "application/octet-stream",
        }
    }
}

/// One outbound request
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub media_type: MediaType,
    /// Endpoint to use instead of the default origin
    pub base_url: Option<String>,
}

impl RestRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            media_type: MediaType::Json,
            base_url: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>, media_type: MediaType) -> Self {
        self.body = Some(body.into());
        self.media_type = media_type;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of one exchange
#[derive(Debug, Clone, Default)]
pub struct RestResponse {
    pub status: u16,
    pub body: Bytes,
    pub suspension_time: Option<Duration>,
    pub error_id: Option<String>,
    pub precondition: Option<String>,
}

impl RestResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Back-pressure response with the given window
    pub fn suspended(status: u16, retry_after: Duration) -> Self {
        Self {
            status,
            suspension_time: Some(retry_after),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map the response onto the error taxonomy
    pub fn into_result(self) -> Result<Bytes> {
        if self.is_success() {
            Ok(self.body)
        } else if let Some(retry_after) = suspension_window(self.status, self.suspension_time) {
            Err(VaultError::Suspended { retry_after })
        } else {
            Err(VaultError::from_status(
                self.status,
                self.error_id,
                self.precondition,
            ))
        }
    }
}

/// A suspension response is a 429 or 503 that carries a positive wait time
pub fn suspension_window(status: u16, suspension_time: Option<Duration>) -> Option<Duration> {
    match (status, suspension_time) {
        (429 | 503, Some(time)) if !time.is_zero() => Some(time),
        _ => None,
    }
}

/// Read suspension time, error id and precondition from response headers
pub(crate) fn parse_response_meta(
    headers: &HeaderMap,
) -> (Option<Duration>, Option<String>, Option<String>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    let suspension_time = SUSPENSION_TIME_HEADERS
        .iter()
        .find_map(|name| header(name))
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    (suspension_time, header(ERROR_ID_HEADER), header(PRECONDITION_HEADER))
}

/// Join base url, path and query parameters
pub fn build_url(base: &str, path: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))
        .map_err(|e| VaultError::Configuration(format!("invalid url {}{}: {}", base, path, e)))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Request/response plumbing consumed by the transfer client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange. Errors are reserved for transport failures.
    async fn request(&self, request: RestRequest) -> Result<RestResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    origin: String,
}

impl HttpTransport {
    /// Create a transport for the given default origin
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: RestRequest) -> Result<RestResponse> {
        let base = request.base_url.as_deref().unwrap_or(&self.origin);

        // GET bodies travel as a query parameter
        let mut query = request.query.clone();
        let mut body = request.body.clone();
        if request.method == HttpMethod::Get {
            if let Some(get_body) = body.take() {
                let encoded = String::from_utf8(get_body.to_vec())
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                query.push((BODY_QUERY_PARAM.to_string(), encoded));
            }
        }

        let url = build_url(base, &request.path, &query)?;
        debug!(method = ?request.method, path = %request.path, "Sending request");

        let mut builder = self.client.request(request.method.as_reqwest(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", request.media_type.content_type())
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let (suspension_time, error_id, precondition) = parse_response_meta(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;

        Ok(RestResponse {
            status,
            body,
            suspension_time,
            error_id,
            precondition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_suspension_window() {
        let five = Some(Duration::from_secs(5));
        assert_eq!(suspension_window(429, five), five);
        assert_eq!(suspension_window(503, five), five);
        assert_eq!(suspension_window(500, five), None);
        assert_eq!(suspension_window(429, None), None);
        assert_eq!(suspension_window(503, Some(Duration::ZERO)), None);
    }

    #[test]
    fn test_into_result() {
        assert_eq!(
            RestResponse::ok(Bytes::from_static(b"data")).into_result().unwrap(),
            Bytes::from_static(b"data")
        );

        let err = RestResponse::suspended(503, Duration::from_secs(3))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, VaultError::Suspended { retry_after } if retry_after == Duration::from_secs(3)));

        let mut response = RestResponse::with_status(412);
        response.precondition = Some("lock".to_string());
        assert!(matches!(
            response.into_result(),
            Err(VaultError::PreconditionFailed { .. })
        ));

        assert!(matches!(
            RestResponse::with_status(500).into_result(),
            Err(VaultError::Service { status: 500, .. })
        ));
    }

    #[test]
    fn test_parse_response_meta() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));
        headers.insert("error-id", HeaderValue::from_static("err-1"));
        headers.insert("precondition", HeaderValue::from_static("lock.1"));

        let (time, error_id, precondition) = parse_response_meta(&headers);
        assert_eq!(time, Some(Duration::from_secs(7)));
        assert_eq!(error_id.as_deref(), Some("err-1"));
        assert_eq!(precondition.as_deref(), Some("lock.1"));
    }

    #[test]
    fn test_build_url() {
        let url = build_url(
            "https://storage.example.com/",
            "/rest/storage/blobservice",
            &[("blobId".to_string(), "ab+/cd==".to_string())],
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("storage.example.com"));
        assert_eq!(url.path(), "/rest/storage/blobservice");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("blobId".to_string(), "ab+/cd==".to_string())]);
    }

    #[test]
    fn test_request_builder() {
        let mut headers = Headers::new();
        headers.insert(VERSION_HEADER.to_string(), "4".to_string());

        let request = RestRequest::new(HttpMethod::Put, "/p")
            .query("blobId", "x")
            .headers(headers)
            .body(Bytes::from_static(b"abc"), MediaType::Binary)
            .base_url("https://s1");

        assert_eq!(request.query_value("blobId"), Some("x"));
        assert_eq!(request.headers.get("v").map(String::as_str), Some("4"));
        assert_eq!(request.media_type, MediaType::Binary);
        assert_eq!(request.base_url.as_deref(), Some("https://s1"));
    }
}
