//! In-memory stand-in for the file, trust and storage services

#![allow(dead_code)]

use async_trait::async_trait;
use blobvault_client::transport::{HttpMethod, RestRequest, RestResponse, Transport};
use blobvault_client::{
    SessionCredentials, StaticKeyResolver, TransferContext, TransferSettings,
    BLOB_ACCESS_TOKEN_SERVICE_PATH, BLOB_REFERENCE_SERVICE_PATH, BLOB_SERVICE_PATH,
    FILE_BLOB_SERVICE_PATH, FILE_DATA_ENTITY_PATH, FILE_DATA_SERVICE_PATH,
};
use blobvault_core::error::Result;
use blobvault_core::model::{FileEntity, IdTuple};
use blobvault_core::SessionKey;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const STORAGE_URL: &str = "https://storage-1.example.com";
pub const ARCHIVE_ID: &str = "archive-1";
pub const FILE_DATA_ID: &str = "fd-1";

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: HttpMethod,
    pub path: String,
    pub base_url: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Bytes,
    pub at: Instant,
}

#[derive(Default)]
struct State {
    /// Stored blobs by base64 blob id
    blobs: HashMap<String, Bytes>,
    /// Blob ids in registration order
    manifest: Vec<String>,
    references: Vec<Value>,
    legacy_data: Option<Bytes>,
    requests: Vec<Recorded>,
    /// Scripted responses, consumed by the first matching request
    scripted: VecDeque<(HttpMethod, String, RestResponse)>,
    /// Blob ids served by the blob set listing but never stored
    withheld: Vec<String>,
}

/// Mock backend holding everything in memory
#[derive(Default)]
pub struct MockServices {
    state: Mutex<State>,
    /// Number of archives the blobs of a file are spread over
    archives: usize,
    /// List blobs in reverse within each blob set
    reverse_sets: bool,
}

impl MockServices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            archives: 1,
            ..Default::default()
        })
    }

    pub fn with_layout(archives: usize, reverse_sets: bool) -> Arc<Self> {
        Arc::new(Self {
            archives,
            reverse_sets,
            ..Default::default()
        })
    }

    /// Answer the next matching request with `response` instead
    pub fn script(&self, method: HttpMethod, path: &str, response: RestResponse) {
        self.state
            .lock()
            .scripted
            .push_back((method, path.to_string(), response));
    }

    /// Drop a stored blob so downloads miss it
    pub fn withhold_blob(&self, position: usize) {
        let mut state = self.state.lock();
        let id = state.manifest[position].clone();
        state.blobs.remove(&id);
        state.withheld.push(id);
    }

    pub fn set_legacy_data(&self, data: Bytes) {
        self.state.lock().legacy_data = Some(data);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().requests.clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn references(&self) -> Vec<Value> {
        self.state.lock().references.clone()
    }

    pub fn manifest(&self) -> Vec<String> {
        self.state.lock().manifest.clone()
    }

    fn access_info(archive_id: Option<&str>, blobs: &[String]) -> Value {
        let mut info = json!({
            "storageAccessToken": "storage-token",
            "servers": [{"url": STORAGE_URL}, {"url": "https://storage-2.example.com"}],
            "blobs": blobs,
        });
        if let Some(archive_id) = archive_id {
            info["archiveId"] = json!(archive_id);
        }
        info
    }

    fn json(value: Value) -> RestResponse {
        RestResponse::ok(serde_json::to_vec(&value).unwrap())
    }

    fn handle(&self, request: &RestRequest) -> RestResponse {
        let mut state = self.state.lock();
        let body: Value = request
            .body
            .as_ref()
            .filter(|_| request.media_type == blobvault_client::transport::MediaType::Json)
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(Value::Null);

        match (request.method, request.path.as_str()) {
            (HttpMethod::Post, FILE_BLOB_SERVICE_PATH) => Self::json(json!({
                "fileData": FILE_DATA_ID,
                "accessInfo": Self::access_info(None, &[]),
            })),
            (HttpMethod::Get, FILE_BLOB_SERVICE_PATH) => {
                let listed: Vec<String> = state
                    .manifest
                    .iter()
                    .filter(|id| !state.withheld.contains(id))
                    .cloned()
                    .collect();
                let per_set = listed.len().div_ceil(self.archives.max(1)).max(1);
                let mut infos = Vec::new();
                for (set, ids) in listed.chunks(per_set).enumerate() {
                    let mut ids: Vec<String> = ids.to_vec();
                    if self.reverse_sets {
                        ids.reverse();
                    }
                    infos.push(Self::access_info(Some(&format!("{}-{}", ARCHIVE_ID, set)), &ids));
                }
                Self::json(json!({ "accessInfos": infos, "blobs": state.manifest }))
            }
            (HttpMethod::Post, FILE_DATA_SERVICE_PATH) => Self::json(json!({ "fileData": FILE_DATA_ID })),
            (HttpMethod::Put, FILE_DATA_SERVICE_PATH) => {
                state.legacy_data = request.body.clone();
                RestResponse::ok(Bytes::new())
            }
            (HttpMethod::Get, FILE_DATA_SERVICE_PATH) => match &state.legacy_data {
                Some(data) => RestResponse::ok(data.clone()),
                None => RestResponse::with_status(404),
            },
            (HttpMethod::Get, path) if path.starts_with(FILE_DATA_ENTITY_PATH) => {
                let blocks = u32::from(state.legacy_data.is_some() && state.manifest.is_empty());
                Self::json(json!({
                    "_id": path.rsplit('/').next().unwrap_or_default(),
                    "size": 0,
                    "blocks": blocks,
                    "blobs": state.manifest,
                }))
            }
            (HttpMethod::Post, BLOB_ACCESS_TOKEN_SERVICE_PATH) => {
                let archive = body["readArchiveId"].as_str().unwrap_or(ARCHIVE_ID).to_string();
                Self::json(json!({ "blobAccessInfo": Self::access_info(Some(&archive), &[]) }))
            }
            (HttpMethod::Put, BLOB_SERVICE_PATH) => {
                let blob_id = request.query_value("blobId").unwrap_or_default().to_string();
                state
                    .blobs
                    .insert(blob_id.clone(), request.body.clone().unwrap_or_default());
                RestResponse::ok(format!("ref-{}", blob_id))
            }
            (HttpMethod::Get, BLOB_SERVICE_PATH) => {
                let blob_id = body["blobId"].as_str().unwrap_or_default();
                match state.blobs.get(blob_id) {
                    Some(data) => RestResponse::ok(data.clone()),
                    None => RestResponse::with_status(404),
                }
            }
            (HttpMethod::Put, BLOB_REFERENCE_SERVICE_PATH) => {
                if let Some(token) = body["blobReferenceToken"].as_str() {
                    let blob_id = token.trim_start_matches("ref-").to_string();
                    state.manifest.push(blob_id);
                }
                state.references.push(body);
                RestResponse::ok(Bytes::new())
            }
            _ => RestResponse::with_status(404),
        }
    }
}

#[async_trait]
impl Transport for MockServices {
    async fn request(&self, request: RestRequest) -> Result<RestResponse> {
        {
            let mut state = self.state.lock();
            state.requests.push(Recorded {
                method: request.method,
                path: request.path.clone(),
                base_url: request.base_url.clone(),
                query: request.query.clone(),
                body: request.body.clone().unwrap_or_default(),
                at: Instant::now(),
            });

            let position = state
                .scripted
                .iter()
                .position(|(method, path, _)| *method == request.method && *path == request.path);
            if let Some(position) = position {
                if let Some((_, _, response)) = state.scripted.remove(position) {
                    return Ok(response);
                }
            }
        }
        Ok(self.handle(&request))
    }
}

pub fn settings(max_chunk_size: usize) -> TransferSettings {
    TransferSettings {
        origin: "https://files.example.com".to_string(),
        max_chunk_size,
        ..Default::default()
    }
}

pub fn context(services: Arc<MockServices>, key: SessionKey, settings: TransferSettings) -> TransferContext {
    TransferContext::new(
        services,
        Arc::new(SessionCredentials::new("access-token").with_mail_group("mail-group")),
        Arc::new(StaticKeyResolver::new(key)),
        settings,
    )
}

pub fn file_entity(size: u64) -> FileEntity {
    FileEntity {
        id: IdTuple::new("file-list", "file-1"),
        name: "attachment.bin".to_string(),
        mime_type: Some("application/octet-stream".to_string()),
        size,
        data: Some(FILE_DATA_ID.to_string()),
    }
}

/// Deterministic test payload
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

pub const FIVE_SECONDS: Duration = Duration::from_secs(5);
