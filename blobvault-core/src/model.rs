//! Wire model for attachment transfers
//!
//! Only the entity fields the transfer path reads or writes are modelled.
//! Field names follow the services' camelCase JSON.

use crate::chunk::BlobId;
use crate::error::{Result, VaultError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Element or list identifier assigned by the server
pub type Id = String;

/// Model version sent in the `v` header for file services
pub const FILES_MODEL_VERSION: &str = "49";

/// Model version sent in the `v` header for storage services
pub const STORAGE_MODEL_VERSION: &str = "4";

/// Type descriptor of the file data entity that owns uploaded blobs
pub fn file_data_type() -> TypeDescriptor {
    TypeDescriptor::new("files", "4")
}

/// `(list id, element id)` pair identifying a list element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTuple(pub Id, pub Id);

impl IdTuple {
    pub fn new(list_id: impl Into<Id>, element_id: impl Into<Id>) -> Self {
        Self(list_id.into(), element_id.into())
    }

    pub fn element_id(&self) -> &str {
        &self.1
    }
}

/// Application and type id of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub application: String,
    pub type_id: String,
}

impl TypeDescriptor {
    pub fn new(application: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            type_id: type_id.into(),
        }
    }
}

/// Storage endpoint candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetServer {
    pub url: String,
}

/// What an access token is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Read access to one archive
    Archive(Id),
    /// Write access to the archive owned by a group
    OwnerGroup(Id),
}

/// Scoped, time-limited storage access
///
/// Validity is enforced by the server. There is no client-side refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessInfo {
    pub storage_access_token: String,

    /// Ordered endpoint candidates. Only the first one is used.
    pub servers: Vec<TargetServer>,

    #[serde(default)]
    pub archive_id: Option<Id>,

    /// Blobs of this archive that belong to the requested file (downloads only)
    #[serde(default)]
    pub blobs: Vec<BlobId>,

    #[serde(skip)]
    pub scope: Option<AccessScope>,
}

impl AccessInfo {
    /// First endpoint in the server list
    pub fn primary_server(&self) -> Result<&TargetServer> {
        self.servers.first().ok_or(VaultError::NoStorageEndpoint)
    }

    pub fn with_scope(mut self, scope: AccessScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Server-issued handle proving a blob was stored
///
/// Distinct from the content-derived [`BlobId`] used for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobReferenceToken(pub String);

impl BlobReferenceToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attachment entity as seen by the transfer path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntity {
    #[serde(rename = "_id")]
    pub id: IdTuple,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub size: u64,
    /// File data element holding the content
    #[serde(default)]
    pub data: Option<Id>,
}

/// Content holder of a file, in one of two storage layouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    #[serde(rename = "_id")]
    pub id: Id,
    pub size: u64,
    /// Number of legacy data blocks, zero for chunked files
    #[serde(default)]
    pub blocks: u32,
    #[serde(default)]
    pub blobs: Vec<BlobId>,
}

/// Storage layout of a file, resolved once when a transfer starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageScheme {
    /// Whole ciphertext stored under the file data id
    Legacy(Id),
    /// Ciphertext split into blobs, listed in manifest order
    Chunked(Vec<BlobId>),
}

impl StorageScheme {
    pub fn resolve(file_data: &FileData) -> Result<Self> {
        if file_data.blocks > 0 {
            Ok(StorageScheme::Legacy(file_data.id.clone()))
        } else if !file_data.blobs.is_empty() {
            Ok(StorageScheme::Chunked(file_data.blobs.clone()))
        } else {
            Err(VaultError::Programming(format!(
                "file data {} has neither blocks nor blobs",
                file_data.id
            )))
        }
    }
}

/// In-memory attachment
#[derive(Debug, Clone)]
pub struct DataFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl DataFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_file(file: &FileEntity, data: impl Into<Bytes>) -> Self {
        Self::new(
            file.name.clone(),
            file.mime_type.clone().unwrap_or_else(|| BINARY_MIME_TYPE.to_string()),
            data,
        )
    }
}

/// Device-resident attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub name: String,
    pub mime_type: String,
    pub location: PathBuf,
    pub size: u64,
}

pub const BINARY_MIME_TYPE: &str = "application/octet-stream";

// ===== Service payloads =====

#[derive(Debug, Clone, Serialize)]
pub struct FileDataDataGet {
    pub file: IdTuple,
    pub base64: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDataDataPost {
    /// Plaintext size, decimal string on the wire
    pub size: String,
    pub group: Id,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDataReturnPost {
    pub file_data: Id,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBlobServicePostReturn {
    pub file_data: Id,
    pub access_info: AccessInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBlobServiceGetReturn {
    /// One entry per archive holding part of the file
    pub access_infos: Vec<AccessInfo>,
    /// Manifest: blob ids in payload order
    pub blobs: Vec<BlobId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobWriteData {
    #[serde(rename = "type")]
    pub type_descriptor: TypeDescriptor,
    pub archive_owner_group: Id,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobAccessTokenData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<BlobWriteData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_archive_id: Option<Id>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobAccessTokenReturn {
    pub blob_access_info: AccessInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDataGet {
    pub archive_id: Id,
    pub blob_id: BlobId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobReferenceDataPut {
    pub blob_reference_token: BlobReferenceToken,
    #[serde(rename = "type")]
    pub type_descriptor: TypeDescriptor,
    pub instance_element_id: Id,
}
