//! BlobVault transfer client
//!
//! Encrypted attachment transfers against the file, trust and storage
//! services:
//! - In-memory uploads and downloads, chunked or legacy single-blob
//! - Native transfers of device files through a [`native::NativeFileApp`]
//! - Process-wide handling of server suspension (back-pressure)
//! - Configuration loading from `~/.blobvault/config.toml`

pub mod auth;
pub mod blob_client;
pub mod broker;
pub mod config;
pub mod context;
pub mod facade;
pub mod native;
pub mod service;
pub mod suspension;
pub mod transfer;
pub mod transport;

pub use auth::{AuthProvider, GroupType, SessionCredentials, SessionKeyResolver, StaticKeyResolver};
pub use blob_client::BlobClient;
pub use broker::AccessTokenBroker;
pub use config::BlobVaultConfig;
pub use context::{TransferContext, TransferSettings};
pub use facade::AttachmentFacade;
pub use native::{LocalFileApp, NativeFileApp, NativeTransfer, TempFileGuard};
pub use suspension::{SuspensionController, SuspensionState};
pub use transfer::{
    build_transfer, AttachmentOutput, AttachmentSource, AttachmentTransfer, InMemoryTransfer,
    TransferMode,
};
pub use transport::{HttpTransport, RestRequest, RestResponse, Transport};

/// Legacy single-blob file data service
pub const FILE_DATA_SERVICE_PATH: &str = "/rest/files/filedataservice";

/// Chunked file data service
pub const FILE_BLOB_SERVICE_PATH: &str = "/rest/files/fileblobservice";

/// File data entity collection
pub const FILE_DATA_ENTITY_PATH: &str = "/rest/files/filedata";

/// Blob storage on the storage servers
pub const BLOB_SERVICE_PATH: &str = "/rest/storage/blobservice";

/// Trust service issuing storage access
pub const BLOB_ACCESS_TOKEN_SERVICE_PATH: &str = "/rest/storage/blobaccesstokenservice";

/// Registration of stored blobs with their owning entity
pub const BLOB_REFERENCE_SERVICE_PATH: &str = "/rest/storage/blobreferenceservice";
