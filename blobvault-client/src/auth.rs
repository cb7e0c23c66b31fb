//! Authentication collaborators
//!
//! Login and credential handling live outside this crate. The transfer
//! path only needs the header set that authenticates a request and the
//! id of the group that owns uploaded attachments.

use crate::transport::Headers;
use async_trait::async_trait;
use blobvault_core::error::{Result, VaultError};
use blobvault_core::model::{FileEntity, Id};
use blobvault_core::SessionKey;

/// Header carrying the user's access token
pub const ACCESS_TOKEN_HEADER: &str = "accessToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    User,
    Mail,
}

/// Source of authentication headers and group memberships
pub trait AuthProvider: Send + Sync {
    fn auth_headers(&self) -> Headers;

    fn group_id(&self, group_type: GroupType) -> Result<Id>;
}

/// Credentials of a logged-in session
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub access_token: String,
    pub user_group_id: Option<Id>,
    pub mail_group_id: Option<Id>,
}

impl SessionCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user_group_id: None,
            mail_group_id: None,
        }
    }

    pub fn with_mail_group(mut self, group_id: impl Into<Id>) -> Self {
        self.mail_group_id = Some(group_id.into());
        self
    }

    pub fn with_user_group(mut self, group_id: impl Into<Id>) -> Self {
        self.user_group_id = Some(group_id.into());
        self
    }
}

impl AuthProvider for SessionCredentials {
    fn auth_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert(ACCESS_TOKEN_HEADER.to_string(), self.access_token.clone());
        headers
    }

    fn group_id(&self, group_type: GroupType) -> Result<Id> {
        let id = match group_type {
            GroupType::User => self.user_group_id.clone(),
            GroupType::Mail => self.mail_group_id.clone(),
        };
        id.ok_or_else(|| {
            VaultError::Configuration(format!("no {:?} group in session credentials", group_type))
        })
    }
}

/// Resolves the session key of a file before a transfer
#[async_trait]
pub trait SessionKeyResolver: Send + Sync {
    async fn resolve(&self, file: &FileEntity) -> Result<SessionKey>;
}

/// Resolver that hands out one key the caller already holds
pub struct StaticKeyResolver(SessionKey);

impl StaticKeyResolver {
    pub fn new(key: SessionKey) -> Self {
        Self(key)
    }
}

#[async_trait]
impl SessionKeyResolver for StaticKeyResolver {
    async fn resolve(&self, _file: &FileEntity) -> Result<SessionKey> {
        Ok(self.0.clone())
    }
}
