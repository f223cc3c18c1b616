use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::utils::id::UserId;

/// Who created an order and may manage it. Persisted with the order; the
/// token never shows up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterIdentity {
    pub user_id: UserId,
    pub identity_provider: String,
    pub token: String,
}

impl RequesterIdentity {
    pub fn new(user_id: impl Into<String>, identity_provider: impl Into<String>, token: impl Into<String>) -> Self {
        RequesterIdentity { user_id: UserId::new(user_id), identity_provider: identity_provider.into(), token: token.into() }
    }

    /// Same user as seen from the same identity provider.
    pub fn same_owner(&self, other: &RequesterIdentity) -> bool {
        self.user_id == other.user_id && self.identity_provider == other.identity_provider
    }
}

impl fmt::Debug for RequesterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequesterIdentity")
            .field("user_id", &self.user_id.id)
            .field("identity_provider", &self.identity_provider)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Credential handed to a cloud plugin.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredential {
    pub user: String,
    pub secret: String,
}

impl CloudCredential {
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        CloudCredential { user: user.into(), secret: secret.into() }
    }
}

impl fmt::Debug for CloudCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredential").field("user", &self.user).field("secret", &"<redacted>").finish()
    }
}
