//! User model - owners of tasks and recipients of notifications.

use serde::{Deserialize, Serialize};
use crate::id::UserId;
use crate::Time;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Email address (unique across users)
    pub email: String,

    /// Credential hash, owned by the authentication layer
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

impl User {
    /// Create a new user.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a credential hash produced elsewhere.
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = hash.into();
        self
    }
}
