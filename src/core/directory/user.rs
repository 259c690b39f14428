// src/core/directory/user.rs

use crate::core::acl::Role;
use crate::core::credential::TemporarySecret;
use crate::core::visibility::TagFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Opaque, immutable user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        UserId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        UserId(id)
    }
}

/// A user as persisted by the store. This is the only type that carries the
/// credential hash; directory operations hand out [`User`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
    pub credential_hash: String,
    #[serde(default)]
    pub must_change_credential: bool,
    #[serde(default)]
    pub is_first_login: bool,
    #[serde(default)]
    pub visible_tags: BTreeSet<String>,
    #[serde(default)]
    pub hidden_tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Projects the record into its public form, dropping the hash.
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            must_change_credential: self.must_change_credential,
            is_first_login: self.is_first_login,
            visible_tags: self.visible_tags.clone(),
            hidden_tags: self.hidden_tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        }
    }
}

/// The public representation of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub must_change_credential: bool,
    pub is_first_login: bool,
    pub visible_tags: BTreeSet<String>,
    pub hidden_tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// The visibility filter the resource inventory applies for this user.
    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(self.visible_tags.clone(), self.hidden_tags.clone())
    }
}

/// Input for `UserDirectory::create`. The role arrives as text and is parsed
/// strictly at the directory boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub visible_tags: BTreeSet<String>,
    #[serde(default)]
    pub hidden_tags: BTreeSet<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_visible_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hidden_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Input for `UserDirectory::update`. `None` leaves a field unchanged; a
/// supplied tag set replaces the stored one, so an empty set clears it.
/// `must_change_credential` only accepts `Some(true)`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub must_change_credential: Option<bool>,
    #[serde(default)]
    pub visible_tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub hidden_tags: Option<BTreeSet<String>>,
}

/// The result of `UserDirectory::create`. `temporary_secret` is present only
/// when no secret was supplied, and this is the one time it is available.
#[derive(Debug)]
pub struct CreatedUser {
    pub user: User,
    pub temporary_secret: Option<TemporarySecret>,
}
