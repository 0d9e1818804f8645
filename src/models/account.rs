use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of an account, local or remote
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account record as stored by the instance
///
/// `host` is `None` for local accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub host: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub notes_count: i64,
    pub is_bot: bool,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Following count divided by followers count.
    ///
    /// Callers must make sure `followers_count` is non-zero.
    pub fn balance(&self) -> f64 {
        self.following_count as f64 / self.followers_count as f64
    }

    /// `username` for local accounts, `username@host` for remote ones
    pub fn acct(&self) -> String {
        match &self.host {
            Some(host) => format!("{}@{}", self.username, host),
            None => self.username.clone(),
        }
    }
}

/// The identity a request is made on behalf of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: AccountId,
    pub username: String,
}

impl From<&Account> for AccountRef {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
        }
    }
}

/// Detail-level, viewer-specific rendering of an account returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProjection {
    pub id: AccountId,
    pub username: String,
    pub host: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub notes_count: i64,
    pub is_bot: bool,
    pub updated_at: DateTime<Utc>,
    /// The viewer follows this account
    pub is_following: bool,
    /// This account follows the viewer
    pub is_followed: bool,
}

impl AccountProjection {
    pub fn detail(account: &Account, is_following: bool, is_followed: bool) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            host: account.host.clone(),
            name: account.name.clone(),
            description: account.description.clone(),
            avatar_url: account.avatar_url.clone(),
            followers_count: account.followers_count,
            following_count: account.following_count,
            notes_count: account.notes_count,
            is_bot: account.is_bot,
            updated_at: account.updated_at,
            is_following,
            is_followed,
        }
    }
}
