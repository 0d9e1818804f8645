use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

use super::{Account, AccountProjection, AccountRef};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_OFFSET: u32 = 0;

/// Raw paging parameters as sent by a client, before validation
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RecommendationParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl RecommendationParams {
    /// Applies defaults and range checks, producing a request for the core
    pub fn into_request(self, requester: Option<AccountRef>) -> AppResult<RecommendationRequest> {
        let limit = self.limit.unwrap_or(i64::from(DEFAULT_LIMIT));
        if !(1..=i64::from(MAX_LIMIT)).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            )));
        }

        let offset = self.offset.unwrap_or(i64::from(DEFAULT_OFFSET));
        let offset = u32::try_from(offset).map_err(|_| {
            AppError::InvalidInput(format!("offset must be a non-negative integer, got {}", offset))
        })?;

        Ok(RecommendationRequest {
            requester,
            limit: limit as u32,
            offset,
        })
    }
}

/// A validated page request for recommendations
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub requester: Option<AccountRef>,
    pub limit: u32,
    pub offset: u32,
}

/// Candidate as supplied by the external recommendation engine.
///
/// Only `username` and `host` are read; the object itself is kept as received
/// so an unresolved candidate goes back to the client exactly as the engine
/// sent it, unknown fields and omissions included. A missing or `null` host
/// denotes an account local to this instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct CandidateDescriptor {
    username: String,
    host: Option<String>,
    raw: Map<String, Value>,
}

impl CandidateDescriptor {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// `None` for a candidate local to this instance
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// `username@host`, or the bare username for a local candidate
    pub fn acct(&self) -> String {
        match &self.host {
            Some(host) => format!("{}@{}", self.username, host),
            None => self.username.clone(),
        }
    }

    /// Any other field of the engine's object, e.g. `"avatarUrl"`
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}

impl TryFrom<Map<String, Value>> for CandidateDescriptor {
    type Error = String;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let username = match raw.get("username") {
            Some(Value::String(username)) => username.clone(),
            Some(other) => return Err(format!("username must be a string, got {}", other)),
            None => return Err("missing field `username`".to_string()),
        };

        let host = match raw.get("host") {
            None | Some(Value::Null) => None,
            Some(Value::String(host)) => Some(host.clone()),
            Some(other) => return Err(format!("host must be a string or null, got {}", other)),
        };

        Ok(Self {
            username,
            host,
            raw,
        })
    }
}

impl From<CandidateDescriptor> for Map<String, Value> {
    fn from(descriptor: CandidateDescriptor) -> Self {
        descriptor.raw
    }
}

/// An account that passed the internal filters, with its balance ratio
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub account: Account,
    pub balance: f64,
}

impl ScoredCandidate {
    pub fn new(account: Account) -> Self {
        let balance = account.balance();
        Self { account, balance }
    }
}

/// One element of a recommendation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecommendedAccount {
    Packed(AccountProjection),
    /// An external candidate that could not be resolved, passed through verbatim
    Unresolved(CandidateDescriptor),
}
