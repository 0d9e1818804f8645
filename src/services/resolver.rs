//! Maps a bare `(username, host)` pair to an account record
//!
//! Local handles are looked up in the directory. Remote handles are looked up
//! in the directory first and, when unknown, discovered through WebFinger and
//! the ActivityPub actor document.

use chrono::Utc;
use reqwest::{header, Client as HttpClient};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{Account, AccountId},
    services::store::AccountDirectory,
};

const REMOTE_ACCOUNT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const ACTIVITY_JSON: &str = "application/activity+json";
const LD_JSON: &str = "application/ld+json";

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves `username@host` to an account, or fails with an error the caller
    /// is expected to treat as "unresolvable"
    async fn resolve(&self, username: &str, host: &str) -> AppResult<Account>;
}

#[derive(Debug, Deserialize)]
struct WebFingerResponse {
    #[serde(default)]
    links: Vec<WebFingerLink>,
}

#[derive(Debug, Deserialize)]
struct WebFingerLink {
    rel: String,
    #[serde(rename = "type", default)]
    media_type: Option<String>,
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorDocument {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    preferred_username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    icon: Option<ActorIcon>,
}

#[derive(Debug, Deserialize)]
struct ActorIcon {
    #[serde(default)]
    url: Option<String>,
}

impl ActorDocument {
    fn into_account(self, host: &str) -> Account {
        Account {
            id: AccountId(self.id),
            username: self.preferred_username,
            host: Some(host.to_lowercase()),
            name: self.name,
            description: self.summary,
            avatar_url: self.icon.and_then(|icon| icon.url),
            followers_count: 0,
            following_count: 0,
            notes_count: 0,
            is_bot: self.kind == "Service" || self.kind == "Application",
            updated_at: Utc::now(),
        }
    }
}

/// Resolver backed by the local directory with WebFinger fallback for unknown
/// remote accounts
#[derive(Clone)]
pub struct FederatedResolver {
    directory: Arc<dyn AccountDirectory>,
    http_client: HttpClient,
    local_hostname: String,
    remote_scheme: String,
    cache: Option<Cache>,
}

impl FederatedResolver {
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        http_client: HttpClient,
        local_hostname: String,
        remote_scheme: String,
    ) -> Self {
        Self {
            directory,
            http_client,
            local_hostname,
            remote_scheme,
            cache: None,
        }
    }

    /// Caches WebFinger results in Redis
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn is_local(&self, host: &str) -> bool {
        host.is_empty() || host.eq_ignore_ascii_case(&self.local_hostname)
    }

    async fn discover(&self, username: &str, host: &str) -> AppResult<Account> {
        let actor_url = self.webfinger(username, host).await?;

        let response = self
            .http_client
            .get(&actor_url)
            .header(header::ACCEPT, ACTIVITY_JSON)
            .send()
            .await
            .map_err(|e| AppError::ResolutionFailed(format!("actor fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ResolutionFailed(format!(
                "actor {} returned status {}",
                actor_url,
                response.status()
            )));
        }

        let actor: ActorDocument = response
            .json()
            .await
            .map_err(|e| AppError::ResolutionFailed(format!("invalid actor document: {}", e)))?;

        tracing::info!(
            username = %username,
            host = %host,
            actor = %actor.id,
            "Discovered remote account"
        );

        Ok(actor.into_account(host))
    }

    /// Returns the actor URL advertised by the host's WebFinger endpoint
    async fn webfinger(&self, username: &str, host: &str) -> AppResult<String> {
        let url = format!("{}://{}/.well-known/webfinger", self.remote_scheme, host);
        let resource = format!("acct:{}@{}", username, host);

        let response = self
            .http_client
            .get(&url)
            .query(&[("resource", resource.as_str())])
            .send()
            .await
            .map_err(|e| AppError::ResolutionFailed(format!("webfinger failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ResolutionFailed(format!(
                "webfinger for {} returned status {}",
                resource,
                response.status()
            )));
        }

        let finger: WebFingerResponse = response
            .json()
            .await
            .map_err(|e| AppError::ResolutionFailed(format!("invalid webfinger response: {}", e)))?;

        finger
            .links
            .into_iter()
            .find(|link| {
                link.rel == "self"
                    && link
                        .media_type
                        .as_deref()
                        .is_some_and(|t| t == ACTIVITY_JSON || t.starts_with(LD_JSON))
            })
            .and_then(|link| link.href)
            .ok_or_else(|| {
                AppError::ResolutionFailed(format!("no actor link in webfinger for {}", resource))
            })
    }
}

#[async_trait::async_trait]
impl IdentityResolver for FederatedResolver {
    async fn resolve(&self, username: &str, host: &str) -> AppResult<Account> {
        if self.is_local(host) {
            return self
                .directory
                .find_local(username)
                .await?
                .ok_or_else(|| {
                    AppError::ResolutionFailed(format!("no local account named {}", username))
                });
        }

        if let Some(account) = self.directory.find_remote(username, host).await? {
            return Ok(account);
        }

        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::RemoteAccount(format!("{}@{}", username, host)),
                REMOTE_ACCOUNT_CACHE_TTL,
                self.discover(username, host)
            ),
            None => self.discover(username, host).await,
        }
    }
}
