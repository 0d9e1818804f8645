//! Read-only views of instance state consumed by the recommendation core
//!
//! The account population, follow graph, hidden set and instance metadata are
//! owned elsewhere. The Postgres adapters live in `db::postgres`.

use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{Account, AccountId, InstancePolicy},
    services::ranking::ActivityCriteria,
};

/// Queries over the account population
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Accounts matching the activity thresholds in `criteria`, minus `exclude`,
    /// ordered by followers count descending.
    async fn active_accounts(
        &self,
        criteria: &ActivityCriteria,
        exclude: &HashSet<AccountId>,
    ) -> AppResult<Vec<Account>>;

    async fn find_by_id(&self, id: &AccountId) -> AppResult<Option<Account>>;

    /// Local account by username (case-insensitive)
    async fn find_local(&self, username: &str) -> AppResult<Option<Account>>;

    /// Already-known remote account by username and host (case-insensitive)
    async fn find_remote(&self, username: &str, host: &str) -> AppResult<Option<Account>>;
}

/// Follow-edge membership
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FollowGraph: Send + Sync {
    /// Accounts followed by `id`, plus `id` itself
    async fn friend_ids(&self, id: &AccountId) -> AppResult<Vec<AccountId>>;

    async fn is_following(&self, follower: &AccountId, followee: &AccountId) -> AppResult<bool>;
}

/// Administratively hidden accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HiddenAccounts: Send + Sync {
    /// Accounts hidden from everyone
    async fn hidden_ids(&self) -> AppResult<Vec<AccountId>>;

    /// Accounts `requester` has muted
    async fn muted_by(&self, requester: &AccountId) -> AppResult<Vec<AccountId>>;
}

/// Source of the instance-wide recommendation policy
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PolicySource: Send + Sync {
    async fn load(&self) -> AppResult<InstancePolicy>;
}
