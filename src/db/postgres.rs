use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::collections::HashSet;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::{Account, AccountId, InstancePolicy},
    services::{
        ranking::ActivityCriteria,
        store::{AccountDirectory, FollowGraph, HiddenAccounts, PolicySource},
    },
};

const ACCOUNT_COLUMNS: &str = "id, username, host, name, description, avatar_url, \
     followers_count, following_count, notes_count, is_bot, updated_at";

/// Creates a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Postgres-backed account, follow-graph and hidden-set queries
///
/// Expects `accounts`, `followings (follower_id, followee_id)` and
/// `mutings (muter_id, mutee_id)` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccountDirectory for PgStore {
    async fn active_accounts(
        &self,
        criteria: &ActivityCriteria,
        exclude: &HashSet<AccountId>,
    ) -> AppResult<Vec<Account>> {
        let excluded: Vec<String> = exclude.iter().map(|id| id.0.clone()).collect();
        let excluded_count = excluded.len();

        let query = format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM accounts
            WHERE updated_at >= $1
              AND followers_count >= $2
              AND following_count >= $3
              AND notes_count >= $4
              AND is_bot = false
              AND NOT (id = ANY($5))
            ORDER BY followers_count DESC, id ASC
            "#
        );

        let accounts = sqlx::query_as::<_, Account>(&query)
            .bind(criteria.updated_since)
            .bind(criteria.min_followers)
            .bind(criteria.min_following)
            .bind(criteria.min_notes)
            .bind(excluded)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            population = accounts.len(),
            excluded = excluded_count,
            "Loaded active account population"
        );

        Ok(accounts)
    }

    async fn find_by_id(&self, id: &AccountId) -> AppResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_local(&self, username: &str) -> AppResult<Option<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE host IS NULL AND lower(username) = lower($1)"
        );
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_remote(&self, username: &str, host: &str) -> AppResult<Option<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE lower(username) = lower($1) AND lower(host) = lower($2)"
        );
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(username)
            .bind(host)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }
}

#[async_trait::async_trait]
impl FollowGraph for PgStore {
    async fn friend_ids(&self, id: &AccountId) -> AppResult<Vec<AccountId>> {
        let mut ids: Vec<AccountId> =
            sqlx::query_scalar("SELECT followee_id FROM followings WHERE follower_id = $1")
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await?;

        ids.push(id.clone());
        Ok(ids)
    }

    async fn is_following(&self, follower: &AccountId, followee: &AccountId) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM followings WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower.as_str())
        .bind(followee.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait::async_trait]
impl HiddenAccounts for PgStore {
    async fn hidden_ids(&self) -> AppResult<Vec<AccountId>> {
        let ids = sqlx::query_scalar("SELECT id FROM accounts WHERE is_suspended = true")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn muted_by(&self, requester: &AccountId) -> AppResult<Vec<AccountId>> {
        let ids = sqlx::query_scalar("SELECT mutee_id FROM mutings WHERE muter_id = $1")
            .bind(requester.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[derive(Debug, FromRow)]
struct MetaRow {
    enable_external_user_recommendation: bool,
    external_user_recommendation_engine: Option<String>,
    external_user_recommendation_timeout: i64,
}

/// Reads the recommendation policy from the single-row `meta` table
#[derive(Clone)]
pub struct PgPolicySource {
    pool: PgPool,
    local_hostname: String,
}

impl PgPolicySource {
    pub fn new(pool: PgPool, local_hostname: String) -> Self {
        Self {
            pool,
            local_hostname,
        }
    }

    fn to_policy(&self, row: MetaRow) -> InstancePolicy {
        InstancePolicy {
            external_recommendation_enabled: row.enable_external_user_recommendation,
            engine_url_template: row.external_user_recommendation_engine.unwrap_or_default(),
            // Zero or negative means "no timeout"
            request_timeout: u64::try_from(row.external_user_recommendation_timeout)
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            local_hostname: self.local_hostname.clone(),
        }
    }
}

#[async_trait::async_trait]
impl PolicySource for PgPolicySource {
    async fn load(&self) -> AppResult<InstancePolicy> {
        let row = sqlx::query_as::<_, MetaRow>(
            r#"
            SELECT enable_external_user_recommendation,
                   external_user_recommendation_engine,
                   external_user_recommendation_timeout
            FROM meta
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::PolicyUnavailable(format!("failed to read instance metadata: {}", e))
        })?
        .ok_or_else(|| {
            AppError::PolicyUnavailable("instance metadata row is missing".to_string())
        })?;

        Ok(self.to_policy(row))
    }
}
