use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::{AccountProjection, AccountRef, CandidateDescriptor, RecommendedAccount},
    services::{packer::AccountPacker, resolver::IdentityResolver},
};

/// Turns engine-supplied descriptors into client-ready accounts
///
/// Every descriptor is resolved concurrently. A descriptor that cannot be
/// resolved (error or timeout) is logged and passed through unchanged, so one
/// bad candidate never fails the request. Output order is input order.
#[derive(Clone)]
pub struct Reconciler {
    resolver: Arc<dyn IdentityResolver>,
    packer: AccountPacker,
    resolution_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        packer: AccountPacker,
        resolution_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            packer,
            resolution_timeout,
        }
    }

    pub async fn reconcile(
        &self,
        descriptors: Vec<CandidateDescriptor>,
        requester: &AccountRef,
    ) -> AppResult<Vec<RecommendedAccount>> {
        let reconciled = join_all(
            descriptors
                .into_iter()
                .map(|descriptor| self.reconcile_one(descriptor, requester)),
        )
        .await;

        reconciled.into_iter().collect()
    }

    async fn reconcile_one(
        &self,
        descriptor: CandidateDescriptor,
        requester: &AccountRef,
    ) -> AppResult<RecommendedAccount> {
        Ok(match self.resolve_and_pack(&descriptor, requester).await? {
            Some(projection) => RecommendedAccount::Packed(projection),
            None => RecommendedAccount::Unresolved(descriptor),
        })
    }

    /// `Ok(None)` when resolution failed; packing errors are returned as is
    async fn resolve_and_pack(
        &self,
        descriptor: &CandidateDescriptor,
        requester: &AccountRef,
    ) -> AppResult<Option<AccountProjection>> {
        // No host means the candidate lives on this instance
        let host = descriptor.host().unwrap_or_default();
        let resolved = tokio::time::timeout(
            self.resolution_timeout,
            self.resolver.resolve(descriptor.username(), host),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::ResolutionFailed(format!(
                "timed out after {:?}",
                self.resolution_timeout
            )))
        });

        match resolved {
            Ok(account) => self.packer.pack(&account, Some(requester)).await.map(Some),
            Err(e) => {
                tracing::warn!(
                    acct = %descriptor.acct(),
                    error = %e,
                    "Can't resolve recommended account"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountId};
    use crate::services::resolver::MockIdentityResolver;
    use crate::services::store::MockFollowGraph;
    use chrono::Utc;
    use serde_json::json;

    fn descriptor(username: &str, host: &str) -> CandidateDescriptor {
        serde_json::from_value(json!({
            "name": username.to_uppercase(),
            "username": username,
            "host": host,
            "description": "",
            "avatarUrl": "u"
        }))
        .unwrap()
    }

    fn account(username: &str, host: &str) -> Account {
        Account {
            id: AccountId::new(format!("{}-{}", username, host)),
            username: username.to_string(),
            host: Some(host.to_string()),
            name: None,
            description: None,
            avatar_url: None,
            followers_count: 20,
            following_count: 20,
            notes_count: 20,
            is_bot: false,
            updated_at: Utc::now(),
        }
    }

    fn requester() -> AccountRef {
        AccountRef {
            id: AccountId::new("me"),
            username: "me".to_string(),
        }
    }

    fn packer() -> AccountPacker {
        let mut graph = MockFollowGraph::new();
        graph.expect_is_following().returning(|_, _| Ok(false));
        AccountPacker::new(Arc::new(graph))
    }

    fn reconciler(resolver: MockIdentityResolver, timeout: Duration) -> Reconciler {
        Reconciler::new(Arc::new(resolver), packer(), timeout)
    }

    #[tokio::test]
    async fn test_unresolved_descriptor_passes_through() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .returning(|_, _| Err(AppError::ResolutionFailed("gone".to_string())));

        let original = descriptor("bot1", "remote.example");
        let result = reconciler(resolver, Duration::from_secs(1))
            .reconcile(vec![original.clone()], &requester())
            .await
            .unwrap();

        assert_eq!(result, vec![RecommendedAccount::Unresolved(original)]);
    }

    #[tokio::test]
    async fn test_unresolved_descriptor_keeps_engine_fields() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .returning(|_, _| Err(AppError::ResolutionFailed("gone".to_string())));

        let raw = json!({ "username": "cat", "host": "remote.example", "isCat": true });
        let result = reconciler(resolver, Duration::from_secs(1))
            .reconcile(
                vec![serde_json::from_value(raw.clone()).unwrap()],
                &requester(),
            )
            .await
            .unwrap();

        assert_eq!(serde_json::to_value(&result).unwrap(), json!([raw]));
    }

    #[tokio::test]
    async fn test_hostless_descriptor_resolved_locally() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .withf(|username, host| username == "neighbour" && host.is_empty())
            .times(1)
            .returning(|username, _| {
                let mut local = account(username, "unused");
                local.host = None;
                Ok(local)
            });

        let local: CandidateDescriptor =
            serde_json::from_value(json!({ "username": "neighbour", "host": null })).unwrap();
        let result = reconciler(resolver, Duration::from_secs(1))
            .reconcile(vec![local], &requester())
            .await
            .unwrap();

        match &result[0] {
            RecommendedAccount::Packed(p) => {
                assert_eq!(p.username, "neighbour");
                assert!(p.host.is_none());
            }
            other => panic!("expected packed account, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mixed_results_keep_input_order() {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve().returning(|username, host| {
            if username == "missing" {
                Err(AppError::ResolutionFailed("not found".to_string()))
            } else {
                Ok(account(username, host))
            }
        });

        let result = reconciler(resolver, Duration::from_secs(1))
            .reconcile(
                vec![
                    descriptor("first", "a.example"),
                    descriptor("missing", "b.example"),
                    descriptor("third", "c.example"),
                ],
                &requester(),
            )
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        match &result[0] {
            RecommendedAccount::Packed(p) => assert_eq!(p.username, "first"),
            other => panic!("expected packed account, got {:?}", other),
        }
        match &result[1] {
            RecommendedAccount::Unresolved(d) => assert_eq!(d.username(), "missing"),
            other => panic!("expected unresolved descriptor, got {:?}", other),
        }
        match &result[2] {
            RecommendedAccount::Packed(p) => assert_eq!(p.host.as_deref(), Some("c.example")),
            other => panic!("expected packed account, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_descriptor_list() {
        let mut resolver = MockIdentityResolver::new();
        resolver.expect_resolve().never();

        let result = reconciler(resolver, Duration::from_secs(1))
            .reconcile(vec![], &requester())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    struct SlowResolver;

    #[async_trait::async_trait]
    impl IdentityResolver for SlowResolver {
        async fn resolve(&self, username: &str, host: &str) -> AppResult<Account> {
            if username == "slow" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(account(username, host))
        }
    }

    #[tokio::test]
    async fn test_resolution_timeout_falls_back_to_descriptor() {
        let reconciler = Reconciler::new(
            Arc::new(SlowResolver),
            packer(),
            Duration::from_millis(20),
        );

        let result = reconciler
            .reconcile(
                vec![descriptor("slow", "x.example"), descriptor("fast", "y.example")],
                &requester(),
            )
            .await
            .unwrap();

        assert!(matches!(&result[0], RecommendedAccount::Unresolved(d) if d.username() == "slow"));
        assert!(matches!(&result[1], RecommendedAccount::Packed(p) if p.username == "fast"));
    }

    #[tokio::test]
    async fn test_packing_failure_propagates() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_resolve()
            .returning(|username, host| Ok(account(username, host)));

        let mut graph = MockFollowGraph::new();
        graph
            .expect_is_following()
            .returning(|_, _| Err(AppError::Internal("graph down".to_string())));

        let reconciler = Reconciler::new(
            Arc::new(resolver),
            AccountPacker::new(Arc::new(graph)),
            Duration::from_secs(1),
        );

        let result = reconciler
            .reconcile(vec![descriptor("bob", "remote.example")], &requester())
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
