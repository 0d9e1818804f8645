use futures::future::try_join_all;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Account, AccountProjection, AccountRef},
    services::store::FollowGraph,
};

/// Renders accounts into detail-level projections for a viewer
#[derive(Clone)]
pub struct AccountPacker {
    graph: Arc<dyn FollowGraph>,
}

impl AccountPacker {
    pub fn new(graph: Arc<dyn FollowGraph>) -> Self {
        Self { graph }
    }

    /// Relation flags are always false for anonymous viewers and for the
    /// viewer's own account.
    pub async fn pack(
        &self,
        account: &Account,
        viewer: Option<&AccountRef>,
    ) -> AppResult<AccountProjection> {
        let (is_following, is_followed) = match viewer {
            Some(viewer) if viewer.id != account.id => {
                let outgoing = self.graph.is_following(&viewer.id, &account.id);
                let incoming = self.graph.is_following(&account.id, &viewer.id);
                tokio::try_join!(outgoing, incoming)?
            }
            _ => (false, false),
        };

        Ok(AccountProjection::detail(account, is_following, is_followed))
    }

    /// Packs every account, preserving order
    pub async fn pack_many<'a>(
        &self,
        accounts: impl IntoIterator<Item = &'a Account>,
        viewer: Option<&AccountRef>,
    ) -> AppResult<Vec<AccountProjection>> {
        try_join_all(accounts.into_iter().map(|account| self.pack(account, viewer))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountId;
    use crate::services::store::MockFollowGraph;
    use chrono::Utc;

    fn account(id: &str) -> Account {
        Account {
            id: AccountId::new(id),
            username: id.to_string(),
            host: None,
            name: Some(id.to_uppercase()),
            description: None,
            avatar_url: None,
            followers_count: 12,
            following_count: 11,
            notes_count: 40,
            is_bot: false,
            updated_at: Utc::now(),
        }
    }

    fn viewer() -> AccountRef {
        AccountRef {
            id: AccountId::new("me"),
            username: "me".to_string(),
        }
    }

    #[tokio::test]
    async fn test_anonymous_viewer_has_no_relations() {
        let mut graph = MockFollowGraph::new();
        graph.expect_is_following().never();

        let packer = AccountPacker::new(Arc::new(graph));
        let projection = packer.pack(&account("bob"), None).await.unwrap();

        assert_eq!(projection.username, "bob");
        assert_eq!(projection.name.as_deref(), Some("BOB"));
        assert!(!projection.is_following);
        assert!(!projection.is_followed);
    }

    #[tokio::test]
    async fn test_relations_for_viewer() {
        let mut graph = MockFollowGraph::new();
        graph
            .expect_is_following()
            .returning(|follower, followee| {
                // bob follows me, I do not follow bob
                Ok(follower.as_str() == "bob" && followee.as_str() == "me")
            });

        let packer = AccountPacker::new(Arc::new(graph));
        let projection = packer.pack(&account("bob"), Some(&viewer())).await.unwrap();

        assert!(!projection.is_following);
        assert!(projection.is_followed);
    }

    #[tokio::test]
    async fn test_pack_many_keeps_order() {
        let mut graph = MockFollowGraph::new();
        graph.expect_is_following().returning(|_, _| Ok(false));

        let packer = AccountPacker::new(Arc::new(graph));
        let accounts = vec![account("c"), account("a"), account("b")];
        let packed = packer.pack_many(&accounts, Some(&viewer())).await.unwrap();

        let ids: Vec<&str> = packed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
