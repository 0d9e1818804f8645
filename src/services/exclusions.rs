use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{AccountId, AccountRef},
    services::store::{FollowGraph, HiddenAccounts},
};

/// Computes the accounts that must never be recommended to `requester`
///
/// Anonymous requests only exclude the instance-wide hidden set. Signed-in
/// requests additionally exclude the requester, everyone they follow, and
/// everyone they muted.
pub async fn resolve_exclusions(
    graph: &dyn FollowGraph,
    hidden: &dyn HiddenAccounts,
    requester: Option<&AccountRef>,
) -> AppResult<HashSet<AccountId>> {
    let Some(requester) = requester else {
        return Ok(hidden.hidden_ids().await?.into_iter().collect());
    };

    let (friends, muted, hidden_ids) = tokio::try_join!(
        graph.friend_ids(&requester.id),
        hidden.muted_by(&requester.id),
        hidden.hidden_ids(),
    )?;

    let mut excluded: HashSet<AccountId> = friends.into_iter().collect();
    excluded.insert(requester.id.clone());
    excluded.extend(muted);
    excluded.extend(hidden_ids);

    tracing::debug!(
        requester = %requester.id,
        excluded = excluded.len(),
        "Resolved recommendation exclusions"
    );

    Ok(excluded)
}
