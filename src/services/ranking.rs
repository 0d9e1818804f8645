use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::models::{Account, AccountId, ScoredCandidate};

/// Accounts not updated within this many days are not recommended
pub const ACTIVITY_WINDOW_DAYS: i64 = 5;
pub const MIN_FOLLOWERS: i64 = 10;
pub const MIN_FOLLOWING: i64 = 10;
pub const MIN_NOTES: i64 = 10;

/// Exclusive bounds on following / followers
pub const MIN_BALANCE: f64 = 0.5;
pub const MAX_BALANCE: f64 = 5.0;

/// Activity thresholds a candidate has to meet, anchored at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityCriteria {
    pub updated_since: DateTime<Utc>,
    pub min_followers: i64,
    pub min_following: i64,
    pub min_notes: i64,
}

impl ActivityCriteria {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            updated_since: now - Duration::days(ACTIVITY_WINDOW_DAYS),
            min_followers: MIN_FOLLOWERS,
            min_following: MIN_FOLLOWING,
            min_notes: MIN_NOTES,
        }
    }

    /// Recency, count thresholds and the automated-account flag
    pub fn admits(&self, account: &Account) -> bool {
        account.updated_at >= self.updated_since
            && account.followers_count >= self.min_followers
            && account.following_count >= self.min_following
            && account.notes_count >= self.min_notes
            && !account.is_bot
    }
}

/// Filters, scores and pages the candidate population.
///
/// Steps run in a fixed order: activity filter and exclusions, balance
/// derivation, balance bounds, followers-descending sort (stable), then
/// `limit` is taken *before* `offset` is skipped. With `offset >= limit`
/// the result is therefore always empty.
pub fn rank_candidates(
    population: Vec<Account>,
    exclusions: &HashSet<AccountId>,
    criteria: &ActivityCriteria,
    limit: usize,
    offset: usize,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = population
        .into_iter()
        .filter(|account| criteria.admits(account) && !exclusions.contains(&account.id))
        // followers_count >= MIN_FOLLOWERS > 0 from here on
        .map(ScoredCandidate::new)
        .filter(|candidate| candidate.balance > MIN_BALANCE && candidate.balance < MAX_BALANCE)
        .collect();

    scored.sort_by(|a, b| b.account.followers_count.cmp(&a.account.followers_count));

    scored.into_iter().take(limit).skip(offset).collect()
}
