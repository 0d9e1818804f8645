/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Looks `$key` up in the cache and returns the entry on a hit. On a miss the
/// `$fetch` future is awaited, its output is queued for a background write and
/// then returned. The whole expression evaluates to `AppResult<T>`.
///
/// The cache is an optimisation only: when the lookup itself fails (Redis
/// unreachable, corrupt entry) the error is logged and treated as a miss, so
/// an outage never hides the source of truth. Errors from `$fetch` are
/// returned early with `?`.
///
/// # Arguments
/// * `$cache`: anything with `get_from_cache` and `set_in_background`
///   methods shaped like [`Cache`](crate::db::Cache)'s.
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and write; it is
///   evaluated once.
/// * `$ttl`: a `Duration` after which the written entry expires.
/// * `$fetch`: a future producing `AppResult<T>`, awaited only on a miss.
///
/// # Example
/// ```rust,ignore
/// let account: AppResult<Account> = cached!(
///     cache,
///     CacheKey::RemoteAccount(acct),
///     Duration::from_secs(3600),
///     discover(username, host)
/// );
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $fetch:expr) => {{
        let key = $key;

        // A failed lookup degrades to a miss
        let hit = match $cache.get_from_cache(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, bypassing cache");
                None
            }
        };

        match hit {
            Some(hit) => Ok(hit),
            None => {
                // Fetch from the source, then fill the cache without waiting
                let fresh = $fetch.await?;
                $cache.set_in_background(&key, &fresh, $ttl);
                Ok(fresh)
            }
        }
    }};
}
