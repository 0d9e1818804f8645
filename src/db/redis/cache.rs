use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, AppResult};

/// Pending writes beyond this are dropped rather than buffered
const WRITE_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Remote account resolved from `username@host`
    RemoteAccount(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::RemoteAccount(acct) => write!(f, "acct:{}", acct.to_lowercase()),
        }
    }
}

/// Creates a Redis client from a `redis://` URL; no connection is made yet
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// A serialized entry waiting for the writer task
struct PendingWrite {
    key: String,
    payload: String,
    ttl: Duration,
}

/// Redis-backed JSON cache
///
/// Reads hit Redis directly; writes are queued to a background task so that
/// filling the cache never delays a response.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    writes: mpsc::Sender<PendingWrite>,
}

/// Stops the background writer once queued writes are flushed
pub struct CacheWriterHandle {
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Connects to Redis and spawns the background writer task
    ///
    /// The returned [`CacheWriterHandle`] must be kept until shutdown; calling
    /// [`CacheWriterHandle::shutdown`] flushes writes that are already queued.
    ///
    /// # Arguments
    /// * `client` - Redis client, typically from [`create_redis_client`]
    ///
    /// # Errors
    /// Returns [`AppError::Cache`] when the initial connection fails.
    pub async fn connect(client: Client) -> AppResult<(Self, CacheWriterHandle)> {
        // One multiplexed connection, reconnected on failure, shared by all clones
        let conn = ConnectionManager::new(client).await?;

        let (writes, queue) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let (stop, stopped) = oneshot::channel();

        let task = tokio::spawn(run_writer(conn.clone(), queue, stopped));
        tracing::info!("Cache connected");

        Ok((Self { conn, writes }, CacheWriterHandle { stop, task }))
    }

    /// Reads and deserializes the JSON entry stored under `key`
    ///
    /// # Arguments
    /// * `key` - Entry to read
    ///
    /// # Returns
    /// `Ok(None)` on a miss. An entry that does not deserialize into `T` is an
    /// [`AppError::Internal`]; Redis failures are [`AppError::Cache`].
    pub async fn get_from_cache<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(key.to_string()).await?;

        payload
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Corrupt cache entry for {}: {}", key, e))
                })
            })
            .transpose()
    }

    /// Queues `value` for storage under `key` and returns immediately
    ///
    /// Serialization happens on the caller's task, the Redis round trip on the
    /// writer's. When the queue is full the write is dropped with a warning.
    ///
    /// # Arguments
    /// * `key` - Entry to write
    /// * `value` - Anything serializable to JSON
    /// * `ttl` - Expiry, rounded down to whole seconds (at least one)
    pub fn set_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        // Serialize here so the writer only deals with strings
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            payload,
            ttl,
        };
        if let Err(e) = self.writes.try_send(write) {
            tracing::warn!(error = %e, key = %key, "Dropping cache write");
        }
    }
}

/// Drains the write queue until told to stop
async fn run_writer(
    conn: ConnectionManager,
    mut queue: mpsc::Receiver<PendingWrite>,
    mut stopped: oneshot::Receiver<()>,
) {
    tracing::debug!("Cache writer started");

    loop {
        tokio::select! {
            Some(write) = queue.recv() => store(&conn, write).await,
            _ = &mut stopped => break,
        }
    }

    // Cache clones may still hold senders, so only drain what is already queued
    let mut flushed = 0usize;
    while let Ok(write) = queue.try_recv() {
        store(&conn, write).await;
        flushed += 1;
    }
    tracing::info!(flushed, "Cache writer stopped");
}

async fn store(conn: &ConnectionManager, write: PendingWrite) {
    let mut conn = conn.clone();
    let ttl = write.ttl.as_secs().max(1);
    let result: redis::RedisResult<()> = conn.set_ex(&write.key, write.payload, ttl).await;
    if let Err(e) = result {
        tracing::error!(error = %e, key = %write.key, "Failed to write cache entry");
    }
}
