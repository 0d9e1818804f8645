pub mod postgres;
pub mod redis;

pub use self::postgres::{create_pool, PgPolicySource, PgStore};
pub use self::redis::create_redis_client;
pub use self::redis::Cache;
pub use self::redis::CacheKey;
pub use self::redis::CacheWriterHandle;
