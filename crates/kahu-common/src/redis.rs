/// Redis wrapper with graceful degradation.
///
/// The `Option`/`bool` returning operations log a warning on any Redis error and report
/// "nothing there", so optional state (conversation history) simply disappears when Redis is
/// down. Document reads that the caller cannot do without go through `get_checked`, which
/// surfaces the failure instead.
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone)]
pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// Build a client for `url`. A `None` URL or an invalid one yields a cache whose
    /// operations are all no-ops.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, redis disabled"))
                .ok()
        });
        Self { client }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Send a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    /// Get a value. `None` if Redis is unavailable or the key does not exist.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.get_checked(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()
            .flatten()
    }

    /// Get a value, distinguishing a missing key (`Ok(None)`) from a failed read (`Err`).
    pub async fn get_checked(&self, key: &str) -> Result<Option<String>, CommonError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Store a value only if the key does not exist yet. Returns `Ok(true)` when written.
    pub async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, CommonError> {
        let mut conn = self.connection().await?;
        let written: bool = conn.set_nx(key, value).await?;
        Ok(written)
    }

    /// Set a value with a TTL in seconds. Returns `true` if successful.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SETEX failed"))
            .is_ok()
    }

    /// Whether a key exists. `false` if Redis is unavailable.
    pub async fn exists(&self, key: &str) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        conn.exists(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis EXISTS failed"))
            .unwrap_or(false)
    }

    /// Every element of a list, oldest first. `None` if Redis is unavailable.
    pub async fn list(&self, key: &str) -> Option<Vec<String>> {
        let mut conn = self.connection().await.ok()?;
        conn.lrange(key, 0, -1)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis LRANGE failed"))
            .ok()
    }

    /// Append to a list and refresh its TTL in one MULTI/EXEC. Returns `true` if successful.
    pub async fn push_with_ttl(&self, key: &str, values: &[String], ttl_secs: u64) -> bool {
        if values.is_empty() {
            return true;
        }
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        redis::pipe()
            .atomic()
            .rpush(key, values)
            .ignore()
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis RPUSH failed"))
            .is_ok()
    }

    /// Delete a key. Returns `true` if successful.
    pub async fn delete(&self, key: &str) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        conn.del::<_, ()>(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis DEL failed"))
            .is_ok()
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CommonError> {
        let client = self.client.as_ref().ok_or(CommonError::RedisUnavailable)?;
        client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .map_err(CommonError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::RedisCache;

    #[tokio::test]
    async fn unconfigured_cache_degrades_to_no_ops() {
        let cache = RedisCache::new(None);
        assert!(!cache.is_configured());
        assert!(!cache.is_available().await);
        assert_eq!(cache.get("missing").await, None);
        assert!(!cache.set_with_ttl("k", "v", 10).await);
        assert!(!cache.delete("k").await);
        assert!(!cache.exists("k").await);
        assert_eq!(cache.list("k").await, None);
        assert!(!cache.push_with_ttl("k", &["v".to_string()], 10).await);
        assert!(cache.push_with_ttl("k", &[], 10).await);
        assert!(cache.get_checked("k").await.is_err());
        assert!(cache.set_if_absent("k", "v").await.is_err());
    }

    #[test]
    fn invalid_url_disables_redis() {
        let cache = RedisCache::new(Some("not a redis url"));
        assert!(!cache.is_configured());
    }
}
