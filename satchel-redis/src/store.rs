//! Redis-backed session store.

use async_trait::async_trait;
use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use parking_lot::RwLock;
use redis::AsyncCommands;
use satchel_core::{Options, SessionData, SessionError, SessionResult, SessionStore};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::RedisConfig;
use crate::pool::{RedisPool, RedisPoolBuilder};

const SCAN_BATCH: usize = 100;

/// Session store backed by a pooled Redis connection.
///
/// Each session is one JSON document at `key_prefix + id`, written with
/// `SET ... EX` so Redis expires it on its own. Saves replace the whole
/// document.
///
/// # Examples
///
/// ```no_run
/// use satchel_redis::{RedisConfig, RedisStore};
///
/// # async fn example() -> satchel_core::SessionResult<()> {
/// let store = RedisStore::connect(RedisConfig::new(10, "localhost:6379", "")).await?;
/// store.set_key_prefix("myapp:session:");
/// println!("{} live sessions", store.count().await?);
/// # Ok(())
/// # }
/// ```
pub struct RedisStore {
    pool: RedisPool,
    options: RwLock<Options>,
    key_prefix: RwLock<String>,
    default_ttl: Duration,
    command_timeout: Duration,
}

impl RedisStore {
    /// Build a pool from `config` and wrap it.
    pub async fn connect(config: RedisConfig) -> SessionResult<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build().await?;
        Ok(Self::with_pool(pool, &config))
    }

    /// Use an existing pool; connection settings in `config` are ignored.
    pub fn with_pool(pool: RedisPool, config: &RedisConfig) -> Self {
        Self {
            pool,
            options: RwLock::new(Options::default()),
            key_prefix: RwLock::new(config.key_prefix.clone()),
            default_ttl: config.default_ttl,
            command_timeout: config.command_timeout,
        }
    }

    /// Change the prefix for subsequent operations.
    ///
    /// Sessions written under the old prefix stay where they are.
    pub fn set_key_prefix(&self, prefix: impl Into<String>) {
        *self.key_prefix.write() = prefix.into();
    }

    pub fn key_prefix(&self) -> String {
        self.key_prefix.read().clone()
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Number of sessions stored under the current prefix.
    pub async fn count(&self) -> SessionResult<usize> {
        Ok(self.scan_keys().await?.len())
    }

    /// Delete every session under the current prefix, returning how many
    /// were removed.
    pub async fn clear_all(&self) -> SessionResult<usize> {
        let keys = self.scan_keys().await?;
        let mut removed = 0;

        for batch in keys.chunks(SCAN_BATCH) {
            removed += self
                .run(async {
                    let mut conn = self.connection().await?;
                    let n: usize = conn.del(batch).await.map_err(SessionError::unavailable)?;
                    Ok::<_, SessionError>(n)
                })
                .await?;
        }

        debug!(removed, "Cleared Redis sessions");
        Ok(removed)
    }

    fn session_key(&self, session_id: &str) -> String {
        session_key(&self.key_prefix.read(), session_id)
    }

    async fn connection(&self) -> SessionResult<PooledConnection<'_, RedisConnectionManager>> {
        self.pool.get().await.map_err(SessionError::unavailable)
    }

    async fn run<T>(&self, op: impl Future<Output = SessionResult<T>>) -> SessionResult<T> {
        tokio::time::timeout(self.command_timeout, op)
            .await
            .map_err(|_| {
                SessionError::BackendUnavailable(format!(
                    "Redis command timed out after {:?}",
                    self.command_timeout
                ))
            })?
    }

    async fn scan_keys(&self) -> SessionResult<Vec<String>> {
        let pattern = scan_pattern(&self.key_prefix());

        self.run(async {
            let mut conn = self.connection().await?;
            let mut keys = Vec::new();
            let mut cursor: u64 = 0;

            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut *conn)
                    .await
                    .map_err(SessionError::unavailable)?;

                keys.extend(batch);
                if next == 0 {
                    break;
                }
                cursor = next;
            }

            // SCAN may return a key more than once
            keys.sort_unstable();
            keys.dedup();
            Ok::<_, SessionError>(keys)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn load(&self, session_id: &str) -> SessionResult<Option<SessionData>> {
        let key = self.session_key(session_id);

        let json = self
            .run(async {
                let mut conn = self.connection().await?;
                let json: Option<String> = conn.get(&key).await.map_err(SessionError::unavailable)?;
                Ok::<_, SessionError>(json)
            })
            .await?;

        match json {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| SessionError::BackendUnavailable(format!("corrupt session data: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        session_id: &str,
        data: &SessionData,
        options: &Options,
    ) -> SessionResult<()> {
        let Some(ttl) = options.store_ttl(self.default_ttl) else {
            return self.delete(session_id).await;
        };

        let key = self.session_key(session_id);
        let json = serde_json::to_string(data).map_err(SessionError::unavailable)?;

        self.run(async {
            let mut conn = self.connection().await?;
            let _: () = conn
                .set_ex(&key, json, ttl_seconds(ttl))
                .await
                .map_err(SessionError::unavailable)?;
            Ok::<_, SessionError>(())
        })
        .await
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        let key = self.session_key(session_id);

        self.run(async {
            let mut conn = self.connection().await?;
            let _: u32 = conn.del(&key).await.map_err(SessionError::unavailable)?;
            Ok::<_, SessionError>(())
        })
        .await
    }

    fn options(&self, options: Options) {
        *self.options.write() = options;
    }

    fn current_options(&self) -> Options {
        self.options.read().clone()
    }
}

fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{}{}", prefix, session_id)
}

/// `MATCH` pattern for every key under `prefix`, with glob characters in the
/// prefix escaped.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

/// `EX` takes whole seconds and rejects zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key() {
        assert_eq!(session_key("session_", "abc123"), "session_abc123");
        assert_eq!(session_key("", "abc123"), "abc123");
    }

    #[test]
    fn test_scan_pattern_escapes_globs() {
        assert_eq!(scan_pattern("session_"), "session_*");
        assert_eq!(scan_pattern("app[1]:"), "app\\[1\\]:*");
        assert_eq!(scan_pattern("a*b?"), "a\\*b\\?*");
    }

    #[test]
    fn test_ttl_seconds() {
        assert_eq!(ttl_seconds(Duration::from_secs(3600)), 3600);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn test_options_ttl_translation() {
        let default_ttl = RedisConfig::default().default_ttl;
        let ttl = |max_age| Options::default().with_max_age(max_age).store_ttl(default_ttl);

        assert_eq!(ttl(600).map(ttl_seconds), Some(600));
        assert_eq!(ttl(0).map(ttl_seconds), Some(default_ttl.as_secs()));
        assert_eq!(ttl(-1), None);
    }
}
