//! Pooled Redis connections for the session store.

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use satchel_core::{SessionError, SessionResult};
use tracing::{debug, info};

use crate::RedisConfig;

/// Connection pool shared by a [`RedisStore`](crate::RedisStore).
pub type RedisPool = Pool<RedisConnectionManager>;

/// Opens a [`RedisPool`] from a [`RedisConfig`].
pub struct RedisPoolBuilder {
    config: RedisConfig,
}

impl RedisPoolBuilder {
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    /// Open the pool and verify the server is reachable.
    ///
    /// A malformed URL fails with [`SessionError::InvalidUrl`]; a server that
    /// cannot be reached fails with [`SessionError::BackendUnavailable`].
    pub async fn build(self) -> SessionResult<RedisPool> {
        let RedisConfig {
            pool_size,
            min_idle,
            connection_timeout,
            database,
            ..
        } = self.config;

        let manager = self.manager()?;
        let pool = Pool::builder()
            .max_size(pool_size)
            .min_idle(min_idle)
            .connection_timeout(connection_timeout)
            .build(manager)
            .await
            .map_err(SessionError::unavailable)?;

        ping(&pool).await?;

        info!(
            pool_size,
            database = database.unwrap_or(0),
            "Connected session store to Redis"
        );
        Ok(pool)
    }

    fn manager(&self) -> SessionResult<RedisConnectionManager> {
        let url = self.config.connection_url()?;
        RedisConnectionManager::new(url).map_err(|e| SessionError::InvalidUrl(e.to_string()))
    }
}

async fn ping(pool: &RedisPool) -> SessionResult<()> {
    let mut conn = pool.get().await.map_err(SessionError::unavailable)?;
    let reply: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(SessionError::unavailable)?;
    debug!(%reply, "Redis answered PING");
    Ok(())
}
