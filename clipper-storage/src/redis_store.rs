//! Redis-backed cache store.

use async_trait::async_trait;
use clipper_core::{ClipperError, ClipperResult, StoreError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use std::time::Duration;
use tracing::{error, info};

use crate::CacheStore;

/// Cache store talking to Redis through a multiplexed connection manager.
///
/// The manager reconnects on its own; a failed command surfaces as
/// [`StoreError::Unavailable`] and the next command retries the connection.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    /// Open a connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> ClipperResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            error!(error = %e, "Failed to open Redis client");
            map_redis_error("OPEN", e)
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            error!(error = %e, "Failed to create Redis connection manager");
            map_redis_error("CONNECT", e)
        })?;

        info!("Redis cache store connected");
        Ok(Self { conn })
    }
}

fn map_redis_error(command: &str, e: RedisError) -> ClipperError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Unavailable {
            reason: e.to_string(),
        }
        .into()
    } else {
        StoreError::CommandFailed {
            command: command.to_string(),
            reason: e.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn delete(&self, keys: &[String]) -> ClipperResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del::<_, u64>(keys.to_vec())
            .await
            .map_err(|e| map_redis_error("DEL", e))
    }

    async fn exists(&self, key: &str) -> ClipperResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| map_redis_error("EXISTS", e))
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(reply) => reply == "PONG",
            Err(e) => {
                tracing::debug!(error = %e, "Redis ping failed");
                false
            }
        }
    }

    async fn get(&self, key: &str) -> ClipperResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| map_redis_error("GET", e))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ClipperResult<()> {
        let mut conn = self.conn.clone();
        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        result.map_err(|e| map_redis_error("SET", e))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
