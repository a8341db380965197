// Redis-backed counter store, shared by every instance serving traffic.
//
// Each identity/window pair maps to one key, `{prefix}{identity}:{window_start_ms}`.
// The increment and its expiry run in a single MULTI block so a counter can never
// outlive its window.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ratelimit::store::{CounterStore, StoreError, Window};

pub struct RedisCounterStore {
    client: Client,
    key_prefix: String,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCounterStore {
    pub fn new(client: Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            connection: Mutex::new(None),
        }
    }

    fn key(&self, identity: &str, window: &Window) -> String {
        format!("{}{}:{}", self.key_prefix, identity, window.start_ms())
    }

    /// Returns the cached connection, connecting on first use.
    async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!("Redis counter store connected");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn forget_connection(&self) {
        *self.connection.lock().await = None;
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, identity: &str, window: &Window) -> Result<u64, StoreError> {
        let key = self.key(identity, window);
        let ttl_ms = window.length.as_millis() as u64;

        let mut conn = self.connection().await.map_err(|e| {
            warn!("Redis connection failed: {e}");
            StoreError::Unavailable(e.to_string())
        })?;

        let result: Result<(u64,), redis::RedisError> = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await;

        match result {
            Ok((count,)) => Ok(count),
            Err(e) => {
                warn!("Redis increment failed for window {}: {e}", window.start_ms());
                self.forget_connection().await;
                Err(StoreError::Unavailable(e.to_string()))
            }
        }
    }
}
