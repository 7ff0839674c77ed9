//! Redis-backed fixed-window counters.
//!
//! The window for a key is anchored to the first consumption after the key
//! is clear: the increment that creates the key also sets its expiry. All
//! processes sharing the same Redis instance and key prefix coordinate
//! through the same counters.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{RateLimitResult, RateLimitStore};
use crate::error::{LimitdError, Result};

/// How the increment and expiry of a window key are sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    /// INCRBY followed by a conditional PEXPIRE. The increment itself is a
    /// single atomic add, so concurrent consumers never lose updates, but
    /// the two-step sequence as a whole is not atomic: a crash between the
    /// steps can leave a key without an expiry.
    #[default]
    Relaxed,
    /// A single server-side Lua script performs the increment, conditional
    /// expiry and TTL read atomically.
    Atomic,
}

/// Increment, conditionally anchor the window, and report the remaining
/// TTL in one round trip. Returns `{count, ttl_ms}`.
const CHECK_AND_UPDATE_SCRIPT: &str = r#"
local count = redis.call('INCRBY', KEYS[1], ARGV[1])
if count == tonumber(ARGV[1]) then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
    return {count, tonumber(ARGV[2])}
end
return {count, redis.call('PTTL', KEYS[1])}
"#;

/// Distributed counter backend implementing [`RateLimitStore`] on Redis.
pub struct RedisStore {
    /// Managed connection; `None` once the store has been closed.
    conn: RwLock<Option<ConnectionManager>>,
    /// Prefix prepended to every caller-supplied key. Different prefixes
    /// partition otherwise-identical keys into independent counters.
    key_prefix: String,
    mode: ConsistencyMode,
    check_script: Script,
}

impl RedisStore {
    /// Connect to Redis at `url` and verify the connection within
    /// `connect_timeout`.
    pub async fn connect(
        url: &str,
        key_prefix: impl Into<String>,
        mode: ConsistencyMode,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::open(url).map_err(LimitdError::Storage)?;

        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                LimitdError::Backend(format!("timed out connecting to redis at {url}"))
            })??;

        info!(url = %url, mode = ?mode, "Connected to Redis");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            key_prefix: key_prefix.into(),
            mode,
            check_script: Script::new(CHECK_AND_UPDATE_SCRIPT),
        })
    }

    /// Clone the managed connection, failing if the store has been closed.
    async fn connection(&self) -> Result<ConnectionManager> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| LimitdError::Backend("redis store is closed".to_string()))
    }

    /// Namespace a caller-supplied key for the external store.
    fn format_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn build_result(count: i64, limit: i64, reset_at: DateTime<Utc>) -> RateLimitResult {
        RateLimitResult {
            allowed: count <= limit,
            remaining: (limit - count).max(0),
            reset_at,
            limit,
        }
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn check_and_update(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        cost: i64,
    ) -> Result<RateLimitResult> {
        let mut conn = self.connection().await?;
        let redis_key = self.format_key(key);
        let window_ms = window.as_millis() as i64;

        let (count, ttl_ms): (i64, i64) = match self.mode {
            ConsistencyMode::Atomic => {
                self.check_script
                    .key(&redis_key)
                    .arg(cost)
                    .arg(window_ms)
                    .invoke_async(&mut conn)
                    .await?
            }
            ConsistencyMode::Relaxed => {
                let count: i64 = conn.incr(&redis_key, cost).await?;
                if count == cost {
                    // This increment created the key, so this consumption
                    // anchors the window. Crashing before the expiry lands
                    // leaves the key without a TTL; see ConsistencyMode.
                    let _: bool = conn.pexpire(&redis_key, window_ms).await?;
                    (count, window_ms)
                } else {
                    let ttl: i64 = conn.pttl(&redis_key).await?;
                    (count, ttl)
                }
            }
        };

        let reset_at = Utc::now() + chrono::Duration::milliseconds(ttl_ms.max(0));
        let result = Self::build_result(count, limit, reset_at);

        debug!(
            key = %redis_key,
            count = count,
            allowed = result.allowed,
            "Checked rate limit"
        );

        Ok(result)
    }

    async fn get_status(&self, key: &str, limit: i64) -> Result<RateLimitResult> {
        let mut conn = self.connection().await?;
        let redis_key = self.format_key(key);

        // A stored value that does not parse as an integer surfaces as a
        // driver type error rather than being coerced to zero.
        let count: Option<i64> = conn.get(&redis_key).await?;
        let Some(count) = count else {
            return Ok(RateLimitResult {
                allowed: true,
                remaining: limit,
                reset_at: Utc::now(),
                limit,
            });
        };

        let ttl_ms: i64 = conn.pttl(&redis_key).await?;
        let reset_at = Utc::now() + chrono::Duration::milliseconds(ttl_ms.max(0));

        Ok(Self::build_result(count, limit, reset_at))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let redis_key = self.format_key(key);

        let deleted: i64 = conn.del(&redis_key).await?;
        if deleted == 0 {
            return Err(LimitdError::KeyNotFound);
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // ConnectionManager has no explicit shutdown; dropping the last
        // clone closes the underlying connection. Operations after close
        // fail with a backend error.
        self.conn.write().await.take();
        Ok(())
    }
}
