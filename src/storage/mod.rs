//! Storage backends for rate limit state.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use self::redis::{ConsistencyMode, RedisStore};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Outcome of a rate-limit check or status read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request does not exceed the limit.
    pub allowed: bool,
    /// Units left in the current window, clamped at zero.
    pub remaining: i64,
    /// Wall-clock instant the current window expires.
    pub reset_at: DateTime<Utc>,
    /// The limit this evaluation was made against, echoed back.
    pub limit: i64,
}

/// Contract every rate-limit backend implements.
///
/// Implementations must stay correct when many callers hit the same key
/// concurrently; limits and windows are supplied per call, never stored.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Charge `cost` units against `key` and report whether the
    /// post-increment count is within `limit`.
    ///
    /// The cost is charged even when the outcome is a denial: a request
    /// over the limit is still recorded until the window expires or the
    /// key is reset.
    async fn check_and_update(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        cost: i64,
    ) -> Result<RateLimitResult>;

    /// Read the current state for `key` without mutating it.
    ///
    /// A key with no state reports `allowed = true`, `remaining = limit`
    /// and `reset_at = now`.
    async fn get_status(&self, key: &str, limit: i64) -> Result<RateLimitResult>;

    /// Delete all state for `key`. Fails with
    /// [`LimitdError::KeyNotFound`](crate::error::LimitdError::KeyNotFound)
    /// if nothing existed to delete.
    async fn reset(&self, key: &str) -> Result<()>;

    /// Release backend resources.
    async fn close(&self) -> Result<()>;
}

/// Wall-clock instant `ttl` from now, used to derive `reset_at` from a
/// remaining window lifetime.
pub(crate) fn reset_after(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::milliseconds(ttl.as_millis() as i64)
}
