//! Core rate limiter orchestration.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::error::{LimitdError, Result};
use crate::storage::{RateLimitResult, RateLimitStore};

/// Validates caller input and delegates to the configured storage backend.
///
/// Holds no counter state of its own; one instance is shared across all
/// concurrent callers. Validation failures are reported with a distinct
/// error kind per argument and never reach storage.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    /// Create a rate limiter backed by the given store.
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Check whether `cost` units may be consumed for `key`, charging them
    /// regardless of the outcome.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        cost: i64,
    ) -> Result<RateLimitResult> {
        if key.trim().is_empty() {
            return Err(LimitdError::InvalidKey);
        }
        if limit <= 0 {
            return Err(LimitdError::InvalidLimit);
        }
        if window.is_zero() {
            return Err(LimitdError::InvalidWindow);
        }
        if cost <= 0 {
            return Err(LimitdError::InvalidCost);
        }

        trace!(key = %key, limit = limit, cost = cost, "Checking rate limit");

        self.store.check_and_update(key, limit, window, cost).await
    }

    /// Read the current window state for `key` without consuming units.
    pub async fn get_status(&self, key: &str, limit: i64) -> Result<RateLimitResult> {
        if key.trim().is_empty() {
            return Err(LimitdError::InvalidKey);
        }
        if limit <= 0 {
            return Err(LimitdError::InvalidLimit);
        }

        self.store.get_status(key, limit).await
    }

    /// Clear all rate limit state for `key`.
    pub async fn reset_limit(&self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(LimitdError::InvalidKey);
        }

        self.store.reset(key).await
    }

    /// Release the backing store's resources.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}
