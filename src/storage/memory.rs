//! In-process fixed-window counters.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{reset_after, RateLimitResult, RateLimitStore};
use crate::error::{LimitdError, Result};

/// Per-key window state: the consumed count and when it lapses.
#[derive(Debug)]
struct WindowSlot {
    count: i64,
    expires_at: Instant,
}

/// Fixed-window counter backend held entirely in process memory.
///
/// Mirrors the Redis backend's semantics for single-node deployments and
/// tests. The map's entry-level locking makes each per-key
/// read-modify-write atomic; expired slots are lazily replaced on the next
/// touch rather than swept by a timer.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: DashMap<String, WindowSlot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check_and_update(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        cost: i64,
    ) -> Result<RateLimitResult> {
        let now = Instant::now();

        let mut slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| WindowSlot {
                count: 0,
                expires_at: now + window,
            });

        if slot.expires_at <= now {
            // The previous window lapsed; this consumption anchors a new one.
            slot.count = 0;
            slot.expires_at = now + window;
        }

        slot.count += cost;
        let count = slot.count;
        let ttl = slot.expires_at - now;
        drop(slot);

        Ok(RateLimitResult {
            allowed: count <= limit,
            remaining: (limit - count).max(0),
            reset_at: reset_after(ttl),
            limit,
        })
    }

    async fn get_status(&self, key: &str, limit: i64) -> Result<RateLimitResult> {
        let now = Instant::now();

        if let Some(slot) = self.slots.get(key) {
            if slot.expires_at > now {
                return Ok(RateLimitResult {
                    allowed: slot.count <= limit,
                    remaining: (limit - slot.count).max(0),
                    reset_at: reset_after(slot.expires_at - now),
                    limit,
                });
            }
        }

        Ok(RateLimitResult {
            allowed: true,
            remaining: limit,
            reset_at: Utc::now(),
            limit,
        })
    }

    async fn reset(&self, key: &str) -> Result<()> {
        // An expired-but-unswept slot counts as absent; removing it here is
        // the lazy purge.
        match self.slots.remove(key) {
            Some((_, slot)) if slot.expires_at > Instant::now() => Ok(()),
            _ => Err(LimitdError::KeyNotFound),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
