//! Per-account API rate limiting
//!
//! Fixed window counters keyed `ratelimit:api:{account}:{bucket}` where the
//! bucket is `unix_now / window`. Counting goes through [`CounterStore`],
//! whose `increment` must be atomic.
//!
//! Configurable via environment variables (read by the API config):
//! - `API_RATE_LIMIT_REQUESTS`: requests per window (default: 1000)
//! - `API_RATE_LIMIT_WINDOW_SECS`: window length (default: 3600)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// Atomic increment-and-return over an expiring key
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, creating it with a `window_secs` lifetime if absent,
    /// and return the new count.
    async fn increment(&self, key: &str, window_secs: u64) -> BillingResult<u64>;
}

/// In-memory counters (for tests and development without Redis)
#[derive(Default)]
pub struct InMemoryCounterStore {
    /// key -> (count, expires_at)
    counters: Mutex<HashMap<String, (u64, Instant)>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters (call periodically)
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.counters
            .lock()
            .await
            .retain(|_, (_, expires_at)| *expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.counters.lock().await.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window_secs: u64) -> BillingResult<u64> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        let entry = counters
            .entry(key.to_string())
            .or_insert((0, now + Duration::from_secs(window_secs)));

        // Reset if the previous window has lapsed
        if entry.1 <= now {
            *entry = (0, now + Duration::from_secs(window_secs));
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}

/// Redis counters shared by every API instance
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> BillingResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window_secs: u64) -> BillingResult<u64> {
        let mut conn = self.manager.clone();
        let ttl = i64::try_from(window_secs)
            .map_err(|_| BillingError::Config(format!("window too large: {}", window_secs)))?;

        // MULTI/EXEC keeps INCR and EXPIRE together
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .expire(key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub requests_per_window: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 1000,
            window_secs: 3600,
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    pub reset_at: OffsetDateTime,
    pub retry_after_seconds: Option<u64>,
}

/// Rate limiter service
#[derive(Clone)]
pub struct ApiRateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl ApiRateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Create a limiter backed by in-memory counters
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()), config)
    }

    /// Count one request against the account's current window
    pub async fn check_api_rate_limit(&self, account_id: Uuid) -> BillingResult<RateLimitDecision> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let window = self.config.window_secs.max(1);
        let window_i64 = i64::try_from(window).unwrap_or(i64::MAX);
        let bucket = now.div_euclid(window_i64);

        let key = format!("ratelimit:api:{}:{}", account_id, bucket);
        let count = self.store.increment(&key, window).await?;

        let quota = self.config.requests_per_window;
        let allowed = count <= quota;
        let reset_unix = bucket.saturating_add(1).saturating_mul(window_i64);
        let reset_at = OffsetDateTime::from_unix_timestamp(reset_unix)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());

        let retry_after = if allowed {
            None
        } else {
            Some(u64::try_from(reset_unix - now).unwrap_or(0).max(1))
        };

        if !allowed {
            tracing::debug!(account_id = %account_id, count, quota, "API rate limit exceeded");
        }

        Ok(RateLimitDecision {
            allowed,
            remaining: quota.saturating_sub(count),
            limit: quota,
            reset_at,
            retry_after_seconds: retry_after,
        })
    }
}
