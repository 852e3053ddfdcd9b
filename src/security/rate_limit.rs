//! Token-bucket rate limiting.

use async_trait::async_trait;
use axum::http::HeaderValue;
use axum::response::Response;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::{KeyResolverConfig, RateLimitConfig};
use crate::error::{GatewayError, RateLimitHeaders};
use crate::filter::{Filter, FilterKind, Next};
use crate::http::request::Exchange;

/// Key shared by every request whose key cannot be resolved.
pub const UNKNOWN_KEY: &str = "unknown";

pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_REPLENISH_RATE: &str = "x-ratelimit-replenish-rate";
pub const X_RATELIMIT_BURST_CAPACITY: &str = "x-ratelimit-burst-capacity";
pub const X_RATELIMIT_REQUESTED_TOKENS: &str = "x-ratelimit-requested-tokens";

/// A single token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64, requested: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = self.last_refill.max(now);

        if self.tokens >= requested {
            self.tokens -= requested;
            true
        } else {
            false
        }
    }
}

/// Result of one `allow` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Whole tokens left after this call.
    pub remaining: u64,
}

/// Per-key token buckets for one filter instance.
///
/// Each key has its own mutex; the map only guards insertion, so unrelated
/// keys never wait on each other.
pub struct TokenBucketLimiter {
    replenish_rate: f64,
    burst_capacity: u64,
    requested_tokens: u64,
    idle_ttl: Option<Duration>,
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
}

impl TokenBucketLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            replenish_rate: config.replenish_rate,
            burst_capacity: config.burst_capacity,
            requested_tokens: config.requested_tokens,
            idle_ttl: config.idle_ttl_secs.map(Duration::from_secs),
            buckets: DashMap::new(),
        }
    }

    /// Try to take the configured number of tokens for `key`.
    pub fn allow(&self, key: &str) -> RateLimitDecision {
        self.allow_at(key, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let capacity = self.burst_capacity as f64;
        let bucket = self.bucket(key, now);
        let mut bucket = bucket.lock();

        let allowed = bucket.try_acquire(
            now,
            capacity,
            self.replenish_rate,
            self.requested_tokens as f64,
        );
        RateLimitDecision {
            allowed,
            remaining: bucket.tokens.floor() as u64,
        }
    }

    fn bucket(&self, key: &str, now: Instant) -> Arc<Mutex<TokenBucket>> {
        if let Some(existing) = self.buckets.get(key) {
            return existing.value().clone();
        }
        let capacity = self.burst_capacity as f64;
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(capacity, now))))
            .value()
            .clone()
    }

    /// Drop buckets idle for longer than the configured TTL.
    /// Returns how many were removed. No-op without a TTL.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let ttl = match self.idle_ttl {
            Some(ttl) => ttl,
            None => return 0,
        };

        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            // A bucket cloned out by an in-flight request is never dropped.
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            now.saturating_duration_since(bucket.lock().last_refill) < ttl
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn headers(&self, remaining: u64) -> RateLimitHeaders {
        RateLimitHeaders {
            remaining,
            replenish_rate: self.replenish_rate,
            burst_capacity: self.burst_capacity,
            requested_tokens: self.requested_tokens,
        }
    }
}

impl fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("replenish_rate", &self.replenish_rate)
            .field("burst_capacity", &self.burst_capacity)
            .field("requested_tokens", &self.requested_tokens)
            .field("idle_ttl", &self.idle_ttl)
            .field("keys", &self.buckets.len())
            .finish()
    }
}

/// Derives the bucket key for a request.
pub trait KeyResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, exchange: &Exchange) -> String;
}

/// Keys by client IP.
#[derive(Debug, Clone, Default)]
pub struct RemoteAddressKeyResolver;

impl KeyResolver for RemoteAddressKeyResolver {
    fn resolve(&self, exchange: &Exchange) -> String {
        exchange
            .context
            .remote_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_KEY.to_string())
    }
}

/// Keys by the value of a request header.
#[derive(Debug, Clone)]
pub struct HeaderKeyResolver {
    header: String,
}

impl HeaderKeyResolver {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl KeyResolver for HeaderKeyResolver {
    fn resolve(&self, exchange: &Exchange) -> String {
        exchange
            .request
            .headers()
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_KEY.to_string())
    }
}

pub fn key_resolver(config: &KeyResolverConfig) -> Box<dyn KeyResolver> {
    match config {
        KeyResolverConfig::RemoteAddress => Box::new(RemoteAddressKeyResolver),
        KeyResolverConfig::Header(name) => Box::new(HeaderKeyResolver::new(name.clone())),
    }
}

/// Rate limiting filter.
#[derive(Debug)]
pub struct RateLimitFilter {
    limiter: Arc<TokenBucketLimiter>,
    resolver: Box<dyn KeyResolver>,
}

impl RateLimitFilter {
    pub fn new(limiter: Arc<TokenBucketLimiter>, resolver: Box<dyn KeyResolver>) -> Self {
        Self { limiter, resolver }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Arc::new(TokenBucketLimiter::new(config)),
            key_resolver(&config.key_resolver),
        )
    }

    pub fn limiter(&self) -> &Arc<TokenBucketLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl Filter for RateLimitFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::RateLimit
    }

    async fn apply(&self, exchange: Exchange, next: Next<'_>) -> Result<Response, GatewayError> {
        let key = self.resolver.resolve(&exchange);
        let decision = self.limiter.allow(&key);
        let limits = self.limiter.headers(decision.remaining);
        // Later rejections still report the bucket state.
        exchange.context.record_rate_limit(limits);

        if !decision.allowed {
            tracing::warn!(
                request_id = %exchange.context.request_id(),
                client = %key,
                "Rate limit exceeded"
            );
            return Err(GatewayError::RateLimitExceeded { key, limits });
        }

        let mut response = next.run(exchange).await?;
        apply_headers(response.headers_mut(), &limits);
        Ok(response)
    }
}

/// Write the `X-RateLimit-*` headers.
pub fn apply_headers(headers: &mut axum::http::HeaderMap, limits: &RateLimitHeaders) {
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(limits.remaining));
    headers.insert(X_RATELIMIT_BURST_CAPACITY, HeaderValue::from(limits.burst_capacity));
    headers.insert(X_RATELIMIT_REQUESTED_TOKENS, HeaderValue::from(limits.requested_tokens));
    if let Ok(value) = HeaderValue::from_str(&limits.replenish_rate.to_string()) {
        headers.insert(X_RATELIMIT_REPLENISH_RATE, value);
    }
}

/// Periodically evict idle buckets until shutdown.
pub async fn run_eviction(
    limiters: Vec<Arc<TokenBucketLimiter>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = match limiters.iter().filter_map(|l| l.idle_ttl()).min() {
        Some(ttl) => ttl,
        None => return,
    };

    tracing::info!(period_secs = period.as_secs(), "Rate limiter eviction starting");
    let mut ticker = time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let evicted: usize = limiters.iter().map(|l| l.evict_idle(now)).sum();
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted idle rate limit buckets");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limiter eviction received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
