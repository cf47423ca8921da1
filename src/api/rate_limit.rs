//! Per-client request throttling.
//!
//! Each (client IP, tier) pair gets a bucket of tokens that refills
//! continuously over the configured window. Login attempts have their own,
//! much smaller, tier so password guessing is throttled independently of
//! regular API traffic.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// POST /login
    Login,
    /// Every authenticated route
    Api,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
    last_request: Instant,
}

impl Bucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity,
            window_start: now,
            last_request: now,
        }
    }
}

/// Remaining allowance after an accepted request
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets
    pub reset_after: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RateLimitTier), Bucket>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            window: Duration::from_secs(config.window_seconds.max(1)),
            config,
        }
    }

    fn capacity(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Login => self.config.login_requests_per_window,
            RateLimitTier::Api => self.config.api_requests_per_window,
        }
    }

    /// Take one token for `ip` in `tier`.
    ///
    /// Returns the remaining allowance, or the number of seconds to wait.
    pub fn check(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                limit: u32::MAX,
                remaining: u32::MAX,
                reset_after: 0,
            });
        }

        let capacity = self.capacity(tier);
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry((ip, tier))
            .or_insert_with(|| Bucket::full(capacity, now));

        let elapsed = now.duration_since(bucket.window_start);
        if elapsed >= self.window {
            *bucket = Bucket::full(capacity, now);
        } else {
            let idle = now.duration_since(bucket.last_request).as_secs_f64();
            let refill = (idle * capacity as f64 / self.window.as_secs_f64()) as u32;
            bucket.tokens = bucket.tokens.saturating_add(refill).min(capacity);
        }
        bucket.last_request = now;

        let reset_after = self
            .window
            .saturating_sub(now.duration_since(bucket.window_start))
            .as_secs();

        if bucket.tokens == 0 {
            return Err(reset_after.max(1));
        }
        bucket.tokens -= 1;
        Ok(RateLimitInfo {
            limit: capacity,
            remaining: bucket.tokens,
            reset_after,
        })
    }

    /// Drop buckets idle for more than two windows
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let expiry = self.window * 2;
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_request) < expiry);
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Peer address of the connection, or loopback when the server was not
/// started with connect info (in-process tests).
fn client_ip(request: &Request<Body>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub async fn rate_limit_login(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    rate_limit_with_tier(&state, request, next, RateLimitTier::Login).await
}

pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    rate_limit_with_tier(&state, request, next, RateLimitTier::Api).await
}

async fn rate_limit_with_tier(
    state: &AppState,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request);

    let info = state.rate_limiter.check(ip, tier).map_err(|retry_after| {
        tracing::warn!(client_ip = %ip, tier = ?tier, retry_after, "Rate limit exceeded");
        ApiError::rate_limited(retry_after)
    })?;

    let mut response = next.run(request).await;
    if state.rate_limiter.config.enabled {
        let headers = response.headers_mut();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
        headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_after));
    }
    Ok(response)
}

/// Periodically sweep idle buckets
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs.max(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            rate_limiter.cleanup_expired();
            tracing::debug!(entries = rate_limiter.entry_count(), "Rate limiter cleanup complete");
        }
    });
}
