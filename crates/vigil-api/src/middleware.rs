//! CORS, security headers, and per-IP rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

type IpRateLimiter = RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

const ENTRY_TTL: Duration = Duration::from_secs(3600);
const MAX_TRACKED_IPS: usize = 10_000;

/// Per-IP token buckets with TTL'd eviction, keyed on a fixed rps/burst
/// pair taken from `ApiConfig` rather than per-route overrides.
pub struct RateLimiterCache {
    limiters: RwLock<HashMap<IpAddr, (Arc<IpRateLimiter>, Instant)>>,
    rps: u32,
    burst: u32,
}

impl RateLimiterCache {
    pub fn new(rps: u32, burst: u32) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            rps,
            burst,
        }
    }

    async fn check(&self, ip: IpAddr) -> bool {
        self.cleanup_expired().await;

        let existing = self.limiters.read().await.get(&ip).map(|(l, _)| Arc::clone(l));
        let limiter = match existing {
            Some(l) => l,
            None => {
                let quota = Quota::per_second(NonZeroU32::new(self.rps.max(1)).unwrap())
                    .allow_burst(NonZeroU32::new(self.burst.max(1)).unwrap());
                let limiter = Arc::new(RateLimiter::direct(quota));
                self.limiters.write().await.insert(ip, (Arc::clone(&limiter), Instant::now()));
                limiter
            }
        };

        if let Some(entry) = self.limiters.write().await.get_mut(&ip) {
            entry.1 = Instant::now();
        }

        limiter.check().is_ok()
    }

    async fn cleanup_expired(&self) {
        let mut limiters = self.limiters.write().await;
        if limiters.len() < MAX_TRACKED_IPS {
            return;
        }
        let now = Instant::now();
        limiters.retain(|_, (_, last_seen)| now.duration_since(*last_seen) < ENTRY_TTL);
    }
}

/// Builds the CORS layer. Wildcard origins cannot be combined with
/// credentialed requests in `tower-http`, so the two branches are
/// structurally different rather than parameterized.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(true)
    }
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    response
}

/// Rejects with 429 once the caller's IP has exhausted its token bucket.
/// Applied via `from_fn_with_state(rate_limiter, ...)`, so the state here
/// is the limiter cache itself, independent of the router's `AppState`.
/// The bucket is in-memory and per-process, so it does not survive a
/// restart — acceptable for a single-coordinator deployment.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterCache>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = extract_client_ip(&request).unwrap_or_else(|| "0.0.0.0".parse().unwrap());
    if limiter.check(ip).await {
        Ok(next.run(request).await)
    } else {
        warn!(ip = %ip, "rate limit exceeded");
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

fn extract_client_ip(request: &Request<Body>) -> Option<IpAddr> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_allows_burst_then_throttles() {
        let cache = RateLimiterCache::new(1, 2);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(cache.check(ip).await);
        assert!(cache.check(ip).await);
        assert!(!cache.check(ip).await);
    }

    #[test]
    fn wildcard_cors_never_sets_allow_credentials() {
        let layer = cors_layer(&["*".to_string()]);
        // Smoke-check only: constructing with a wildcard must not panic,
        // which it would if `allow_credentials(true)` were combined with it.
        drop(layer);
    }
}
