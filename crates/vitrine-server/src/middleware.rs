use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use uuid::Uuid;

// =============================================================================
// Request id
// =============================================================================

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    // Add/propagate the request id header to response
    res.headers_mut().insert(header_name, req_id_value);

    res
}

// =============================================================================
// Rate limiting
// =============================================================================

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

struct WindowCounter {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP.
///
/// One instance per scope (general API, facets, orders); attached as a
/// per-route-group layer.
#[derive(Clone)]
pub struct RateLimiter {
    scope: &'static str,
    window: Duration,
    max: u32,
    counters: Arc<DashMap<String, WindowCounter>>,
}

impl RateLimiter {
    pub fn new(scope: &'static str, window: Duration, max: u32) -> Self {
        Self {
            scope,
            window,
            max,
            counters: Arc::new(DashMap::new()),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Count one request from `client` against the current window.
    pub fn check(&self, client: &str) -> RateDecision {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(client.to_string())
            .or_insert(WindowCounter {
                window_start: now,
                count: 0,
            });

        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.max {
            let elapsed = now.duration_since(entry.window_start);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return RateDecision::Limited {
                retry_after_secs: retry_after,
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max - entry.count,
        }
    }
}

/// Client identity: first `X-Forwarded-For` hop when behind a proxy,
/// otherwise the socket address.
fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&req);

    match limiter.check(&client) {
        RateDecision::Allowed { remaining } => {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(limiter.max()),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(remaining),
            );
            res
        }
        RateDecision::Limited { retry_after_secs } => {
            tracing::debug!(
                scope = limiter.scope,
                client = %client,
                "rate limit exceeded"
            );
            let body = json!({ "error": "Too many requests. Try again later." });
            (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    ("Retry-After", retry_after_secs.to_string()),
                    ("X-RateLimit-Limit", limiter.max().to_string()),
                    ("X-RateLimit-Remaining", "0".to_string()),
                ],
                Json(body),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max_then_limits() {
        let limiter = RateLimiter::new("test", Duration::from_secs(60), 3);

        assert_eq!(limiter.check("1.2.3.4"), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check("1.2.3.4"), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("1.2.3.4"), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(
            limiter.check("1.2.3.4"),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new("test", Duration::from_secs(60), 1);
        limiter.check("1.2.3.4");
        assert!(matches!(
            limiter.check("1.2.3.4"),
            RateDecision::Limited { .. }
        ));
        assert_eq!(limiter.check("5.6.7.8"), RateDecision::Allowed { remaining: 0 });
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new("test", Duration::ZERO, 1);
        limiter.check("1.2.3.4");
        // A zero-length window expires immediately, so the next check
        // starts a fresh window.
        assert_eq!(limiter.check("1.2.3.4"), RateDecision::Allowed { remaining: 0 });
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new("test", Duration::from_secs(60), 1);
        limiter.check("1.2.3.4");
        match limiter.check("1.2.3.4") {
            RateDecision::Limited { retry_after_secs } => {
                assert!((1..=60).contains(&retry_after_secs));
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }
}
