use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::state::AppState;
use hemolink_api::{ApiError, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET};

// =============================================================================
// Request ID Middleware
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
    res.headers_mut().insert(header_name.clone(), req_id_value);

    res
}

// =============================================================================
// Rate Limiting
// =============================================================================

/// Request buckets with independent per-minute limits. Health endpoints
/// and the root banner are exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    General,
    Import,
    Sync,
}

impl RateCategory {
    /// Classifies a request; `None` means exempt from rate limiting.
    pub fn of(method: &Method, path: &str) -> Option<Self> {
        let rest = path.strip_prefix(crate::API_PREFIX).unwrap_or(path);
        if path == "/" || rest.is_empty() || rest == "/" || rest.starts_with("/health") {
            return None;
        }
        if rest.starts_with("/import") {
            return Some(Self::Import);
        }
        if rest.starts_with("/sync") && *method == Method::POST {
            return Some(Self::Sync);
        }
        Some(Self::General)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start_minute: u64,
    count: u32,
}

/// Outcome of one rate-limit check, carried into the response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch: u64,
}

/// Fixed-window counter per (category, client address).
pub struct RateLimiter {
    cfg: RateLimitConfig,
    windows: DashMap<(RateCategory, String), Window>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            cfg,
            windows: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.cfg.enabled
    }

    fn limit_for(&self, category: RateCategory) -> u32 {
        match category {
            RateCategory::General => self.cfg.general_per_minute,
            RateCategory::Import => self.cfg.import_per_minute,
            RateCategory::Sync => self.cfg.sync_per_minute,
        }
    }

    pub fn check(&self, category: RateCategory, client: &str) -> RateDecision {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.check_at(category, client, now_secs)
    }

    /// Counts a request against the client's current minute window.
    pub fn check_at(&self, category: RateCategory, client: &str, now_secs: u64) -> RateDecision {
        let minute = now_secs / 60;
        let limit = self.limit_for(category);
        let mut entry = self
            .windows
            .entry((category, client.to_string()))
            .or_insert(Window {
                start_minute: minute,
                count: 0,
            });
        if entry.start_minute != minute {
            entry.start_minute = minute;
            entry.count = 0;
        }
        entry.count += 1;
        RateDecision {
            allowed: entry.count <= limit,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_epoch: (minute + 1) * 60,
        }
    }
}

fn client_key(req: &Request<Body>) -> String {
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
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_rate_headers(res: &mut Response, decision: &RateDecision) {
    let headers = res.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(HeaderName::from_static(RATE_LIMIT_LIMIT), value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert(HeaderName::from_static(RATE_LIMIT_REMAINING), value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_epoch.to_string()) {
        headers.insert(HeaderName::from_static(RATE_LIMIT_RESET), value);
    }
}

/// Rate limiting middleware: classifies the request, counts it against the
/// client's window, and stamps `X-RateLimit-*` headers on every limited
/// response (including 429 rejections).
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.limiter.enabled() {
        return next.run(req).await;
    }
    let Some(category) = RateCategory::of(req.method(), req.uri().path()) else {
        return next.run(req).await;
    };

    let client = client_key(&req);
    let decision = state.limiter.check(category, &client);

    if !decision.allowed {
        tracing::warn!(
            client = %client,
            category = ?category,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        let mut res = ApiError::too_many_requests(format!(
            "Rate limit exceeded: {} requests per minute",
            decision.limit
        ))
        .into_response();
        apply_rate_headers(&mut res, &decision);
        return res;
    }

    let mut res = next.run(req).await;
    apply_rate_headers(&mut res, &decision);
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_classification() {
        let get = Method::GET;
        let post = Method::POST;
        let delete = Method::DELETE;

        assert_eq!(RateCategory::of(&get, "/api/v1/health"), None);
        assert_eq!(RateCategory::of(&get, "/api/v1/health/metrics"), None);
        assert_eq!(RateCategory::of(&get, "/"), None);
        assert_eq!(
            RateCategory::of(&post, "/api/v1/import/donors"),
            Some(RateCategory::Import)
        );
        assert_eq!(
            RateCategory::of(&post, "/api/v1/sync/donations"),
            Some(RateCategory::Sync)
        );
        assert_eq!(
            RateCategory::of(&post, "/api/v1/sync/full"),
            Some(RateCategory::Sync)
        );
        // Reads on the sync surface count against general traffic
        assert_eq!(
            RateCategory::of(&get, "/api/v1/sync/status"),
            Some(RateCategory::General)
        );
        assert_eq!(
            RateCategory::of(&delete, "/api/v1/sync/cache"),
            Some(RateCategory::General)
        );
        assert_eq!(
            RateCategory::of(&get, "/api/v1/info"),
            Some(RateCategory::General)
        );
    }

    #[test]
    fn test_fixed_window_counts_and_rejects() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: true,
            general_per_minute: 100,
            import_per_minute: 10,
            sync_per_minute: 5,
        });

        let now = 600; // minute 10
        for i in 1..=5 {
            let decision = limiter.check_at(RateCategory::Sync, "1.2.3.4", now);
            assert!(decision.allowed, "request {i} should pass");
            assert_eq!(decision.limit, 5);
            assert_eq!(decision.remaining, 5 - i);
        }
        let denied = limiter.check_at(RateCategory::Sync, "1.2.3.4", now);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_epoch, 660);
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: true,
            general_per_minute: 100,
            import_per_minute: 10,
            sync_per_minute: 5,
        });

        for _ in 0..6 {
            limiter.check_at(RateCategory::Sync, "1.2.3.4", 600);
        }
        // Next minute starts a fresh window
        let decision = limiter.check_at(RateCategory::Sync, "1.2.3.4", 661);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn test_clients_and_categories_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: true,
            general_per_minute: 100,
            import_per_minute: 10,
            sync_per_minute: 5,
        });

        for _ in 0..6 {
            limiter.check_at(RateCategory::Sync, "1.2.3.4", 600);
        }
        // Other client unaffected
        assert!(limiter.check_at(RateCategory::Sync, "5.6.7.8", 600).allowed);
        // Same client, other category unaffected
        assert!(
            limiter
                .check_at(RateCategory::Import, "1.2.3.4", 600)
                .allowed
        );
    }
}
