//! Sliding-window rate limiting keyed by user id or client IP.
//!
//! The window is held in process memory: with several server instances
//! each instance enforces its own window, so the effective global limit
//! is `max * instances`. Credit and quota enforcement never rely on
//! this layer; it only blunts abusive request rates.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Tracks request timestamps per key inside a fixed window.
pub struct SlidingWindowLimiter {
    max: u32,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for `key`; returns `false` when the key has already
    /// used up the window.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap();
        let bucket = hits.entry(key.to_string()).or_default();

        while let Some(oldest) = bucket.front() {
            if now.duration_since(*oldest) >= self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() as u32 >= self.max {
            return false;
        }
        bucket.push_back(now);
        true
    }
}

/// Axum middleware enforcing the limiter on every request.
///
/// The key is the authenticated user id when a valid bearer token is
/// present, otherwise the client IP from `x-forwarded-for` (falling
/// back to a single shared bucket for direct local traffic).
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = limiter_key(&state, &request);
    if !state.limiter.check(&key) {
        tracing::warn!(key = %key, "Rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

fn limiter_key(state: &AppState, request: &Request) -> String {
    if let Some(jwt) = &state.config.jwt {
        let token = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if let Some(claims) = token.and_then(|t| validate_token(t, jwt).ok()) {
            return format!("user:{}", claims.sub);
        }
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| format!("ip:{}", ip.trim()))
        .unwrap_or_else(|| "ip:local".to_string())
}
