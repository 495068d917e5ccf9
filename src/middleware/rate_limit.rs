use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::{AuthError, Error};

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Fixed-window counter per key.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    buckets: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        let mut guard = self.buckets.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();

        if guard.len() > 10_000 {
            let window = self.window;
            guard.retain(|_, w| now.duration_since(w.start) < window);
        }

        let state = guard.entry(key.to_string()).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(state.start) >= self.window {
            state.start = now;
            state.count = 0;
        }
        if state.count < self.limit {
            state.count += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&self, key: &str) {
        let mut guard = self.buckets.lock().expect("rate limiter mutex poisoned");
        guard.remove(key);
    }
}

pub async fn rps_middleware(
    State(state): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&req);
    if !state.allow(&key) {
        return Error::Auth(AuthError::RateLimited).into_response();
    }
    next.run(req).await
}

fn client_key(req: &Request<Body>) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

pub fn new_rps_state(rps: u32) -> RateLimiter {
    RateLimiter::new(rps, Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_each_key_independently() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow("a@x.pt"));
        assert!(limiter.allow("a@x.pt"));
        assert!(!limiter.allow("a@x.pt"));
        assert!(limiter.allow("b@x.pt"));
    }

    #[test]
    fn window_expiry_restores_budget() {
        let limiter = RateLimiter::new(1, Duration::from_millis(0));
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn reset_clears_a_key() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
        limiter.reset("k");
        assert!(limiter.allow("k"));
    }
}
