use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::web::{AppState, WebError};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Counts one request for `key`. Returns false once the window is exhausted.
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.write().await;
        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drops windows that have expired.
    pub async fn evict_expired(&self) {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        windows.retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Periodically evicts expired windows until `cancel` fires.
    pub async fn run_eviction(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.window.max(Duration::from_secs(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.evict_expired().await,
            }
        }
        tracing::debug!("rate limiter eviction stopped");
    }
}

/// Client address: the socket peer, then the first `X-Forwarded-For` hop, then `unknown`.
pub fn client_key(connect_info: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = connect_info {
        return addr.ip().to_string();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| String::from("unknown"))
}

pub async fn rate_limit_fn(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_key(peer, req.headers());

    if !state.rate_limiter().check(&key).await {
        tracing::warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
        return WebError::RateLimited.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn blocks_after_max_requests() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("1.2.3.4", now).await);
        }
        assert!(!limiter.check_at("1.2.3.4", now).await);
        // other clients have their own window
        assert!(limiter.check_at("5.6.7.8", now).await);
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("ip", start).await);
        assert!(!limiter.check_at("ip", start + Duration::from_secs(9)).await);
        assert!(limiter.check_at("ip", start + Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn eviction_drops_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        assert!(limiter.check("ip").await);
        assert_eq!(limiter.tracked_clients().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.evict_expired().await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[test]
    fn client_key_fallbacks() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(None, &headers), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(client_key(None, &headers), "10.0.0.1");

        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(client_key(Some(peer), &headers), "127.0.0.1");
    }
}
