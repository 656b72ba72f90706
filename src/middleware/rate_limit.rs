//! Per-IP fixed window rate limiting

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use crate::error::ApiError;
use crate::state::AppState;

/// Tables larger than this are swept of expired windows on insert.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed window counter keyed by client IP. State is per process.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs.max(1)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request. `Err` carries the seconds until the window resets.
    pub fn check(&self, ip: IpAddr, now: Instant) -> Result<u32, u64> {
        let mut windows = self.windows.lock();

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(ip).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            let remaining = self.window.saturating_sub(elapsed);
            // Round up so clients never retry a fraction of a second early.
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(secs.max(1));
        }

        entry.count += 1;
        Ok(self.max_requests - entry.count)
    }
}

/// Client address: socket peer when known, else the first `X-Forwarded-For` hop.
fn client_ip(request: &Request) -> IpAddr {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    forwarded_for(request.headers()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    if !state.config.api.enable_rate_limiting {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request);
    match state.limiter.check(ip, Instant::now()) {
        Ok(_) => Ok(next.run(request).await),
        Err(retry_after) => {
            tracing::warn!(%ip, retry_after, "Rate limit exceeded");
            Err(ApiError::too_many_requests(retry_after))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    #[test]
    fn rejects_requests_beyond_budget() {
        let limiter = RateLimiter::new(2, 60);
        let now = Instant::now();
        assert_eq!(limiter.check(IP, now), Ok(1));
        assert_eq!(limiter.check(IP, now), Ok(0));
        assert_eq!(limiter.check(IP, now), Err(60));

        // Other clients have their own window.
        assert!(limiter.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), now).is_ok());
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, 10);
        let start = Instant::now();
        assert!(limiter.check(IP, start).is_ok());
        assert_eq!(limiter.check(IP, start + Duration::from_millis(2500)), Err(8));
        assert!(limiter.check(IP, start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn parses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(forwarded_for(&headers), Some("203.0.113.7".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(forwarded_for(&headers), None);
    }
}
