use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::Store;
use crate::mail::Mailer;
use crate::middleware::RateLimiter;

/// Shared handles passed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let limiter = RateLimiter::new(config.api.rate_limit_requests, config.api.rate_limit_window_secs);
        Self {
            store,
            config: Arc::new(config),
            mailer,
            limiter: Arc::new(limiter),
        }
    }
}
