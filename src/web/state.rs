use crate::services::rate_limit::RateLimiter;
use crate::services::sanitize::HtmlSanitizer;
use crate::{Config, Database};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub sanitizer: HtmlSanitizer,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            config,
            db,
            sanitizer: HtmlSanitizer::new(),
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }
}
