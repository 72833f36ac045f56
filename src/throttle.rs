//! Per-caller request throttling, applied across every route.
//!
//! Each caller IP gets a GCRA bucket from `governor`: up to `requests` at once, refilled at one
//! request per `window / requests`.
use std::{num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota,
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
};
use tracing::{debug, warn};

use crate::{config::RateLimitConfig, error::AppError, ip};

// Idle callers are forgotten once the table grows past this many.
const PRUNE_THRESHOLD: usize = 10_000;

pub struct RateLimiter {
    limiter: governor::RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let burst = NonZeroU32::new(config.requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(config.window / burst.get())
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(burst);
        Self {
            limiter: governor::RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        }
    }

    /// Count one request from `key`. `Err` carries how long until the next one would be allowed.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
            debug!("Pruned throttle table to {} callers", self.limiter.len());
        }
        self.limiter
            .check_key(&key.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

pub async fn throttle(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    // Requests without an identifiable caller share one bucket; the handler rejects them anyway.
    let key = ip::resolve(request.headers(), request.extensions())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(remaining) => {
            warn!("Rate limit hit for {key}");
            AppError::RateLimited {
                retry_after_secs: remaining.as_secs().max(1),
            }
            .into_response()
        }
    }
}
