//! Per-client-IP rate limiting for the webhook receiver: at most 100
//! requests per 60-second window, enforced with in-process atomic counters.

use rate_counter::RateCounter;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

pub const WEBHOOK_RATE_LIMIT: u32 = 100;
pub const WEBHOOK_RATE_WINDOW: Duration = Duration::from_secs(60);

pub fn new_webhook_rate_limiter() -> Arc<RateCounter<IpAddr>> {
    RateCounter::new(WEBHOOK_RATE_LIMIT, WEBHOOK_RATE_WINDOW)
}
