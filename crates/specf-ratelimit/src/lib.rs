//! Global per-host rate limiter.
//!
//! Modeled as an injected `Arc<dyn RateLimiter>` capability,
//! constructed once at process start and shared by every
//! concurrent product task the daemon fans out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Waits out the minimum delay for a host before a fetch against it may
/// proceed.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn wait_for_host(&self, host: &str);
}

/// Per-host minimum-delay limiter backed by a single shared map of last
/// call timestamps. One instance is constructed per process and shared
/// (via `Arc`) across every concurrently-running product.
pub struct PerHostRateLimiter {
    last_call: Mutex<HashMap<String, Instant>>,
    min_delay: Duration,
}

impl PerHostRateLimiter {
    #[must_use]
    pub fn new(min_delay_ms: u64) -> Self {
        Self { last_call: Mutex::new(HashMap::new()), min_delay: Duration::from_millis(min_delay_ms) }
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

#[async_trait]
impl RateLimiter for PerHostRateLimiter {
    async fn wait_for_host(&self, host: &str) {
        let wait = {
            let mut last_call = self.last_call.lock().await;
            let now = Instant::now();
            let wait = last_call.get(host).and_then(|last| {
                let elapsed = now.duration_since(*last);
                (elapsed < self.min_delay).then(|| self.min_delay - elapsed)
            });
            last_call.insert(host.to_string(), now);
            wait
        };

        if let Some(wait) = wait {
            debug!(host, wait_ms = wait.as_millis() as u64, "rate limiting host");
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_for_a_host_never_waits() {
        let limiter = PerHostRateLimiter::new(1000);
        let start = Instant::now();
        limiter.wait_for_host("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn second_call_for_same_host_waits_out_the_delay() {
        let limiter = PerHostRateLimiter::new(150);
        limiter.wait_for_host("example.com").await;
        let start = Instant::now();
        limiter.wait_for_host("example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn different_hosts_do_not_contend() {
        let limiter = PerHostRateLimiter::new(1000);
        limiter.wait_for_host("a.com").await;
        let start = Instant::now();
        limiter.wait_for_host("b.com").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
