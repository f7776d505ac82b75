use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};
use tubewatch_detect::{AdWatchHook, DurationResolver, PageReader};

use crate::config::AppConfig;
use crate::models::DurationText;

/// Back-off schedule for repeated duration resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total `resolve` calls, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub growth: f64,
    pub max_delay: Duration,
    /// Minimum delay while an ad watch is armed.
    pub ad_floor: Duration,
    pub ad_growth: f64,
    pub ad_max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        AppConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the one just slept.
    pub fn next_delay(&self, delay: Duration, ad_active: bool) -> Duration {
        let (growth, cap) = if ad_active {
            (self.ad_growth, self.ad_max_delay)
        } else {
            (self.growth, self.max_delay)
        };
        let grown = (delay.as_millis() as f64 * growth.max(1.0)).round() as u64;
        Duration::from_millis(grown).min(cap)
    }
}

/// Resolve a duration, sleeping and retrying while nothing is available.
///
/// Returns [`DurationText::AwaitingAd`] when every attempt failed and the ad
/// watch is still armed, and `None` when the duration is simply unavailable.
pub async fn resolve_with_retry(
    resolver: &DurationResolver,
    page: &dyn PageReader,
    watch: &dyn AdWatchHook,
    policy: &RetryPolicy,
) -> Option<DurationText> {
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_attempts {
        if let Some(text) = resolver.resolve(page, watch).and_then(DurationText::clock) {
            debug!(attempt, duration = %text, "Duration resolved");
            return Some(text);
        }

        let ad_active = watch.is_active();
        if ad_active {
            delay = delay.max(policy.ad_floor);
        }

        if attempt < policy.max_attempts {
            debug!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                ad_active,
                "Duration unavailable, retrying"
            );
            sleep(delay).await;
            delay = policy.next_delay(delay, ad_active);
        }
    }

    if watch.is_active() {
        info!("Duration still hidden by an ad");
        Some(DurationText::AwaitingAd)
    } else {
        debug!(attempts = policy.max_attempts, "Duration unavailable");
        None
    }
}
