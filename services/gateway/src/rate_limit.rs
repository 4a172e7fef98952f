use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use types::ids::UserId;

/// Rejection for one inbound event. The session stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rate limit of {limit} events per window exceeded")]
pub struct RateLimitExceeded {
    pub limit: u32,
    /// Start of the next window
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Events allowed per user per window
    pub max_events: u32,
    pub window: Duration,
    /// How often stale windows are dropped in bulk
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: 60,
            window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Fixed-window event counter keyed by `(user, window index)`.
///
/// A new window starts a fresh key, so counters reset without timers. Old
/// keys are only removed by the periodic sweep.
pub struct RateLimiter {
    windows: DashMap<(UserId, i64), u32>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.config.window.as_millis())
            .unwrap_or(i64::MAX)
            .max(1)
    }

    fn window_index(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().div_euclid(self.window_millis())
    }

    fn window_end(&self, index: i64) -> DateTime<Utc> {
        let millis = index.saturating_add(1).saturating_mul(self.window_millis());
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Count one event for `user` and fail if the window budget is spent.
    ///
    /// The check and the increment happen under the same shard lock, so two
    /// concurrent events cannot both squeeze past the boundary.
    pub fn check(&self, user: &UserId, now: DateTime<Utc>) -> Result<u32, RateLimitExceeded> {
        let index = self.window_index(now);
        let mut count = self.windows.entry((user.clone(), index)).or_insert(0);

        if *count >= self.config.max_events {
            return Err(RateLimitExceeded {
                limit: self.config.max_events,
                reset_at: self.window_end(index),
            });
        }
        *count += 1;
        Ok(self.config.max_events - *count)
    }

    /// Drop every window older than the one containing `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let current = self.window_index(now);
        let before = self.windows.len();
        self.windows.retain(|(_, index), _| *index >= current);
        before.saturating_sub(self.windows.len())
    }

    pub fn clear(&self) {
        self.windows.clear();
    }

    pub fn tracked_windows(&self) -> usize {
        self.windows.len()
    }

    /// Sweep on a fixed interval until `stop` is notified.
    pub async fn run_sweeper(self: Arc<Self>, stop: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep(Utc::now());
                    if removed > 0 {
                        tracing::debug!(removed, "rate limit windows swept");
                    }
                }
                _ = stop.notified() => {
                    tracing::debug!("rate limit sweeper stopped");
                    break;
                }
            }
        }
    }
}
