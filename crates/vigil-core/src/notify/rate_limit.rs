//! Per-channel notification rate limiting.
//!
//! Counters live under their own locks, independent from alert and incident
//! entity locks, so one channel's throughput limit never serializes
//! unrelated entities.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Per-channel usage window.
#[derive(Debug, Clone, Copy)]
struct ChannelUsage {
    hour_start: DateTime<Utc>,
    count: u32,
    last_sent: Option<DateTime<Utc>>,
}

/// Tracks per-channel send quotas: max sends per rolling hour plus an
/// optional cooldown between consecutive sends.
#[derive(Debug, Default)]
pub struct ChannelRateLimiter {
    usage: DashMap<String, ChannelUsage>,
}

impl ChannelRateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self { usage: DashMap::new() }
    }

    /// Checks whether `channel_id` may send now, consuming quota if so.
    ///
    /// Returns `false` when the hourly quota is spent or the cooldown since
    /// the previous send has not elapsed. A denied check consumes nothing.
    #[must_use]
    pub fn try_acquire(&self, channel_id: &str, max_per_hour: u32, cooldown_seconds: u64) -> bool {
        let now = Utc::now();

        let mut usage = self.usage.entry(channel_id.to_string()).or_insert(ChannelUsage {
            hour_start: now,
            count: 0,
            last_sent: None,
        });

        if now.signed_duration_since(usage.hour_start) >= Duration::hours(1) {
            usage.hour_start = now;
            usage.count = 0;
        }

        if usage.count >= max_per_hour {
            return false;
        }

        if cooldown_seconds > 0 {
            if let Some(last) = usage.last_sent {
                #[allow(clippy::cast_possible_wrap)]
                if now.signed_duration_since(last) < Duration::seconds(cooldown_seconds as i64) {
                    return false;
                }
            }
        }

        usage.count += 1;
        usage.last_sent = Some(now);
        true
    }

    /// Current send count in the active window for a channel.
    #[must_use]
    pub fn current_count(&self, channel_id: &str) -> u32 {
        self.usage.get(channel_id).map_or(0, |u| u.count)
    }
}
