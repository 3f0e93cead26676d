// Rate limiter - Per-partition fixed-window admission control
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    #[cfg(test)]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    started_at: Instant,
    admitted: u32,
}

/// Fixed-window limiter keyed by partition (normally the client address).
///
/// Rejections are immediate; nothing is queued. The window check, reset and
/// increment for one partition happen under that partition's shard lock, so
/// concurrent requests sharing a key cannot over-admit.
#[derive(Debug)]
pub struct RateLimiter {
    permit_limit: u32,
    window: Duration,
    retry_after: Duration,
    partitions: DashMap<String, FixedWindow>,
}

impl RateLimiter {
    pub fn new(permit_limit: u32, window: Duration, retry_after: Duration) -> Self {
        Self {
            permit_limit,
            window,
            retry_after,
            partitions: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, partition: &str) -> Admission {
        self.check_at(partition, Instant::now())
    }

    pub fn check_at(&self, partition: &str, now: Instant) -> Admission {
        let mut state = self
            .partitions
            .entry(partition.to_owned())
            .or_insert(FixedWindow {
                started_at: now,
                admitted: 0,
            });

        if now.saturating_duration_since(state.started_at) >= self.window {
            state.started_at = now;
            state.admitted = 0;
        }

        if state.admitted < self.permit_limit {
            state.admitted += 1;
            Admission::Admitted {
                remaining: self.permit_limit - state.admitted,
            }
        } else {
            Admission::Rejected {
                retry_after: self.retry_after,
            }
        }
    }

    /// Drop partitions whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.partitions.len();
        self.partitions
            .retain(|_, w| now.saturating_duration_since(w.started_at) < self.window);
        before.saturating_sub(self.partitions.len())
    }

    pub fn tracked_partitions(&self) -> usize {
        self.partitions.len()
    }
}
