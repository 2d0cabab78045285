use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::DispatchError;

/// Rolling-window dispatch limiter.
///
/// Tracks dispatch timestamps over the last minute and enforces both a
/// minimum inter-dispatch interval and a cap on dispatches per rolling
/// minute. Exceeding either limit is a soft skip: the caller drops the
/// chunk and moves on, nothing blocks or queues.
pub struct RateLimiter {
    min_interval: Duration,
    max_per_minute: usize,
    window: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_per_minute: usize) -> Self {
        Self {
            min_interval,
            max_per_minute,
            window: VecDeque::new(),
        }
    }

    /// Record a dispatch attempt at `now`. `Ok` means the dispatch may
    /// proceed and has been counted; `Err(RateLimited)` means skip it.
    pub fn check(&mut self, now: Instant) -> Result<(), DispatchError> {
        while let Some(&oldest) = self.window.front() {
            if now.duration_since(oldest) > Duration::from_secs(60) {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if let Some(&last) = self.window.back() {
            if now.duration_since(last) < self.min_interval {
                return Err(DispatchError::RateLimited);
            }
        }

        if self.window.len() >= self.max_per_minute {
            return Err(DispatchError::RateLimited);
        }

        self.window.push_back(now);
        Ok(())
    }
}
