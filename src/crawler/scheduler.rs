//! Concurrency scaling for the worker pool
//!
//! This module handles:
//! - Holding the current concurrency target of a crawl run
//! - Growing it slowly while the run is healthy
//! - Shrinking it quickly when rate limits are reported
//!
//! Workers never change concurrency themselves; they only report rate
//! limits. The coordinator calls [`ScalingController::tick`] on a fixed
//! interval and reads [`ScalingController::current`] before starting tasks.

use crate::model::RateLimitObserver;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Fraction of the current concurrency added on a healthy tick
pub const SCALE_UP_STEP_RATIO: f64 = 0.015;

/// Fraction of the current concurrency removed after rate limits
pub const SCALE_DOWN_STEP_RATIO: f64 = 0.1;

/// How often the coordinator re-evaluates concurrency
pub const SCALING_INTERVAL: Duration = Duration::from_secs(10);

/// Single source of truth for the number of concurrent tasks
#[derive(Debug)]
pub struct ScalingController {
    min: usize,
    max: usize,
    current: AtomicUsize,
    rate_limit_signals: AtomicU32,
}

impl ScalingController {
    /// Creates a controller starting at `min`
    ///
    /// `min` is raised to 1 and `max` to `min` if needed.
    pub fn new(min: usize, max: usize) -> Self {
        let min = min.max(1);
        let max = max.max(min);
        Self {
            min,
            max,
            current: AtomicUsize::new(min),
            rate_limit_signals: AtomicU32::new(0),
        }
    }

    /// Tasks allowed to run at once
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.min, self.max)
    }

    /// Notes that a page or the model answered with a rate limit
    pub fn report_rate_limit(&self) {
        self.rate_limit_signals.fetch_add(1, Ordering::SeqCst);
    }

    /// Re-evaluates concurrency and returns the new value
    ///
    /// # Scaling Rules
    ///
    /// | Since last tick | Change |
    /// |-----------------|--------|
    /// | No rate limits | `+ceil(current * 0.015)`, at most `max` |
    /// | Any rate limit | `-ceil(current * 0.1)`, at least `min` |
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::crawler::ScalingController;
    ///
    /// let controller = ScalingController::new(1, 20);
    /// assert_eq!(controller.tick(), 2);
    ///
    /// controller.report_rate_limit();
    /// assert_eq!(controller.tick(), 1);
    /// ```
    pub fn tick(&self) -> usize {
        let signals = self.rate_limit_signals.swap(0, Ordering::SeqCst);
        let current = self.current();

        let next = if signals > 0 {
            current
                .saturating_sub(step(current, SCALE_DOWN_STEP_RATIO))
                .max(self.min)
        } else {
            (current + step(current, SCALE_UP_STEP_RATIO)).min(self.max)
        };

        if next != current {
            tracing::debug!(
                from = current,
                to = next,
                rate_limits = signals,
                "Scaling concurrency"
            );
        }

        self.current.store(next, Ordering::SeqCst);
        next
    }
}

impl RateLimitObserver for ScalingController {
    fn on_rate_limited(&self, _attempt: u32) {
        self.report_rate_limit();
    }
}

/// Size of one scaling step, never less than one task
fn step(current: usize, ratio: f64) -> usize {
    ((current as f64 * ratio).ceil() as usize).max(1)
}
