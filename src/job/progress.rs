//! Progress derivation for running jobs

use std::time::{Duration, Instant};

/// Derives percentage and remaining-time estimates from progress counters
///
/// The estimate projects elapsed wall-clock time per processed item over the
/// remaining items, so it only exists once at least one item has finished and
/// work remains.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
}

impl ProgressTracker {
    /// Starts tracking from now
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Estimated time remaining, if one can be derived
    pub fn estimate_remaining(&self, current: u64, total: u64) -> Option<Duration> {
        if current == 0 || total <= current {
            return None;
        }

        let elapsed = self.started.elapsed();
        let per_item = elapsed.as_secs_f64() / current as f64;
        let remaining = (total - current) as f64 * per_item;
        Some(Duration::from_secs_f64(remaining))
    }
}

/// Percentage of completed work, rounded to the nearest integer
pub fn percentage(current: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((current as f64 / total as f64) * 100.0).round() as u32
}
