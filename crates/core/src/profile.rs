//! Task timing records for ranking pipeline phases by cost.

use std::cmp::Ordering;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Duration record for one named task.
///
/// Start/end are wall-clock nanoseconds; the total is milliseconds measured
/// on the monotonic clock. Records compare by total, so sorting a batch
/// ranks the most expensive tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub name: String,
    pub start_ns: u128,
    pub end_ns: u128,
    pub total_ms: f64,
}

impl TaskTiming {
    /// Total order on total duration (NaN-safe).
    pub fn cmp_by_total(&self, other: &TaskTiming) -> Ordering {
        self.total_ms.total_cmp(&other.total_ms)
    }
}

/// Sort timings so the most expensive task comes first.
pub fn rank_by_total(timings: &mut [TaskTiming]) {
    timings.sort_by(|a, b| b.cmp_by_total(a));
}

/// In-flight measurement for one task.
#[derive(Debug)]
pub struct Stopwatch {
    name: String,
    begun: Instant,
    start_ns: u128,
}

impl Stopwatch {
    pub fn start(name: impl Into<String>) -> Self {
        Self { name: name.into(), begun: Instant::now(), start_ns: wall_clock_ns() }
    }

    /// Finish the measurement and produce the timing record.
    pub fn stop(self) -> TaskTiming {
        let total_ms = self.begun.elapsed().as_secs_f64() * 1_000.0;
        TaskTiming { name: self.name, start_ns: self.start_ns, end_ns: wall_clock_ns(), total_ms }
    }
}

fn wall_clock_ns() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0)
}
