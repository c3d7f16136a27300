//! Test outcome counts and derived pass-rate statistics.

use serde::{Deserialize, Serialize};

/// Raw outcome counts for a test as returned by the analytical store.
///
/// A flake is a run that both failed and passed; whether it counts toward
/// the pass rate is a per-request policy, so the raw counts keep it
/// separate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub total_count: u32,
    pub success_count: u32,
    pub flake_count: u32,
}

impl Count {
    pub fn new(total_count: u32, success_count: u32, flake_count: u32) -> Self {
        Self {
            total_count,
            success_count,
            flake_count,
        }
    }

    /// Derived failures, clamped at zero if the store hands back
    /// inconsistent counts.
    pub fn failures(&self) -> u32 {
        self.total_count
            .saturating_sub(self.success_count + self.flake_count)
    }

    pub fn add(&self, other: &Count) -> Count {
        Count {
            total_count: self.total_count + other.total_count,
            success_count: self.success_count + other.success_count,
            flake_count: self.flake_count + other.flake_count,
        }
    }

    /// Runs counted as passing under the given flake policy.
    pub fn passes(&self, flake_as_failure: bool) -> u32 {
        if flake_as_failure {
            self.success_count
        } else {
            self.success_count + self.flake_count
        }
    }

    pub fn pass_rate(&self, flake_as_failure: bool) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        f64::from(self.passes(flake_as_failure)) / f64::from(self.total_count)
    }

    pub fn to_stats(&self, flake_as_failure: bool) -> Stats {
        Stats::new(
            self.success_count,
            self.failures(),
            self.flake_count,
            flake_as_failure,
        )
    }
}

/// Success/failure/flake breakdown with a precomputed success rate.
///
/// This is the shape emitted in report JSON; `success_rate` is fixed at
/// construction under the request's flake policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub success_count: u32,
    pub failure_count: u32,
    pub flake_count: u32,
    pub success_rate: f64,
}

impl Stats {
    pub fn new(success_count: u32, failure_count: u32, flake_count: u32, flake_as_failure: bool) -> Self {
        Self {
            success_count,
            failure_count,
            flake_count,
            success_rate: calculate_pass_rate(
                success_count,
                failure_count,
                flake_count,
                flake_as_failure,
            ),
        }
    }

    pub fn total(&self) -> u32 {
        self.success_count + self.failure_count + self.flake_count
    }

    pub fn passes(&self, flake_as_failure: bool) -> u32 {
        if flake_as_failure {
            self.success_count
        } else {
            self.success_count + self.flake_count
        }
    }

    pub fn pass_rate(&self, flake_as_failure: bool) -> f64 {
        calculate_pass_rate(
            self.success_count,
            self.failure_count,
            self.flake_count,
            flake_as_failure,
        )
    }

    /// (failures, passes) under the flake policy; the two always sum to the
    /// total.
    pub fn fail_pass_with_flakes(&self, flake_as_failure: bool) -> (u32, u32) {
        if flake_as_failure {
            (self.failure_count + self.flake_count, self.success_count)
        } else {
            (self.failure_count, self.success_count + self.flake_count)
        }
    }

    pub fn add(&self, other: &Stats, flake_as_failure: bool) -> Stats {
        Stats::new(
            self.success_count + other.success_count,
            self.failure_count + other.failure_count,
            self.flake_count + other.flake_count,
            flake_as_failure,
        )
    }

    pub fn add_count(&self, count: &Count, flake_as_failure: bool) -> Stats {
        Stats::new(
            self.success_count + count.success_count,
            self.failure_count + count.failures(),
            self.flake_count + count.flake_count,
            flake_as_failure,
        )
    }
}

pub fn calculate_pass_rate(
    success: u32,
    failure: u32,
    flake: u32,
    flake_as_failure: bool,
) -> f64 {
    let total = success + failure + flake;
    if total == 0 {
        return 0.0;
    }
    if flake_as_failure {
        f64::from(success) / f64::from(total)
    } else {
        f64::from(success + flake) / f64::from(total)
    }
}
