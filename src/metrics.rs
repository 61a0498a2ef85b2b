//! Parse counters shared by every parser instance in a process.
//!
//! Observability only. Constructed once and handed to each `ResponseParser`
//! explicitly, so tests get isolated counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::diagram::parse::ParseDelta;
use crate::diagram::repair::RepairStrategy;

const STRATEGIES: usize = RepairStrategy::LADDER.len();

#[derive(Default)]
struct StrategyCounters {
    attempts: AtomicU64,
    applied: AtomicU64,
    successes: AtomicU64,
}

#[derive(Default)]
pub struct ParseMetrics {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    direct: AtomicU64,
    assisted_attempts: AtomicU64,
    assisted_successes: AtomicU64,
    strategies: [StrategyCounters; STRATEGIES],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySnapshot {
    pub strategy: RepairStrategy,
    pub attempts: u64,
    pub applied: u64,
    pub successes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub direct: u64,
    pub assisted_attempts: u64,
    pub assisted_successes: u64,
    /// Percentage of parses that produced a graph, 0 when nothing ran yet.
    pub success_rate: f64,
    pub strategies: Vec<StrategySnapshot>,
}

impl ParseMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one parse into the counters.
    pub fn record(&self, delta: &ParseDelta, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if delta.decoded_directly {
            self.direct.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(ok) = delta.assisted_repair {
            self.assisted_attempts.fetch_add(1, Ordering::Relaxed);
            if ok {
                self.assisted_successes.fetch_add(1, Ordering::Relaxed);
            }
        }
        for attempt in &delta.attempts {
            let counters = &self.strategies[attempt.strategy.index()];
            counters.attempts.fetch_add(1, Ordering::Relaxed);
            if attempt.applied {
                counters.applied.fetch_add(1, Ordering::Relaxed);
            }
            if attempt.succeeded {
                counters.successes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if total == 0 { 0.0 } else { succeeded as f64 * 100.0 / total as f64 };

        MetricsSnapshot {
            total,
            succeeded,
            failed: self.failed.load(Ordering::Relaxed),
            direct: self.direct.load(Ordering::Relaxed),
            assisted_attempts: self.assisted_attempts.load(Ordering::Relaxed),
            assisted_successes: self.assisted_successes.load(Ordering::Relaxed),
            success_rate,
            strategies: RepairStrategy::LADDER
                .iter()
                .zip(&self.strategies)
                .map(|(strategy, c)| StrategySnapshot {
                    strategy: *strategy,
                    attempts: c.attempts.load(Ordering::Relaxed),
                    applied: c.applied.load(Ordering::Relaxed),
                    successes: c.successes.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }

    /// Administrative reset.
    pub fn reset(&self) {
        for counter in [
            &self.total,
            &self.succeeded,
            &self.failed,
            &self.direct,
            &self.assisted_attempts,
            &self.assisted_successes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        for c in &self.strategies {
            c.attempts.store(0, Ordering::Relaxed);
            c.applied.store(0, Ordering::Relaxed);
            c.successes.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
