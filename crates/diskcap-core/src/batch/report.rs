//! Aggregated outcome of a batch.

use serde::Serialize;
use std::time::Duration;

use crate::operation::{OperationResult, OperationStatus};

/// Counts per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl BatchSummary {
    fn from_results(results: &[OperationResult]) -> Self {
        let mut s = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                OperationStatus::Succeeded => s.succeeded += 1,
                OperationStatus::Failed => s.failed += 1,
                OperationStatus::TimedOut => s.timed_out += 1,
            }
        }
        s
    }
}

/// One result per submitted unit, indexed by submission order.
///
/// Partial failure never drops entries; use `summary()` or `failures()` to
/// decide whether the workflow as a whole should stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    summary: BatchSummary,
    #[serde(rename = "elapsed_ms", serialize_with = "crate::operation::serialize_millis")]
    elapsed: Duration,
    results: Vec<OperationResult>,
}

impl BatchReport {
    pub(crate) fn new(results: Vec<OperationResult>, elapsed: Duration) -> Self {
        Self {
            summary: BatchSummary::from_results(&results),
            elapsed,
            results,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result of the unit submitted at `index`.
    pub fn get(&self, index: usize) -> Option<&OperationResult> {
        self.results.get(index)
    }

    /// Result of the first unit submitted with `id`.
    pub fn by_id(&self, id: &str) -> Option<&OperationResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn results(&self) -> &[OperationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<OperationResult> {
        self.results
    }

    pub fn succeeded(&self) -> usize {
        self.summary.succeeded
    }

    pub fn failed(&self) -> usize {
        self.summary.failed
    }

    pub fn timed_out(&self) -> usize {
        self.summary.timed_out
    }

    /// Units that did not succeed, with their submission index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &OperationResult)> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.summary.succeeded == self.summary.total
    }
}
