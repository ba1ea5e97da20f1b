use crate::models::CompilationOutcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Thread-safe collector of per-file outcomes.
///
/// Counters are atomics so progress can be read without locking; the outcome list
/// is behind a mutex because several workers append to it at once. Each outcome is
/// stored with the index of its file in the job's file list so the final snapshot
/// comes out in input order regardless of completion order.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    outcomes: Mutex<Vec<(usize, CompilationOutcome)>>,
}

/// Immutable view of an aggregator after all workers have joined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSnapshot {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_files: Vec<String>,
    pub outcomes: Vec<CompilationOutcome>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome for the file at `index`, counting it by its success flag.
    pub fn record(&self, index: usize, outcome: CompilationOutcome) {
        if outcome.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push((index, outcome));
    }

    pub fn record_success(&self, index: usize, outcome: CompilationOutcome) {
        debug_assert!(outcome.success);
        self.record(index, outcome);
    }

    pub fn record_failure(&self, index: usize, outcome: CompilationOutcome) {
        debug_assert!(!outcome.success);
        self.record(index, outcome);
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn recorded(&self) -> usize {
        self.succeeded() + self.failed()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        let mut outcomes = self.lock().clone();
        outcomes.sort_by_key(|(index, _)| *index);

        let outcomes: Vec<CompilationOutcome> =
            outcomes.into_iter().map(|(_, outcome)| outcome).collect();
        let failed_files = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.file.clone())
            .collect();

        AggregateSnapshot {
            succeeded: self.succeeded(),
            failed: self.failed(),
            failed_files,
            outcomes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(usize, CompilationOutcome)>> {
        // Every push leaves the list consistent, so a panic elsewhere cannot corrupt it
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
