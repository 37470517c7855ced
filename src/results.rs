use crate::probe::ProbeStatus;
use crate::Endpoint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Called once per completed probe, from whichever worker ran it. Must be quick
/// and thread-safe.
pub type ProbeObserver = Arc<dyn Fn(&Endpoint, ProbeStatus) + Send + Sync>;

/// Called once per run, after every worker finished.
pub type FinishObserver = Arc<dyn Fn(&TestResults) + Send + Sync>;

/// Outcome of a run. `total_tested == bad + error + valid_endpoints.len()`
/// holds whenever the aggregator's lock is not held.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestResults {
    /// Endpoints classified `Success`, in the order their probes completed.
    pub valid_endpoints: Vec<Endpoint>,
    pub bad: usize,
    pub error: usize,
    pub total_tested: usize,
}

impl TestResults {
    pub fn valid(&self) -> usize {
        self.valid_endpoints.len()
    }

    fn clear(&mut self) {
        self.valid_endpoints.clear();
        self.bad = 0;
        self.error = 0;
        self.total_tested = 0;
    }
}

/// Counters readable while a run is in progress. Each field is read on its own,
/// so a snapshot may be slightly stale or mix two consecutive updates.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Progress {
    pub total_tested: usize,
    pub valid: usize,
    pub bad: usize,
    pub error: usize,
}

#[derive(Default)]
pub(crate) struct ResultAggregator {
    results: Mutex<TestResults>,
    total_tested: AtomicUsize,
    valid: AtomicUsize,
    bad: AtomicUsize,
    error: AtomicUsize,
}

impl ResultAggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Counts one probe outcome, then tells `on_probe` about it outside the lock.
    pub(crate) fn record(&self, endpoint: Endpoint, status: ProbeStatus, on_probe: &ProbeObserver) {
        {
            let mut results = self.lock();
            results.total_tested += 1;
            match status {
                ProbeStatus::Success => results.valid_endpoints.push(endpoint),
                ProbeStatus::Failure => results.bad += 1,
                ProbeStatus::Error => results.error += 1,
            }
            let counter = match status {
                ProbeStatus::Success => &self.valid,
                ProbeStatus::Failure => &self.bad,
                ProbeStatus::Error => &self.error,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            self.total_tested.fetch_add(1, Ordering::Relaxed);
        }
        on_probe(&endpoint, status);
    }

    /// Only called while no run is active.
    pub(crate) fn clear(&self) {
        self.lock().clear();
        for counter in [&self.total_tested, &self.valid, &self.bad, &self.error] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> TestResults {
        self.lock().clone()
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress {
            total_tested: self.total_tested.load(Ordering::Relaxed),
            valid: self.valid.load(Ordering::Relaxed),
            bad: self.bad.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TestResults> {
        // A panicking observer runs outside the lock; still, never wedge on poison.
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
