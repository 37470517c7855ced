use crate::probe::{ProbeFactory, ProbeStatus, ProbeStrategy, SystemProbeFactory};
use crate::results::{FinishObserver, ProbeObserver, Progress, ResultAggregator, TestResults};
use crate::scan_config::{IcmpConfig, Protocol, ScanConfig};
use crate::scan_error::{ScanError, ScanErrorKind, ScanResult};
use crate::Endpoint;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanState {
    Idle,
    Running,
}

/// Idle -> Running -> Idle, shared between the scanner and its watcher thread.
struct RunState(AtomicU8);

impl RunState {
    const IDLE: u8 = 0;
    const RUNNING: u8 = 1;

    fn new() -> Self {
        RunState(AtomicU8::new(Self::IDLE))
    }

    fn get(&self) -> ScanState {
        match self.0.load(Ordering::Acquire) {
            Self::RUNNING => ScanState::Running,
            _ => ScanState::Idle,
        }
    }

    fn try_begin(&self) -> bool {
        self.0.compare_exchange(Self::IDLE, Self::RUNNING, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    fn finish(&self) {
        self.0.store(Self::IDLE, Ordering::Release);
    }
}

/// Probes a list of endpoints on a fixed pool of worker threads.
///
/// `start` splits the endpoints into one contiguous shard per worker. Every
/// worker probes its shard in order and hands each outcome to the result
/// aggregator and the probe observer. A watcher thread joins the workers and
/// then calls the finish observer with the final results. Configuration can
/// only change while the scanner is idle.
pub struct Scanner {
    config: ScanConfig,
    on_probe: ProbeObserver,
    on_finished: FinishObserver,
    probe_factory: Arc<dyn ProbeFactory>,
    aggregator: Arc<ResultAggregator>,
    state: Arc<RunState>,
    stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_probe_factory(config, Arc::new(SystemProbeFactory))
    }

    /// Uses `probe_factory` instead of real sockets to create the per-worker
    /// probe strategies.
    pub fn with_probe_factory(config: ScanConfig, probe_factory: Arc<dyn ProbeFactory>) -> Self {
        Scanner {
            config,
            on_probe: Arc::new(|_: &Endpoint, _: ProbeStatus| {}),
            on_finished: Arc::new(|_: &TestResults| {}),
            probe_factory,
            aggregator: Arc::new(ResultAggregator::new()),
            state: Arc::new(RunState::new()),
            stop: Arc::new(AtomicBool::new(false)),
            watcher: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ScanState::Running
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn set_endpoints(&mut self, endpoints: Vec<Endpoint>) -> bool {
        self.update_config("endpoints", |config| config.endpoints = endpoints)
    }

    pub fn set_thread_count(&mut self, thread_count: usize) -> bool {
        self.update_config("thread count", |config| config.thread_count = thread_count)
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> bool {
        self.update_config("timeout", |config| config.timeout = timeout)
    }

    pub fn set_protocol(&mut self, protocol: Protocol) -> bool {
        self.update_config("protocol", |config| config.protocol = protocol)
    }

    pub fn set_icmp_config(&mut self, icmp: IcmpConfig) -> bool {
        self.update_config("ICMP config", |config| config.icmp = icmp)
    }

    pub fn set_on_probe<F>(&mut self, on_probe: F) -> bool
    where
        F: Fn(&Endpoint, ProbeStatus) + Send + Sync + 'static,
    {
        if self.ignore_while_running("probe observer") {
            return false;
        }
        self.on_probe = Arc::new(on_probe);
        true
    }

    pub fn set_on_finished<F>(&mut self, on_finished: F) -> bool
    where
        F: Fn(&TestResults) + Send + Sync + 'static,
    {
        if self.ignore_while_running("finish observer") {
            return false;
        }
        self.on_finished = Arc::new(on_finished);
        true
    }

    /// Consistent copy of the results. While a run is in progress it reflects
    /// the probes completed so far.
    pub fn results(&self) -> TestResults {
        self.aggregator.snapshot()
    }

    /// Lock-free, possibly slightly stale counters for progress display.
    pub fn progress(&self) -> Progress {
        self.aggregator.progress()
    }

    /// Starts a run in the background.
    ///
    /// Fails without probing anything when a run is already in progress, when
    /// the thread count is below one, or when the selected protocol is not
    /// available. In none of these cases is the finish observer called.
    pub fn start(&mut self) -> ScanResult<()> {
        if !self.state.try_begin() {
            tracing::debug!("start ignored, a run is in progress");
            return Err(ScanError::new(ScanErrorKind::AlreadyRunning, "a run is already in progress"));
        }
        self.reap_watcher();
        self.aggregator.clear();
        self.stop.store(false, Ordering::Release);

        if self.config.thread_count < 1 {
            self.state.finish();
            return Err(ScanError::new(
                ScanErrorKind::InvalidThreadCount,
                format!("thread count must be at least 1, got {}", self.config.thread_count),
            ));
        }
        let thread_count = self.config.thread_count.min(self.config.endpoints.len());
        let shards = partition(&self.config.endpoints, thread_count);

        let probe_config = self.config.probe_config();
        let probes = match shards
            .iter()
            .map(|_| self.probe_factory.create(self.config.protocol, &probe_config))
            .collect::<ScanResult<Vec<Box<dyn ProbeStrategy>>>>()
        {
            Ok(probes) => probes,
            Err(e) => {
                self.state.finish();
                tracing::error!("{:?} probing unavailable: {}", self.config.protocol, e);
                return Err(e);
            }
        };

        tracing::debug!(
            "starting {:?} scan of {} endpoint(s) on {} worker(s)",
            self.config.protocol,
            self.config.endpoints.len(),
            thread_count
        );
        let workers = WorkerSet::default();
        for (index, (shard, probe)) in shards.into_iter().zip(probes).enumerate() {
            let aggregator = self.aggregator.clone();
            let stop = self.stop.clone();
            let on_probe = self.on_probe.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("scan-worker-{index}"))
                .spawn(move || run_worker(index, shard, probe, &aggregator, &stop, &on_probe));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!("could not spawn worker {}: {}", index, e);
                    self.stop.store(true, Ordering::Release);
                    workers.join_all();
                    self.state.finish();
                    return Err(e.into());
                }
            }
        }

        let aggregator = self.aggregator.clone();
        let state = self.state.clone();
        let on_finished = self.on_finished.clone();
        let watched = workers.clone();
        let watcher = std::thread::Builder::new().name("scan-watcher".to_string()).spawn(move || {
            watched.join_all();
            let results = aggregator.snapshot();
            state.finish();
            tracing::debug!(
                "scan finished: {} tested, {} valid, {} bad, {} error",
                results.total_tested,
                results.valid(),
                results.bad,
                results.error
            );
            on_finished(&results);
        });
        match watcher {
            Ok(handle) => {
                self.watcher = Some(handle);
                Ok(())
            }
            Err(e) => {
                tracing::error!("could not spawn watcher: {}", e);
                self.stop.store(true, Ordering::Release);
                workers.join_all();
                self.state.finish();
                Err(e.into())
            }
        }
    }

    /// Asks the workers to stop before their next probe. Probes in flight are
    /// not interrupted; the finish observer still fires once they are done.
    pub fn stop(&self) {
        if self.is_running() {
            tracing::debug!("stop requested");
        }
        self.stop.store(true, Ordering::Release);
    }

    /// Blocks until the current run, including its finish observer, is done.
    pub fn wait(&mut self) -> std::thread::Result<()> {
        match self.watcher.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    fn reap_watcher(&mut self) {
        if let Some(handle) = self.watcher.take() {
            if handle.join().is_err() {
                tracing::error!("previous scan watcher panicked");
            }
        }
    }

    fn update_config(&mut self, what: &str, update: impl FnOnce(&mut ScanConfig)) -> bool {
        if self.ignore_while_running(what) {
            return false;
        }
        update(&mut self.config);
        true
    }

    fn ignore_while_running(&self, what: &str) -> bool {
        let running = self.is_running();
        if running {
            tracing::debug!("ignoring change of {} while a run is in progress", what);
        }
        running
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
        if self.wait().is_err() {
            tracing::error!("scan watcher panicked");
        }
    }
}

fn run_worker(
    index: usize,
    shard: Vec<Endpoint>,
    mut probe: Box<dyn ProbeStrategy>,
    aggregator: &ResultAggregator,
    stop: &AtomicBool,
    on_probe: &ProbeObserver,
) {
    tracing::trace!("worker {} starts with {} endpoint(s)", index, shard.len());
    for endpoint in shard {
        if stop.load(Ordering::Acquire) {
            tracing::debug!("worker {} stopped before {}", index, endpoint);
            break;
        }
        let status = probe.test(&endpoint);
        aggregator.record(endpoint, status, on_probe);
    }
    tracing::trace!("worker {} done", index);
}

/// Worker handles of one run. Shared with the watcher, so the handles survive
/// even when the watcher closure is dropped without running.
#[derive(Clone, Default)]
struct WorkerSet(Arc<Mutex<Vec<JoinHandle<()>>>>);

impl WorkerSet {
    fn push(&self, handle: JoinHandle<()>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(handle);
    }

    /// Joins every worker pushed so far. Later calls find nothing left to join.
    fn join_all(&self) {
        let handles = std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("scan worker panicked");
            }
        }
    }
}

/// Splits `items` into `shard_count` contiguous shards. The first
/// `shard_count - 1` shards get `len / shard_count` items each, the last one
/// gets the rest. No shards for a `shard_count` of zero.
pub fn partition<T: Clone>(items: &[T], shard_count: usize) -> Vec<Vec<T>> {
    if shard_count == 0 {
        return vec![];
    }
    let per_shard = items.len() / shard_count;
    let mut shards: Vec<Vec<T>> =
        (0..shard_count - 1).map(|i| items[i * per_shard..(i + 1) * per_shard].to_vec()).collect();
    shards.push(items[(shard_count - 1) * per_shard..].to_vec());
    shards
}
