use super::{
    errors::PoolError,
    handle::ResultHandle,
    model::{PoolMetrics, PoolMode, PoolStatus, WorkerSnapshot},
    queue::{Job, TaskQueue},
    result::{panic_message, TaskResult},
    task::Task,
    value::AnyValue,
    worker::{self, IdAllocator, Worker, WorkerId},
};
use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub const DEFAULT_QUEUE_LIMIT: usize = i32::MAX as usize;
pub const DEFAULT_MAX_THREADS: usize = 1024;
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

const MIN_IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Pool configuration. Fixed after `start`.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: PoolMode,
    pub initial_threads: usize,
    /// Ceiling for Cached-mode growth. Ignored in Fixed mode.
    pub max_threads: usize,
    pub queue_limit: usize,
    /// Longest `submit` waits for queue space before rejecting.
    pub admission_timeout: Duration,
    /// Sustained idleness after which a Cached-mode worker above `initial_threads` exits.
    pub idle_timeout: Duration,
    /// Wait slice of an idle Cached-mode worker between idle-timeout checks.
    pub idle_poll_interval: Duration,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: PoolMode::Fixed,
            initial_threads: num_cpus::get(),
            max_threads: DEFAULT_MAX_THREADS,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            idle_poll_interval: DEFAULT_IDLE_POLL_INTERVAL,
            thread_name_prefix: "elastic-worker".to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            mode: PoolMode::Fixed,
            initial_threads: num_cpus,
            queue_limit: num_cpus * 64,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            mode: PoolMode::Cached,
            initial_threads: num_cpus,
            max_threads: num_cpus * 8,
            ..Default::default()
        }
    }

    fn normalized(mut self) -> Self {
        self.queue_limit = self.queue_limit.max(1);
        self.idle_poll_interval = self.idle_poll_interval.max(MIN_IDLE_POLL_INTERVAL);
        self
    }
}

/// Everything guarded by the pool's single coordinating lock.
pub(crate) struct PoolState {
    pub(crate) config: Config,
    pub(crate) status: PoolStatus,
    pub(crate) queue: TaskQueue,
    pub(crate) workers: HashMap<WorkerId, Worker>,
    pub(crate) ids: IdAllocator,
}

/// State shared between the pool handle and its worker threads.
///
/// Thread counts are atomics so they can be read without the lock, but every
/// check-then-act on them (spawn, dispatch, reclaim) happens under `state`.
pub(crate) struct Shared {
    pub(crate) state: Mutex<PoolState>,
    pub(crate) not_full: Condvar,
    pub(crate) not_empty: Condvar,
    pub(crate) all_exited: Condvar,
    pub(crate) current_threads: CachePadded<AtomicUsize>,
    pub(crate) idle_threads: CachePadded<AtomicUsize>,
    pub(crate) peak_threads: AtomicUsize,
    pub(crate) total_submitted: AtomicUsize,
    pub(crate) rejected_tasks: AtomicUsize,
    pub(crate) completed_tasks: AtomicUsize,
    pub(crate) failed_tasks: AtomicUsize,
}

impl Shared {
    fn new(config: Config) -> Self {
        Self {
            state: Mutex::new(PoolState {
                queue: TaskQueue::new(config.queue_limit),
                config,
                status: PoolStatus::Created,
                workers: HashMap::new(),
                ids: IdAllocator::default(),
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            all_exited: Condvar::new(),
            current_threads: CachePadded::new(AtomicUsize::new(0)),
            idle_threads: CachePadded::new(AtomicUsize::new(0)),
            peak_threads: AtomicUsize::new(0),
            total_submitted: AtomicUsize::new(0),
            rejected_tasks: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            failed_tasks: AtomicUsize::new(0),
        }
    }

    fn enqueue(self: &Arc<Self>, job: Job) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if state.status != PoolStatus::Running {
            self.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::NotRunning);
        }

        if state.queue.is_full() {
            let timeout = state.config.admission_timeout;
            self.not_full.wait_while_for(
                &mut state,
                |s| s.status == PoolStatus::Running && s.queue.is_full(),
                timeout,
            );
            if state.status != PoolStatus::Running {
                self.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::NotRunning);
            }
            if state.queue.is_full() {
                self.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(limit = state.queue.limit(), ?timeout, "task queue is full, submission rejected");
                return Err(PoolError::Rejected { timeout });
            }
        }

        state.queue.push(job);
        self.total_submitted.fetch_add(1, Ordering::Relaxed);
        self.not_empty.notify_all();

        // At most one new worker per submission.
        if state.config.mode == PoolMode::Cached
            && state.queue.len() > self.idle_threads.load(Ordering::Acquire)
            && self.current_threads.load(Ordering::Acquire) < state.config.max_threads
        {
            match worker::spawn(self, &mut state) {
                Ok(id) => debug!(worker = %id, queued = state.queue.len(), "pool grew under load"),
                Err(err) => warn!(%err, "could not grow pool"),
            }
        }

        Ok(())
    }

    fn shutdown(&self) {
        let discarded = {
            let mut state = self.state.lock();
            let status = state.status;
            match status {
                PoolStatus::Created => {
                    state.status = PoolStatus::Stopped;
                    return;
                }
                PoolStatus::Stopped => return,
                PoolStatus::ShuttingDown => None,
                PoolStatus::Running => {
                    state.status = PoolStatus::ShuttingDown;
                    let discarded = state.queue.drain();
                    self.not_empty.notify_all();
                    self.not_full.notify_all();
                    Some(discarded)
                }
            }
        };

        // Dropping a job drops its result sender; waiting handles see `Discarded`.
        let initiated = discarded.is_some();
        if let Some(discarded) = discarded {
            if !discarded.is_empty() {
                debug!(count = discarded.len(), "discarding undispatched tasks");
            }
        }

        let mut state = self.state.lock();
        let me = thread::current().id();
        if state.workers.values().any(|w| w.thread_id() == me) {
            warn!("shutdown called from a worker thread, not waiting for workers to exit");
            return;
        }
        self.all_exited.wait_while(&mut state, |s| !s.workers.is_empty());
        state.status = PoolStatus::Stopped;

        if initiated {
            info!(
                completed = self.completed_tasks.load(Ordering::Relaxed),
                failed = self.failed_tasks.load(Ordering::Relaxed),
                "thread pool stopped"
            );
        }
    }
}

/// A bounded task queue served by OS worker threads.
///
/// Configure with the setters, then [`start`](Self::start); or build and
/// start in one step with [`with_config`](Self::with_config). Dropping the
/// pool shuts it down.
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// Creates a Fixed-mode pool with default configuration. Not started.
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    /// Creates a pool from `config` and starts `config.initial_threads` workers.
    pub fn with_config(config: Config) -> TaskResult<Self> {
        let initial_threads = config.initial_threads;
        let pool = Self::from_config(config);
        pool.start(initial_threads)?;
        Ok(pool)
    }

    fn from_config(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared::new(config.normalized())),
        }
    }

    fn configure(&self, setting: &'static str, apply: impl FnOnce(&mut PoolState)) {
        let mut state = self.shared.state.lock();
        if state.status != PoolStatus::Created {
            debug!(setting, status = ?state.status, "pool already started, setting ignored");
            return;
        }
        apply(&mut *state);
    }

    pub fn set_mode(&self, mode: PoolMode) {
        self.configure("mode", |s| s.config.mode = mode);
    }

    pub fn set_queue_limit(&self, limit: usize) {
        self.configure("queue_limit", |s| {
            s.config.queue_limit = limit.max(1);
            s.queue.set_limit(limit);
        });
    }

    /// Only meaningful in Cached mode; ignored while the mode is Fixed.
    pub fn set_max_threads(&self, max_threads: usize) {
        self.configure("max_threads", |s| {
            if s.config.mode == PoolMode::Cached {
                s.config.max_threads = max_threads;
            }
        });
    }

    pub fn set_admission_timeout(&self, timeout: Duration) {
        self.configure("admission_timeout", |s| s.config.admission_timeout = timeout);
    }

    pub fn set_idle_timeout(&self, timeout: Duration) {
        self.configure("idle_timeout", |s| s.config.idle_timeout = timeout);
    }

    pub fn set_stack_size(&self, stack_size: Option<usize>) {
        self.configure("stack_size", |s| s.config.stack_size = stack_size);
    }

    /// Starts `initial_threads` workers. Valid once, on a pool that was never started.
    ///
    /// If a worker thread cannot be spawned, the workers already started are
    /// shut down and the pool is left `Stopped`.
    pub fn start(&self, initial_threads: usize) -> TaskResult<()> {
        let mut state = self.shared.state.lock();
        if state.status != PoolStatus::Created {
            return Err(PoolError::AlreadyStarted);
        }

        state.config.initial_threads = initial_threads;
        if state.config.max_threads < initial_threads {
            state.config.max_threads = initial_threads;
        }
        state.status = PoolStatus::Running;

        for _ in 0..initial_threads {
            if let Err(err) = worker::spawn(&self.shared, &mut state) {
                warn!(%err, spawned = state.workers.len(), threads = initial_threads, "thread pool failed to start");
                drop(state);
                self.shared.shutdown();
                return Err(err);
            }
        }

        info!(
            mode = ?state.config.mode,
            threads = initial_threads,
            max_threads = state.config.max_threads,
            queue_limit = state.queue.limit(),
            "thread pool started"
        );
        Ok(())
    }

    /// Starts one worker per CPU core.
    pub fn start_default(&self) -> TaskResult<()> {
        self.start(num_cpus::get())
    }

    /// Queues `f` and returns the handle its result will be published to.
    ///
    /// Blocks for at most the admission timeout while the queue is full,
    /// then gives up and returns an invalid handle. In Cached mode this may
    /// also start one extra worker when queued work outnumbers idle workers.
    pub fn submit<F, T>(&self, f: F) -> ResultHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<TaskResult<T>>();

        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| PoolError::Panic(panic_message(payload.as_ref())));
            let completed = result.is_ok();
            let _ = tx.send(result);
            completed
        });

        match self.shared.enqueue(job) {
            Ok(()) => ResultHandle::new(rx),
            Err(err) => ResultHandle::rejected(err),
        }
    }

    pub fn submit_task<K: Task>(&self, mut task: K) -> ResultHandle<AnyValue> {
        self.submit(move || task.run())
    }

    /// Stops the pool and blocks until every worker has exited.
    ///
    /// Tasks already running finish and publish their results. Tasks still
    /// queued are dropped and their handles resolve to
    /// [`PoolError::Discarded`]. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    #[inline]
    pub fn status(&self) -> PoolStatus {
        self.shared.state.lock().status
    }

    pub fn config(&self) -> Config {
        self.shared.state.lock().config.clone()
    }

    #[inline]
    pub fn current_threads(&self) -> usize {
        self.shared.current_threads.load(Ordering::Acquire)
    }

    #[inline]
    pub fn idle_threads(&self) -> usize {
        self.shared.idle_threads.load(Ordering::Acquire)
    }

    pub fn queued_tasks(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Registered workers, ordered by id.
    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        let state = self.shared.state.lock();
        let mut workers: Vec<_> = state.workers.values().map(Worker::snapshot).collect();
        workers.sort_by_key(|w| w.id);
        workers
    }

    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.state.lock();
        PoolMetrics {
            mode: state.config.mode,
            status: state.status,
            current_threads: self.shared.current_threads.load(Ordering::Acquire),
            idle_threads: self.shared.idle_threads.load(Ordering::Acquire),
            peak_threads: self.shared.peak_threads.load(Ordering::Acquire),
            max_threads: state.config.max_threads,
            queued_tasks: state.queue.len(),
            queue_limit: state.queue.limit(),
            total_submitted: self.shared.total_submitted.load(Ordering::Relaxed),
            rejected_tasks: self.shared.rejected_tasks.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed_tasks.load(Ordering::Relaxed),
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
