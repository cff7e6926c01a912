use super::{
    errors::PoolError,
    model::{PoolMode, PoolStatus, WorkerSnapshot, WorkerState},
    pool::{PoolState, Shared},
    queue::Job,
    result::{panic_message, TaskResult},
};
use std::{
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle, ThreadId},
    time::Instant,
};
use tracing::{debug, trace, warn};

/// Identity of a worker thread, unique within its pool and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out monotonically increasing worker ids. One per pool.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> WorkerId {
        let id = WorkerId(self.next);
        self.next += 1;
        id
    }
}

/// Registry entry for a live worker thread.
///
/// The entry owns the thread's `JoinHandle`; the worker removes its own
/// entry on exit, which drops the handle and detaches the finished thread.
/// Shutdown waits on the registry draining, not on joins.
pub(crate) struct Worker {
    id: WorkerId,
    thread_id: ThreadId,
    state: WorkerState,
    tasks_completed: u64,
    _thread: JoinHandle<()>,
}

impl Worker {
    fn new(id: WorkerId, thread: JoinHandle<()>) -> Self {
        Self {
            id,
            thread_id: thread.thread().id(),
            state: WorkerState::Idle,
            tasks_completed: 0,
            _thread: thread,
        }
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    fn mark_executing(&mut self) {
        self.state = WorkerState::Executing;
    }

    fn mark_idle(&mut self) {
        if self.state == WorkerState::Executing {
            self.tasks_completed += 1;
        }
        self.state = WorkerState::Idle;
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id,
            state: self.state,
            tasks_completed: self.tasks_completed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Exit {
    Shutdown,
    IdleTimeout,
}

/// Starts one worker thread and registers it.
///
/// Must be called with the pool lock held: the new thread's first action is
/// to take that lock, so it cannot observe the registry before its own entry
/// is in it.
pub(crate) fn spawn(shared: &Arc<Shared>, state: &mut PoolState) -> TaskResult<WorkerId> {
    let id = state.ids.next_id();
    let mut builder = thread::Builder::new()
        .name(format!("{}-{}", state.config.thread_name_prefix, id));
    if let Some(size) = state.config.stack_size {
        builder = builder.stack_size(size);
    }

    let worker_shared = Arc::clone(shared);
    let handle = builder
        .spawn(move || run(worker_shared, id))
        .map_err(|err| PoolError::Spawn(err.to_string()))?;

    state.workers.insert(id, Worker::new(id, handle));
    let current = shared.current_threads.fetch_add(1, Ordering::AcqRel) + 1;
    shared.idle_threads.fetch_add(1, Ordering::AcqRel);
    shared.peak_threads.fetch_max(current, Ordering::AcqRel);

    debug!(worker = %id, current, "worker started");
    Ok(id)
}

fn run(shared: Arc<Shared>, id: WorkerId) {
    let mut last_active = Instant::now();

    loop {
        let job = {
            let mut state = shared.state.lock();
            if let Some(worker) = state.workers.get_mut(&id) {
                worker.mark_idle();
            }

            let job = loop {
                if state.status != PoolStatus::Running {
                    deregister(&shared, &mut state, id, Exit::Shutdown);
                    return;
                }
                if let Some(job) = state.queue.pop() {
                    break job;
                }

                let mode = state.config.mode;
                match mode {
                    PoolMode::Fixed => shared.not_empty.wait(&mut state),
                    PoolMode::Cached => {
                        let slice = state.config.idle_poll_interval;
                        let timed_out = shared.not_empty.wait_for(&mut state, slice).timed_out();
                        if timed_out
                            && last_active.elapsed() >= state.config.idle_timeout
                            && shared.current_threads.load(Ordering::Acquire)
                                > state.config.initial_threads
                        {
                            deregister(&shared, &mut state, id, Exit::IdleTimeout);
                            return;
                        }
                    }
                }
            };

            shared.idle_threads.fetch_sub(1, Ordering::AcqRel);
            shared.not_full.notify_all();
            if let Some(worker) = state.workers.get_mut(&id) {
                worker.mark_executing();
            }
            trace!(worker = %id, queued = state.queue.len(), "task dispatched");
            job
        };

        if execute(id, job) {
            shared.completed_tasks.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.failed_tasks.fetch_add(1, Ordering::Relaxed);
        }

        shared.idle_threads.fetch_add(1, Ordering::AcqRel);
        last_active = Instant::now();
    }
}

/// Runs one job. Nothing a job does, including panicking while its result is
/// dropped, may unwind out of the worker loop.
fn execute(id: WorkerId, job: Job) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(completed) => completed,
        Err(payload) => {
            warn!(worker = %id, panic = %panic_message(payload.as_ref()), "task panicked outside its result boundary");
            if let Err(nested) = panic::catch_unwind(AssertUnwindSafe(move || drop(payload))) {
                mem::forget(nested);
            }
            false
        }
    }
}

fn deregister(shared: &Shared, state: &mut PoolState, id: WorkerId, exit: Exit) {
    state.workers.remove(&id);
    shared.current_threads.fetch_sub(1, Ordering::AcqRel);
    shared.idle_threads.fetch_sub(1, Ordering::AcqRel);

    debug!(worker = %id, reason = ?exit, remaining = state.workers.len(), "worker exited");

    if state.workers.is_empty() {
        if state.status == PoolStatus::ShuttingDown {
            state.status = PoolStatus::Stopped;
        }
        shared.all_exited.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_per_allocator() {
        let mut a = IdAllocator::default();
        let mut b = IdAllocator::default();
        assert_eq!(a.next_id().as_u64(), 0);
        assert_eq!(a.next_id().as_u64(), 1);
        assert_eq!(b.next_id().as_u64(), 0);
        assert!(a.next_id() > WorkerId(1));
    }
}
