use super::worker::WorkerId;

/// Growth policy of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolMode {
    /// Worker count stays at the start count for the pool's whole life.
    #[default]
    Fixed,
    /// Workers are added under load up to `max_threads` and reclaimed after
    /// `idle_timeout` of sustained idleness, never below the start count.
    Cached,
}

/// Lifecycle of a pool. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PoolStatus {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

/// Where a worker is in its run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Executing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub state: WorkerState,
    pub tasks_completed: u64,
}

#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub mode: PoolMode,
    pub status: PoolStatus,
    pub current_threads: usize,
    pub idle_threads: usize,
    pub peak_threads: usize,
    pub max_threads: usize,
    pub queued_tasks: usize,
    pub queue_limit: usize,
    pub total_submitted: usize,
    pub rejected_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

impl PoolMetrics {
    pub fn busy_threads(&self) -> usize {
        self.current_threads.saturating_sub(self.idle_threads)
    }

    pub fn utilization(&self) -> f64 {
        if self.current_threads == 0 {
            return 0.0;
        }
        self.busy_threads() as f64 / self.current_threads as f64
    }

    /// Fill level of the task queue, 0.0 (empty) to 1.0 (at the limit).
    pub fn queue_pressure(&self) -> f64 {
        if self.queue_limit == 0 {
            return 0.0;
        }
        self.queued_tasks as f64 / self.queue_limit as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}

pub enum JoinOrdering {
    Ordered,
    UnOrdered,
}
