use std::collections::VecDeque;

/// A type-erased task as stored in the queue. Returns whether the task body
/// completed without panicking; the result itself travels through the
/// task's own result channel.
pub(crate) type Job = Box<dyn FnOnce() -> bool + Send + 'static>;

/// Bounded FIFO of pending jobs.
///
/// Not synchronized on its own: it lives inside the pool's single
/// coordinating mutex, and the not-full / not-empty condvars next to that
/// mutex are signalled by the pool around every push and pop.
pub(crate) struct TaskQueue {
    jobs: VecDeque<Job>,
    limit: usize,
}

impl TaskQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.limit
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
    }

    /// Appends a job. The caller must have checked `is_full` under the same lock.
    pub fn push(&mut self, job: Job) {
        debug_assert!(!self.is_full(), "push into a full task queue");
        self.jobs.push_back(job);
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Empties the queue, handing the jobs back so they can be dropped outside the lock.
    pub fn drain(&mut self) -> Vec<Job> {
        self.jobs.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_job(log: &Arc<Mutex<Vec<usize>>>, n: usize) -> Job {
        let log = log.clone();
        Box::new(move || {
            log.lock().unwrap().push(n);
            true
        })
    }

    #[test]
    fn pops_in_fifo_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::new(8);
        for n in 0..5 {
            queue.push(recording_job(&log, n));
        }
        while let Some(job) = queue.pop() {
            assert!(job());
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reports_full_at_limit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::new(2);
        assert!(!queue.is_full());
        queue.push(recording_job(&log, 0));
        queue.push(recording_job(&log, 1));
        assert!(queue.is_full());
        assert_eq!(queue.len(), queue.limit());

        queue.pop();
        assert!(!queue.is_full());
    }

    #[test]
    fn zero_limit_is_clamped() {
        let mut queue = TaskQueue::new(0);
        assert_eq!(queue.limit(), 1);
        queue.set_limit(0);
        assert_eq!(queue.limit(), 1);
    }

    #[test]
    fn drain_empties_without_running() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::new(4);
        queue.push(recording_job(&log, 0));
        queue.push(recording_job(&log, 1));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
        drop(drained);
        assert!(log.lock().unwrap().is_empty());
    }
}
