use std::time::Duration;
use thiserror::Error;

/// Everything a caller can observe going wrong between `submit` and `get`.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("task queue stayed full for {timeout:?}, submission rejected")]
    Rejected { timeout: Duration },
    #[error("thread pool is not running")]
    NotRunning,
    #[error("thread pool shut down before the task was dispatched")]
    Discarded,
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("result type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("thread pool was already started")]
    AlreadyStarted,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
    #[error("result not ready after {0:?}")]
    Timeout(Duration),
    #[error("result was already taken from this handle")]
    ResultTaken,
}

impl PoolError {
    /// True for the errors produced at submission time, before any worker saw the task.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PoolError::Rejected { .. } | PoolError::NotRunning)
    }
}
