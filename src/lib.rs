//! Bounded-queue worker thread pool with Fixed and Cached growth policies.
//!
//! # Features
//! - Bounded FIFO task queue with a timed admission window (backpressure
//!   surfaces as an invalid [`ResultHandle`], never as a hang)
//! - Fixed mode: constant worker count
//! - Cached mode: grows by at most one worker per submission up to a ceiling,
//!   reclaims workers after sustained idleness
//! - Typed results via closures, or [`AnyValue`] results via the [`Task`] trait
//! - Handles that can be read blocking or awaited as futures
//! - Graceful shutdown: running tasks finish, queued ones are discarded

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;
pub mod task;
pub mod value;

mod queue;
mod worker;

pub use errors::PoolError;
pub use handle::{join_handles, ResultHandle};
pub use model::{JoinOrdering, PoolMetrics, PoolMode, PoolStatus, WorkerSnapshot, WorkerState};
pub use pool::{Config, ThreadPool};
pub use result::TaskResult;
pub use task::Task;
pub use value::AnyValue;
pub use worker::WorkerId;
