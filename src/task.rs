use super::value::AnyValue;

/// A unit of work whose result type is only known to the code that reads it.
///
/// Implement this for a struct carrying the task's inputs and submit it with
/// [`ThreadPool::submit_task`](crate::pool::ThreadPool::submit_task). The
/// caller recovers the concrete value with
/// [`ResultHandle::get_as`](crate::handle::ResultHandle::get_as).
///
/// A task that can fail should encode the failure in its returned value.
/// Panics are caught at the pool boundary and reported as
/// [`PoolError::Panic`](crate::errors::PoolError::Panic).
pub trait Task: Send + 'static {
    fn run(&mut self) -> AnyValue;
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn run(&mut self) -> AnyValue {
        (**self).run()
    }
}
