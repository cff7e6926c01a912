use super::{
    errors::PoolError,
    model::JoinOrdering,
    result::TaskResult,
    value::AnyValue,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    sync::oneshot,
    time::Duration,
};

enum Slot<T> {
    Pending(oneshot::Receiver<TaskResult<T>>),
    Rejected(PoolError),
    Taken,
}

/// Handle to the eventual result of one submitted task.
///
/// The worker that runs the task publishes into it exactly once. Read it
/// either by blocking with [`get`](Self::get) or by awaiting the handle.
/// A handle returned for a rejected submission is *invalid*: reading it
/// yields the rejection error immediately.
pub struct ResultHandle<T> {
    slot: Slot<T>,
}

impl<T> ResultHandle<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { slot: Slot::Pending(receiver) }
    }

    pub(crate) fn rejected(err: PoolError) -> Self {
        Self { slot: Slot::Rejected(err) }
    }

    /// False when the submission was rejected and no task is paired with this handle.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self.slot, Slot::Rejected(_))
    }

    /// Blocks the calling thread until the task's result is published.
    ///
    /// Returns at once for an invalid handle. If the pool shut down before
    /// the task was dispatched the result is [`PoolError::Discarded`].
    /// Safe to call from async code, but it parks the calling thread; await
    /// the handle there instead.
    pub fn get(self) -> TaskResult<T> {
        match self.slot {
            Slot::Pending(receiver) => {
                futures::executor::block_on(receiver).unwrap_or(Err(PoolError::Discarded))
            }
            Slot::Rejected(err) => Err(err),
            Slot::Taken => Err(PoolError::ResultTaken),
        }
    }

    /// Like [`get`](Self::get), but any failure collapses to `T::default()`.
    pub fn get_or_default(self) -> T
    where
        T: Default,
    {
        self.get().unwrap_or_default()
    }

    pub async fn await_timeout(self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout(timeout)),
        }
    }

    /// Blocking join over many handles, results in submission order.
    pub fn wait_all(handles: Vec<ResultHandle<T>>) -> Vec<TaskResult<T>> {
        handles.into_iter().map(ResultHandle::get).collect()
    }
}

impl ResultHandle<AnyValue> {
    /// Reads the result of a [`Task`](crate::task::Task) and downcasts it.
    pub fn get_as<U: 'static>(self) -> TaskResult<U> {
        self.get()?.downcast::<U>()
    }
}

impl<T> Future for ResultHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = match &mut this.slot {
            Slot::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(res) => res.unwrap_or(Err(PoolError::Discarded)),
                Poll::Pending => return Poll::Pending,
            },
            Slot::Rejected(err) => Err(err.clone()),
            Slot::Taken => return Poll::Ready(Err(PoolError::ResultTaken)),
        };
        this.slot = Slot::Taken;
        Poll::Ready(output)
    }
}

/// Awaits every handle. `Ordered` keeps submission order, `UnOrdered`
/// yields results as they complete.
pub async fn join_handles<T>(
    handles: Vec<ResultHandle<T>>,
    ordering: JoinOrdering,
) -> Vec<TaskResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }

    match ordering {
        JoinOrdering::Ordered => futures::future::join_all(handles).await,
        JoinOrdering::UnOrdered => {
            let len = handles.len();
            let mut pending = FuturesUnordered::from_iter(handles);
            let mut results = Vec::with_capacity(len);
            while let Some(result) = pending.next().await {
                results.push(result);
            }
            results
        }
    }
}
