use super::{
    errors::PoolError,
    result::PoolResult,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

/// Type-erased unit of queued work. Carries the user computation together
/// with its bookkeeping and is awaited by exactly one worker.
pub(crate) type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to the eventual result of one submitted task.
///
/// Resolves to the value the task produced, or to the error that kept a
/// value from being produced ([`PoolError::Panic`] for a panicking body).
/// Dropping the handle does not affect the task: it still runs, and its
/// result still enters the pool tally.
pub struct TaskHandle {
    receiver: oneshot::Receiver<PoolResult<f64>>,
}

impl TaskHandle {
    pub(crate) fn new(receiver: oneshot::Receiver<PoolResult<f64>>) -> Self {
        Self { receiver }
    }
}

impl Future for TaskHandle {
    type Output = PoolResult<f64>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(PoolError::ChannelClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}
