use thiserror::Error;

/// Errors surfaced by the pool and by task handles.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Pool construction was asked for zero workers.
    #[error("worker pool needs at least one worker")]
    ZeroWorkers,
    /// The pool is shutting down and no longer accepts tasks.
    #[error("pool is stopping, task rejected")]
    PoolStopping,
    /// An average was requested before any task completed.
    #[error("no completed tasks to average")]
    NoCompletedTasks,
    /// The task body panicked; the message is taken from the panic payload.
    #[error("task panicked: {0}")]
    Panic(String),
    /// The result channel closed before a value was produced.
    #[error("result channel closed before completion")]
    ChannelClosed,
    /// A worker could not be joined during shutdown.
    #[error("worker join failed: {0}")]
    JoinFailed(String),
}
