use super::{
    errors::PoolError,
    handle::{Task, TaskHandle},
    model::{PoolMetrics, Tally},
    result::PoolResult,
};
use std::{
    future::Future,
    panic,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use crossbeam::deque::{Injector, Steal};
use tokio::{
    sync::{oneshot, Mutex, Notify},
    task::JoinHandle,
    time::Duration,
};
use futures::{
    stream::{FuturesUnordered, StreamExt},
    FutureExt,
};
use tokio_util::sync::CancellationToken;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of persistent workers. Zero is rejected at construction.
    pub num_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }
}

impl Config {
    /// One worker per core, for compute-heavy task bodies.
    pub fn cpu_bound() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }

    /// Two workers per core, for task bodies that spend most of their time waiting.
    pub fn io_bound() -> Self {
        Self {
            num_workers: num_cpus::get() * 2,
        }
    }
}

/// Shared-ownership alias for the pool; workers and monitors hold clones.
pub type WorkerPool = Arc<WorkerPoolInner>;

#[inline(always)]
fn unlikely(b: bool) -> bool {
    #[cold]
    fn cold() {}
    if !b {
        cold()
    }
    b
}

/// Fixed-size worker pool that executes numeric tasks and folds every
/// completed result into a running [`Tally`].
///
/// Workers drain one shared FIFO queue. Shutdown is graceful: every task
/// accepted before [`shutdown`](Self::shutdown) completes before the workers
/// exit. The pool holds no background threads of its own, only Tokio tasks,
/// so it must be created and shut down inside a runtime; a pool dropped
/// without `shutdown` leaves its workers parked until the runtime stops.
pub struct WorkerPoolInner {
    inject: Injector<Task>,
    work_available: Notify,
    stop: CancellationToken,
    // Authoritative stop flag. Set (SeqCst) before the token is cancelled;
    // the token only wakes parked workers.
    stopping: AtomicBool,
    // Accepted-but-unfinished tasks. Claimed before the stopping check, so
    // workers never exit while a racing submission may still land.
    active_tasks: AtomicUsize,
    queued_tasks: AtomicUsize,
    completed_tasks: Arc<AtomicUsize>,
    failed_tasks: Arc<AtomicUsize>,
    idle_workers: AtomicUsize,
    all_tasks_done: Notify,
    totals: Arc<Mutex<Tally>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: Config,
}

impl WorkerPoolInner {
    /// Builds a pool with `num_workers` workers.
    pub fn new(num_workers: usize) -> PoolResult<WorkerPool> {
        Self::with_config(Config { num_workers })
    }

    /// Builds a pool from `config`, spawning every worker before returning.
    ///
    /// Fails with [`PoolError::ZeroWorkers`] when `config.num_workers` is
    /// zero. Must be called from within a Tokio runtime.
    pub fn with_config(config: Config) -> PoolResult<WorkerPool> {
        if config.num_workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }

        let pool = Arc::new(WorkerPoolInner {
            inject: Injector::new(),
            work_available: Notify::new(),
            stop: CancellationToken::new(),
            stopping: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            queued_tasks: AtomicUsize::new(0),
            completed_tasks: Arc::new(AtomicUsize::new(0)),
            failed_tasks: Arc::new(AtomicUsize::new(0)),
            idle_workers: AtomicUsize::new(0),
            all_tasks_done: Notify::new(),
            totals: Arc::new(Mutex::new(Tally::default())),
            workers: Mutex::new(Vec::new()),
            config,
        });

        let mut workers = pool
            .workers
            .try_lock()
            .expect("worker table is unshared during construction");
        for worker_id in 0..pool.config.num_workers {
            let pool_clone = Arc::clone(&pool);
            workers.push(tokio::spawn(async move {
                pool_clone.worker_loop(worker_id).await;
            }));
        }
        drop(workers);

        Ok(pool)
    }

    /// Queues `f` and returns a handle to its eventual result.
    ///
    /// The task is accepted unless the pool is stopping. An accepted task
    /// always runs to completion, even if the handle is dropped, and its
    /// result still enters the tally.
    pub fn spawn<F>(&self, f: F) -> PoolResult<TaskHandle>
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        self.spawn_future(async move { f() })
    }

    /// Queues an async task body; otherwise identical to [`spawn`](Self::spawn).
    pub fn spawn_future<F>(&self, fut: F) -> PoolResult<TaskHandle>
    where
        F: Future<Output = f64> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<PoolResult<f64>>();

        let totals = self.totals.clone();
        let completed = self.completed_tasks.clone();
        let failed = self.failed_tasks.clone();

        let task: Task = Box::pin(async move {
            let result = panic::AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .map_err(|payload| PoolError::Panic(panic_message(payload)));

            match result {
                Ok(value) => {
                    // Fold into the tally before resolving the handle, so a
                    // caller returning from `submit` already sees its task
                    // reflected in `average`.
                    totals.lock().await.record(value);
                    completed.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(Ok(value));
                }
                Err(err) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "tracing")]
                    tracing::warn!("task failed: {err}");
                    let _ = tx.send(Err(err));
                }
            }
        });

        self.try_enqueue(task)?;
        Ok(TaskHandle::new(rx))
    }

    /// Runs `f` on a worker and waits for its result.
    ///
    /// Returns once the task has executed and its result has been folded
    /// into the tally, so `average` immediately reflects it. The wait is on
    /// the task's own completion signal; no pool-wide lock is held, and
    /// other workers keep dequeuing meanwhile. A single caller submitting in
    /// a loop serializes itself on each task; use [`spawn`](Self::spawn) and
    /// [`join_all`](Self::join_all) to keep every worker busy from one
    /// submitter.
    ///
    /// Do not call this from inside a task body: a fully busy pool would
    /// deadlock waiting for itself. Nested [`spawn`](Self::spawn) is fine.
    pub async fn submit<F>(&self, f: F) -> PoolResult<f64>
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        self.spawn(f)?.await
    }

    fn try_enqueue(&self, task: Task) -> PoolResult<()> {
        // Claim before the stopping check. Workers refuse to exit while a
        // claim is outstanding, so a submission racing `shutdown` is either
        // rejected here or drained like any other accepted task; it can
        // never be silently stranded in the queue.
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        if unlikely(self.stopping.load(Ordering::SeqCst)) {
            self.release_active();
            return Err(PoolError::PoolStopping);
        }
        self.queued_tasks.fetch_add(1, Ordering::Relaxed);
        self.inject.push(task);
        self.work_available.notify_one();
        Ok(())
    }

    // One accepted task left the in-flight set, either by completing or by
    // being rolled back after a rejected submission.
    fn release_active(&self) {
        let prev = self.active_tasks.fetch_sub(1, Ordering::SeqCst);
        if unlikely(prev == 1) {
            self.all_tasks_done.notify_waiters();
            // Wake workers parked in the stopping drain-wait.
            self.work_available.notify_waiters();
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    async fn worker_loop(&self, worker_id: usize) {
        #[cfg(feature = "tracing")]
        tracing::trace!("worker {worker_id} started");

        'outer: loop {
            // Drain whatever is currently queued.
            loop {
                match self.inject.steal() {
                    Steal::Success(task) => {
                        self.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                        task.await;
                        self.release_active();
                    }
                    Steal::Retry => continue,
                    Steal::Empty => break,
                }
            }

            // Queue observed empty. Arm the wakeup before re-checking state,
            // so a push landing between the check and the sleep still wakes
            // this worker.
            let notified = self.work_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.inject.is_empty() {
                continue 'outer;
            }

            if self.stopping.load(Ordering::SeqCst) {
                // Stopping. Exit only once nothing accepted is left in
                // flight; until then keep waiting, a straggler push or the
                // final completion will wake us.
                if self.active_tasks.load(Ordering::SeqCst) == 0 {
                    break 'outer;
                }
                self.idle_workers.fetch_add(1, Ordering::Relaxed);
                notified.await;
                self.idle_workers.fetch_sub(1, Ordering::Relaxed);
            } else {
                self.idle_workers.fetch_add(1, Ordering::Relaxed);
                tokio::select! {
                    _ = notified => {}
                    _ = self.stop.cancelled() => {}
                }
                self.idle_workers.fetch_sub(1, Ordering::Relaxed);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("worker {worker_id} stopped");
    }

    /// Mean of all completed task results.
    ///
    /// Errors with [`PoolError::NoCompletedTasks`] before the first
    /// completion rather than producing a NaN.
    pub async fn average(&self) -> PoolResult<f64> {
        self.totals
            .lock()
            .await
            .mean()
            .ok_or(PoolError::NoCompletedTasks)
    }

    /// Snapshot of the running sum and count of completed results.
    pub async fn tally(&self) -> Tally {
        *self.totals.lock().await
    }

    /// Waits until every accepted task has completed. Does not stop the pool.
    pub async fn join_all(&self) {
        loop {
            let notified = self.all_tasks_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active_tasks.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Awaits a batch of handles, returning results in completion order.
    pub async fn join_handles(&self, handles: Vec<TaskHandle>) -> Vec<PoolResult<f64>> {
        if handles.is_empty() {
            return Vec::new();
        }

        let len = handles.len();
        let mut pending = FuturesUnordered::from_iter(handles);
        let mut results = Vec::with_capacity(len);

        while let Some(result) = pending.next().await {
            results.push(result);
        }

        results
    }

    /// Stops the pool and waits for the queue to drain.
    ///
    /// Marks the pool stopping, wakes every worker and joins each one; a
    /// worker exits only once the queue is empty and nothing accepted is
    /// still in flight, so every task accepted before this call has
    /// completed when `shutdown` returns. Calling it again is safe: later
    /// calls find no workers left to join and only wait for the drain.
    pub async fn shutdown(&self) -> PoolResult<()> {
        self.stopping.store(true, Ordering::SeqCst);
        self.stop.cancel();

        #[cfg(feature = "tracing")]
        tracing::debug!("shutdown requested, draining workers");

        let handles = {
            let mut workers = self.workers.lock().await;
            std::mem::take(&mut *workers)
        };

        let mut join_error: Option<PoolError> = None;
        for handle in handles {
            if let Err(err) = handle.await {
                #[cfg(feature = "tracing")]
                tracing::error!("worker join failed: {err}");
                join_error.get_or_insert(PoolError::JoinFailed(err.to_string()));
            }
        }
        if let Some(err) = join_error {
            return Err(err);
        }

        // Second and later callers hold no worker handles; wait here for
        // the drain the first caller is performing.
        self.join_all().await;

        #[cfg(feature = "tracing")]
        tracing::debug!("worker pool shutdown complete");
        Ok(())
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            workers: self.config.num_workers,
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            idle_workers: self.idle_workers.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.config.num_workers
    }

    /// Spawns a periodic observer that invokes `callback` with fresh metrics.
    ///
    /// Cancel the returned token to stop the observer and release its pool
    /// reference.
    pub fn start_monitoring<F>(self: &Arc<Self>, interval: Duration, callback: F) -> CancellationToken
    where
        F: Fn(PoolMetrics) + Send + 'static,
    {
        let pool = Arc::clone(self);
        let token = CancellationToken::new();
        let token_clone = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        callback(pool.metrics());
                    }
                    _ = token_clone.cancelled() => {
                        drop(pool);
                        break;
                    }
                }
            }
        });

        token
    }

    /// Stops an observer started by [`start_monitoring`](Self::start_monitoring).
    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
