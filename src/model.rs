/// Running aggregate of completed task results.
///
/// `sum` and `count` always come from the same set of completions; the pool
/// updates them together under one lock, so a snapshot is never torn.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub sum: f64,
    pub count: u64,
}

impl Tally {
    pub(crate) fn record(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Arithmetic mean of the recorded results, `None` before the first one.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.count as f64)
    }
}

/// Point-in-time view of the pool gauges and counters.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub queued_tasks: usize,
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

impl PoolMetrics {
    /// Share of workers currently executing a task.
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        (self.workers - self.idle_workers.min(self.workers)) as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let finished = self.completed_tasks + self.failed_tasks;
        if finished == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / finished as f64
    }
}
