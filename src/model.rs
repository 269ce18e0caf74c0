#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub live_workers: usize,
    pub idle_workers: usize,
    pub largest_pool_size: usize,
    pub active_tasks: usize,
    pub queued_tasks: usize,
    pub total_submitted: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.live_workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / self.live_workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }

    /// Задачи, принятые пулом, но ещё не завершённые
    pub fn pending(&self) -> usize {
        self.total_submitted
            .saturating_sub(self.completed_tasks + self.failed_tasks)
    }
}
