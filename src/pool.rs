use super::{
    errors::PoolError,
    handle::{self, JoinHandle},
    model::PoolMetrics,
    result::PoolResult,
    task::{BoxedTask, Executor, Task},
};
use std::{
    fmt,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use crossbeam::{
    channel,
    deque::{Injector, Steal},
};
use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};


const DEFAULT_CORE_SIZE: usize = 3;
const DEFAULT_MAX_SIZE: usize = 5;
const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(120);

/// Конфигурация пула потоков
#[derive(Debug, Clone)]
pub struct Config {
    pub core_size: usize,
    pub max_size: usize,
    pub keep_alive: Duration,
    pub thread_name: String,
    pub stack_size: Option<usize>,
    /// Разрешить core-воркерам завершаться по `keep_alive`
    pub allow_core_timeout: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_name: "worker-pool".to_string(),
            stack_size: None,
            allow_core_timeout: false,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            core_size: num_cpus,
            max_size: num_cpus,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            core_size: num_cpus,
            max_size: num_cpus * 2, // Для I/O-bound задач
            keep_alive: Duration::from_secs(30),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.max_size < self.core_size {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_size ({}) is smaller than core_size ({})",
                self.max_size, self.core_size
            )));
        }
        if self.allow_core_timeout && self.keep_alive.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "core threads must have a non-zero keep_alive".to_string(),
            ));
        }
        Ok(())
    }
}


#[derive(Debug, Default)]
struct State {
    workers: usize,
    idle: usize,
    largest: usize,
    shutdown: bool,
}

impl State {
    #[inline]
    fn terminated(&self) -> bool {
        self.shutdown && self.workers == 0
    }
}

struct Shared {
    queue: Injector<BoxedTask>,
    // Учёт воркеров сериализован этим мьютексом: пул не вырастет больше max_size
    state: Mutex<State>,
    work_available: Condvar,
    terminated: Condvar,
    config: Config,
    next_worker_id: AtomicUsize,
    queued_tasks: AtomicUsize,
    active_tasks: AtomicUsize,
    total_submitted: AtomicUsize,
    completed_tasks: AtomicUsize,
    failed_tasks: AtomicUsize,
}

impl Shared {
    fn new(config: Config) -> Self {
        Self {
            queue: Injector::new(),
            state: Mutex::new(State::default()),
            work_available: Condvar::new(),
            terminated: Condvar::new(),
            config,
            next_worker_id: AtomicUsize::new(0),
            queued_tasks: AtomicUsize::new(0),
            active_tasks: AtomicUsize::new(0),
            total_submitted: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            failed_tasks: AtomicUsize::new(0),
        }
    }

    fn spawn_worker(self: &Arc<Self>, state: &mut State) -> io::Result<()> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new()
            .name(format!("{}-{}", self.config.thread_name, id));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let shared = Arc::clone(self);
        builder.spawn(move || shared.worker_loop(id))?;

        state.workers += 1;
        state.largest = state.largest.max(state.workers);
        debug!(worker_id = id, live_workers = state.workers, "worker started");
        Ok(())
    }

    #[inline]
    fn pop(&self) -> Option<BoxedTask> {
        loop {
            match self.queue.steal() {
                Steal::Success(task) => {
                    self.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                    return Some(task);
                }
                Steal::Empty => return None,
                Steal::Retry => std::hint::spin_loop(),
            }
        }
    }

    fn worker_loop(&self, id: usize) {
        loop {
            if let Some(task) = self.pop() {
                self.run_task(id, task);
                continue;
            }

            let mut state = self.state.lock();
            // Задача могла прийти между pop и захватом блокировки
            if !self.queue.is_empty() {
                continue;
            }
            if state.shutdown {
                self.retire(id, &mut state, "pool shut down");
                return;
            }

            state.idle += 1;
            let timed_out = if self.may_retire(&state) {
                self.work_available
                    .wait_for(&mut state, self.config.keep_alive)
                    .timed_out()
            } else {
                self.work_available.wait(&mut state);
                false
            };
            state.idle -= 1;

            if timed_out && !state.shutdown && self.queue.is_empty() && self.may_retire(&state) {
                self.retire(id, &mut state, "keep-alive expired");
                return;
            }
        }
    }

    #[inline]
    fn may_retire(&self, state: &State) -> bool {
        self.config.allow_core_timeout || state.workers > self.config.core_size
    }

    fn retire(&self, id: usize, state: &mut State, reason: &'static str) {
        state.workers -= 1;
        debug!(worker_id = id, live_workers = state.workers, reason, "worker retired");

        if state.terminated() {
            info!("worker pool terminated");
            self.terminated.notify_all();
        }
    }

    fn run_task(&self, id: usize, task: BoxedTask) {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || task.execute()));
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);

        match outcome {
            Ok(()) => {
                self.completed_tasks.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.failed_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker_id = id,
                    panic = %handle::panic_message(payload.as_ref()),
                    "task panicked, worker keeps running"
                );
            }
        }
    }

    fn metrics(&self) -> PoolMetrics {
        let (live_workers, idle_workers, largest_pool_size) = {
            let state = self.state.lock();
            (state.workers, state.idle, state.largest)
        };
        PoolMetrics {
            live_workers,
            idle_workers,
            largest_pool_size,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            total_submitted: self.total_submitted.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
        }
    }
}


/// Пул потоков с core/max размером и FIFO-очередью задач.
///
/// Drop выполняет graceful `shutdown`, не дожидаясь завершения воркеров.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(core_size: usize, max_size: usize, keep_alive: Duration) -> PoolResult<Self> {
        let config = Config {
            core_size,
            max_size,
            keep_alive,
            ..Default::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> PoolResult<Self> {
        config.validate()?;
        let core_size = config.core_size;
        let pool = WorkerPool {
            shared: Arc::new(Shared::new(config)),
        };

        {
            let mut state = pool.shared.state.lock();
            for _ in 0..core_size {
                pool.shared.spawn_worker(&mut state)?;
            }
        }

        debug!(
            core_size,
            max_size = pool.shared.config.max_size,
            keep_alive = ?pool.shared.config.keep_alive,
            "worker pool started"
        );
        Ok(pool)
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Ставит задачу в очередь и сразу возвращается
    pub fn submit<T: Task>(&self, task: T) -> PoolResult<()> {
        self.enqueue(Box::new(task))
    }

    pub fn submit_with_handle<T, F>(&self, f: F) -> PoolResult<JoinHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (job, handle) = handle::with_handle(f);
        self.submit(job)?;
        Ok(handle)
    }

    fn enqueue(&self, task: BoxedTask) -> PoolResult<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.shutdown {
            return Err(PoolError::ShutDown);
        }

        // Рост решается до push: без живых воркеров задача не принимается
        let queued = shared.queued_tasks.load(Ordering::Relaxed) + 1;
        if queued > state.idle && state.workers < shared.config.max_size {
            if let Err(err) = shared.spawn_worker(&mut state) {
                if state.workers == 0 {
                    warn!(error = %err, "no live workers, task rejected");
                    return Err(PoolError::Spawn(err));
                }
                warn!(
                    error = %err,
                    live_workers = state.workers,
                    "failed to grow worker pool, task stays queued"
                );
            }
        }

        // Счётчик увеличивается до push: воркер может забрать задачу без блокировки
        shared.queued_tasks.fetch_add(1, Ordering::Relaxed);
        shared.queue.push(task);
        shared.total_submitted.fetch_add(1, Ordering::Relaxed);

        if state.idle > 0 {
            shared.work_available.notify_one();
        }

        trace!(queued, live_workers = state.workers, "task submitted");
        Ok(())
    }

    /// Прекращает приём задач; очередь дорабатывается воркерами
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        info!(
            live_workers = state.workers,
            queued_tasks = self.shared.queued_tasks.load(Ordering::Relaxed),
            "worker pool shutting down"
        );

        self.shared.work_available.notify_all();
        if state.terminated() {
            self.shared.terminated.notify_all();
        }
    }

    /// Прекращает приём задач и возвращает задачи, которые ещё не начали выполняться
    pub fn shutdown_now(&self) -> Vec<BoxedTask> {
        let mut state = self.shared.state.lock();
        state.shutdown = true;

        let mut pending = Vec::new();
        while let Some(task) = self.shared.pop() {
            pending.push(task);
        }
        info!(
            live_workers = state.workers,
            discarded = pending.len(),
            "worker pool stopped"
        );

        self.shared.work_available.notify_all();
        if state.terminated() {
            self.shared.terminated.notify_all();
        }
        pending
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.state.lock().terminated()
    }

    /// Ждёт завершения всех воркеров после shutdown.
    ///
    /// Возвращает `false`, если время вышло раньше.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.join();
            return true;
        };

        let mut state = self.shared.state.lock();
        while !state.terminated() {
            if self.shared.terminated.wait_until(&mut state, deadline).timed_out() {
                return state.terminated();
            }
        }
        true
    }

    /// Блокирует до завершения всех воркеров. Без `shutdown` не вернётся никогда,
    /// из воркера пула вызывать нельзя.
    pub fn join(&self) {
        let mut state = self.shared.state.lock();
        while !state.terminated() {
            self.shared.terminated.wait(&mut state);
        }
    }

    pub fn shutdown_timeout(&self, timeout: Duration) -> bool {
        self.shutdown();
        self.await_termination(timeout)
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        self.shared.metrics()
    }

    /// Мониторинг метрик с callback в отдельном потоке
    /// ВАЖНО: Вызовите token.cancel() для остановки мониторинга
    pub fn start_monitoring<F>(&self, interval: Duration, callback: F) -> PoolResult<CancellationToken>
    where
        F: Fn(PoolMetrics) + Send + 'static,
    {
        if interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "monitoring interval must be greater than zero".to_string(),
            ));
        }

        let shared = Arc::downgrade(&self.shared);
        let token = CancellationToken::new();
        let stop = token.clone();
        let ticker = channel::tick(interval);

        thread::Builder::new()
            .name(format!("{}-monitor", self.shared.config.thread_name))
            .spawn(move || {
                while ticker.recv().is_ok() {
                    if stop.is_cancelled() {
                        break;
                    }
                    let Some(shared) = shared.upgrade() else {
                        break;
                    };
                    callback(shared.metrics());
                    if shared.state.lock().terminated() {
                        break;
                    }
                }
            })?;

        Ok(token)
    }

    /// Остановить мониторинг
    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }
}

impl Executor for WorkerPool {
    fn run(&self, interactor: Option<BoxedTask>) -> PoolResult<()> {
        let interactor = interactor
            .ok_or(PoolError::InvalidArgument("interactor to execute can't be null"))?;
        self.enqueue(interactor)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("metrics", &self.metrics())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn default_config_matches_executor_constants() {
        let config = Config::default();
        assert_eq!(config.core_size, 3);
        assert_eq!(config.max_size, 5);
        assert_eq!(config.keep_alive, Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn presets_are_valid() {
        assert!(Config::cpu_bound().validate().is_ok());
        assert!(Config::io_bound().validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_size() {
        let err = WorkerPool::new(0, 0, Duration::ZERO).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_core_timeout_without_keep_alive() {
        let config = Config {
            allow_core_timeout: true,
            keep_alive: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn core_workers_start_eagerly() {
        let pool = WorkerPool::new(2, 4, Duration::from_secs(60)).unwrap();
        let metrics = pool.metrics();
        assert_eq!(metrics.live_workers, 2);
        assert_eq!(metrics.largest_pool_size, 2);
    }

    #[test]
    fn zero_core_grows_on_demand() {
        let pool = WorkerPool::new(0, 1, Duration::from_millis(50)).unwrap();
        assert_eq!(pool.metrics().live_workers, 0);

        let (tx, rx) = mpsc::channel();
        pool.submit(move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        assert!(pool.shutdown_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn workers_are_named() {
        let config = Config {
            core_size: 1,
            max_size: 1,
            thread_name: "interactor".to_string(),
            ..Default::default()
        };
        let pool = WorkerPool::with_config(config).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.submit(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
        })
        .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("interactor-0"));
    }

    #[test]
    fn shutdown_on_idle_pool_terminates() {
        let pool = WorkerPool::new(3, 5, Duration::from_secs(120)).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert!(pool.is_terminated());
        assert_eq!(pool.metrics().live_workers, 0);
    }
}
