//! Пул потоков для фонового выполнения interactor-задач
//!
//! # Features
//! - Core/max размер пула и keep-alive для лишних воркеров
//! - Собственная FIFO-очередь у каждого пула
//! - Синхронная проверка аргументов при отправке задачи
//! - Graceful shutdown и shutdown_now с возвратом невыполненных задач
//! - Handle с результатом и отменой, обработка паник
//! - Метрики и мониторинг

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;
pub mod task;

pub use errors::{PoolError, SpawnError};
pub use handle::JoinHandle;
pub use model::PoolMetrics;
pub use pool::{Config, WorkerPool};
pub use task::{BoxedTask, Executor, Task};
