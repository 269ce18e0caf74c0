use thiserror::Error;


/// Ошибки отправки задачи в пул и конфигурации пула
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("worker pool is shut down")]
    ShutDown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Результат задачи, отправленной через `submit_with_handle`
#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Error)]
pub enum SpawnError {
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("task was cancelled before it started")]
    Cancelled,
    #[error("task was dropped before producing a result")]
    ChannelClosed,
    #[error("timed out waiting for task result")]
    Timeout,
}
