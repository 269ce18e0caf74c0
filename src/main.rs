use worker_pool::{BoxedTask, Executor, WorkerPool};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worker_pool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let now = Instant::now();
    let pool = WorkerPool::new(3, 5, Duration::from_secs(120))?;
    let done = Arc::new(AtomicUsize::new(0));

    for i in 0..50 {
        let done = done.clone();
        let interactor: BoxedTask = Box::new(move || {
            std::thread::sleep(Duration::from_millis(10));
            let _a = i;
            done.fetch_add(1, Ordering::Relaxed);
        });
        pool.run(Some(interactor))?;
    }

    if let Err(e) = pool.run(None) {
        tracing::warn!(error = %e, "rejected");
    }

    pool.shutdown();
    pool.join();

    let metrics = pool.metrics();
    println!(
        "done: {} largest pool: {} elapsed: {:?}",
        done.load(Ordering::Relaxed),
        metrics.largest_pool_size,
        now.elapsed()
    );
    Ok(())
}
