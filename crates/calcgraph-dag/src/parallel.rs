use rayon::ThreadPool;
use std::sync::OnceLock;

/// Crate-local pool for level-parallel execution.
///
/// Building our own pool instead of using rayon's global one lets a failed
/// pool construction degrade to sequential execution rather than panic.
static RAYON_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn desired_threads() -> usize {
    std::env::var("RAYON_NUM_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

fn build_pool() -> Option<ThreadPool> {
    let requested = desired_threads();
    let try_build = |n| rayon::ThreadPoolBuilder::new().num_threads(n).build();

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(err) if requested > 1 => {
            tracing::warn!(%err, requested, "falling back to a single-thread pool");
            try_build(1).ok()
        }
        Err(err) => {
            tracing::warn!(%err, "no thread pool; levels run sequentially");
            None
        }
    }
}

/// The pool, if one could be created
pub(crate) fn rayon_pool() -> Option<&'static ThreadPool> {
    RAYON_POOL.get_or_init(build_pool).as_ref()
}
