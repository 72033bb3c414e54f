use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Run `work` over `items` with at most `workers` tasks in flight.
///
/// Workers pull from a shared queue, so every item is handed out exactly
/// once. Results come back in completion order, not input order.
pub async fn run_pool<T, R, F, Fut>(items: Vec<T>, workers: usize, work: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, items.len());
    let expected = items.len();

    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let work = Arc::new(work);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut set = JoinSet::new();
    for _ in 0..workers {
        let queue = queue.clone();
        let work = work.clone();
        let tx = tx.clone();
        set.spawn(async move {
            loop {
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some(item) = next else { break };
                if tx.send((*work)(item).await).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(expected);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            log::error!("worker task failed: {e}");
        }
    }
    if results.len() != expected {
        log::warn!("{} of {expected} items produced no result", expected - results.len());
    }
    results
}
