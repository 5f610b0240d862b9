//! In-flight request coalescing.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

type Entry<T> = (u64, Shared<BoxFuture<'static, T>>);

/// Coalesces concurrent requests with the same key into one execution.
///
/// The first caller for a key starts the work; later callers await the same
/// shared future. The entry is dropped once the work settles, so a later call
/// with the same key runs again.
pub struct InFlightRequests<T: Clone + Send + Sync + 'static> {
    next_generation: AtomicU64,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone + Send + Sync + 'static> InFlightRequests<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            next_generation: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` under `key`, or join the execution already running for it.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (generation, shared) = {
            let mut entries = self.entries.lock().await;
            match entries.get(key) {
                Some((generation, shared)) => (*generation, shared.clone()),
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let shared = work().boxed().shared();
                    entries.insert(key.to_string(), (generation, shared.clone()));
                    (generation, shared)
                }
            }
        };

        let result = shared.await;

        let mut entries = self.entries.lock().await;
        if entries.get(key).map(|(g, _)| *g == generation).unwrap_or(false) {
            entries.remove(key);
        }

        result
    }

    /// Number of keys currently in flight.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether nothing is in flight.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for InFlightRequests<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_execution() {
        let cache = InFlightRequests::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            7
        };

        let (a, b) = tokio::join!(
            cache.run("k", || run(calls.clone())),
            cache.run("k", || run(calls.clone())),
        );

        assert_eq!((a, b), (7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_settled_entries_run_again() {
        let cache = InFlightRequests::<usize>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .run("k", move || async move { calls.fetch_add(1, Ordering::SeqCst) })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share() {
        let cache = InFlightRequests::<&'static str>::new();

        let (a, b) = tokio::join!(
            cache.run("a", || async { "first" }),
            cache.run("b", || async { "second" }),
        );

        assert_eq!((a, b), ("first", "second"));
    }
}
