use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory cache scoped to a single pipeline run. Entries are never evicted
/// or replaced once written.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        let value = cache.get(key).cloned();
        if value.is_some() {
            debug!("Cache HIT for key: {:?}", key);
        } else {
            debug!("Cache MISS for key: {:?}", key);
        }
        value
    }

    /// Returns the cached value for `key`, resolving and storing it on a miss.
    ///
    /// The lock is held while `resolve` runs, so concurrent callers asking for
    /// any key wait for the first resolution instead of resolving again.
    pub async fn get_or_resolve<F, Fut>(&self, key: K, resolve: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let mut cache = self.inner.lock().await;
        if let Some(value) = cache.get(&key) {
            debug!("Cache HIT for key: {:?}", key);
            return value.clone();
        }
        debug!("Cache MISS for key: {:?}", key);
        let value = resolve().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, value.clone());
        value
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_resolves_once() {
        let cache = Cache::<String, i32>::new();
        let calls = AtomicUsize::new(0);

        assert!(cache.get(&"key1".to_string()).await.is_none());

        let first = cache
            .get_or_resolve("key1".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                123
            })
            .await;
        let second = cache
            .get_or_resolve("key1".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                456
            })
            .await;

        assert_eq!(first, 123);
        assert_eq!(second, 123);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&"key1".to_string()).await, Some(123));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_resolution() {
        let cache = Cache::<String, i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_resolve("shared".to_string(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        7
                    })
                    .await
            })
        });

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
