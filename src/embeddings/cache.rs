use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Thread-safe LRU cache for query embeddings
///
/// Evaluation re-embeds the same queries and ground truths for both
/// pipelines; the cache keeps those from hitting the API twice.
pub struct EmbeddingCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` embeddings (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.cache.lock().unwrap().get(text).cloned()
    }

    pub fn put(&self, text: String, embedding: Vec<f32>) {
        self.cache.lock().unwrap().put(text, embedding);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_put_and_get() {
        let cache = EmbeddingCache::new(10);
        cache.put("what is phishing".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get("what is phishing"), Some(vec![1.0, 2.0]));
        assert!(cache.get("what is xss").is_none());
    }

    #[test]
    fn test_cache_eviction_respects_recent_use() {
        let cache = EmbeddingCache::new(2);
        cache.put("q1".to_string(), vec![1.0]);
        cache.put("q2".to_string(), vec![2.0]);
        let _ = cache.get("q1");
        cache.put("q3".to_string(), vec![3.0]);

        assert!(cache.get("q1").is_some());
        assert!(cache.get("q2").is_none());
        assert!(cache.get("q3").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_zero_capacity_holds_one() {
        let cache = EmbeddingCache::new(0);
        assert!(cache.is_empty());
        cache.put("a".to_string(), vec![1.0]);
        cache.put("b".to_string(), vec![2.0]);
        assert_eq!(cache.len(), 1);
    }
}
