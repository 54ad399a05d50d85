//! Payload cache scoped to a single mutation.
//!
//! Entries only live between `start_mutation` and `finish_mutation`; readers
//! must fall back to the store outside that window.

use feedhead_core::Payload;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub mutation_count: usize,
    pub current_size: usize,
    pub max_size: usize,
}

#[derive(Debug, Default)]
pub struct ContentCache {
    entries: Mutex<HashMap<String, Payload>>,
    mutation_count: AtomicUsize,
    max_size: AtomicUsize,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Option<MutexGuard<'_, HashMap<String, Payload>>> {
        match self.entries.lock() {
            Ok(guard) => Some(guard),
            Err(e) => {
                error!(error = %e, "Content cache lock poisoned");
                None
            }
        }
    }

    pub fn start_mutation(&self) {
        self.mutation_count.fetch_add(1, Ordering::Relaxed);
        if let Some(mut entries) = self.entries() {
            entries.clear();
        }
    }

    pub fn finish_mutation(&self) {
        if let Some(mut entries) = self.entries() {
            let size = entries.len();
            self.max_size.fetch_max(size, Ordering::Relaxed);
            debug!(size, "Content cache mutation finished");
            entries.clear();
        }
    }

    pub fn get(&self, key: &str) -> Option<Payload> {
        self.entries()?.get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, payload: Payload) {
        if let Some(mut entries) = self.entries() {
            entries.insert(key.into(), payload);
        }
    }

    pub fn size(&self) -> usize {
        self.entries().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn reset(&self) {
        if let Some(mut entries) = self.entries() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            mutation_count: self.mutation_count.load(Ordering::Relaxed),
            current_size: self.size(),
            max_size: self.max_size.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_entries_scoped_to_mutation() {
        let cache = ContentCache::new();
        cache.start_mutation();
        cache.put("a", Payload::from("A"));
        cache.put("b", Payload::from("B"));
        assert_eq!(cache.get("a"), Some(Payload::from("A")));
        cache.finish_mutation();

        assert_eq!(cache.get("a"), None);
        assert_eq!(
            cache.stats(),
            CacheStats {
                mutation_count: 1,
                current_size: 0,
                max_size: 2
            }
        );
    }

    #[test]
    fn test_max_size_is_high_water_mark() {
        let cache = ContentCache::new();
        cache.start_mutation();
        for i in 0..3 {
            cache.put(format!("id{}", i), Payload::from("x"));
        }
        cache.finish_mutation();

        cache.start_mutation();
        cache.put("only", Payload::from("y"));
        cache.finish_mutation();

        let stats = cache.stats();
        assert_eq!(stats.mutation_count, 2);
        assert_eq!(stats.max_size, 3);
    }

    #[test]
    fn test_start_mutation_drops_leftovers() {
        let cache = ContentCache::new();
        cache.put("stale", Payload::from("s"));
        cache.start_mutation();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_concurrent_put_and_get() {
        let cache = Arc::new(ContentCache::new());
        cache.start_mutation();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("{}-{}", t, i);
                        cache.put(key.clone(), Payload::from("p"));
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), 200);
        cache.finish_mutation();
        assert_eq!(cache.stats().max_size, 200);
    }
}
