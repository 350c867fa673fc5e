// In-memory TTL cache.
// Entries expire lazily: an expired entry is dropped by the read that finds it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;

/// Default TTL for cached class lists: 60 seconds.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A cached value stamped with the time it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, stored_at: DateTime<Utc>) -> Self {
        Self { value, stored_at }
    }

    /// An entry is valid while `now - stored_at <= ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let elapsed = now
            .signed_duration_since(self.stored_at)
            .to_std()
            // Stored "in the future" (clock went backwards): still fresh.
            .unwrap_or(Duration::ZERO);

        elapsed > ttl
    }
}

pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    /// Read with the cache's configured TTL.
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_with_ttl(key, self.ttl)
    }

    pub fn get_with_ttl(&self, key: &str, ttl: Duration) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now, ttl) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: T) {
        let entry = CacheEntry::new(value, self.clock.now());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock() -> (TtlCache<Vec<u32>>, ManualClock) {
        let clock = ManualClock::default();
        let cache = TtlCache::new(Arc::new(clock.clone()), DEFAULT_TTL);
        (cache, clock)
    }

    #[test]
    fn test_get_after_set_returns_value() {
        let (cache, _clock) = cache_with_clock();
        cache.set("classes", vec![1, 2, 3]);

        assert_eq!(cache.get("classes"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_get_missing_key() {
        let (cache, _clock) = cache_with_clock();
        assert_eq!(cache.get("classes"), None);
    }

    #[test]
    fn test_entry_valid_at_exact_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("classes", vec![1]);

        clock.advance(chrono::Duration::seconds(60));

        assert_eq!(cache.get("classes"), Some(vec![1]));
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let (cache, clock) = cache_with_clock();
        cache.set("classes", vec![1]);

        clock.advance(chrono::Duration::seconds(61));

        assert_eq!(cache.get("classes"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_set_overwrites_and_restamps() {
        let (cache, clock) = cache_with_clock();
        cache.set("classes", vec![1]);
        clock.advance(chrono::Duration::seconds(50));
        cache.set("classes", vec![2]);
        clock.advance(chrono::Duration::seconds(50));

        assert_eq!(cache.get("classes"), Some(vec![2]));
    }

    #[test]
    fn test_custom_ttl_on_read() {
        let (cache, clock) = cache_with_clock();
        cache.set("classes", vec![1]);
        clock.advance(chrono::Duration::seconds(10));

        assert_eq!(cache.get_with_ttl("classes", Duration::from_secs(5)), None);
    }
}
