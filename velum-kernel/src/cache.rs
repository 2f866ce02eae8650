//! TTL cache for the aggregated server view.
//!
//! One entry per key, replaced wholesale on write. The mutex only covers
//! the get/set of an entry and is never held across an await point. The
//! clock is injected so staleness can be tested without sleeping.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Horloge réelle du process.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<T> {
    value: T,
    inserted_at: Instant,
    ttl: Duration,
}

pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Lecture après expiration = miss (l'entrée périmée est purgée au passage).
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < entry.ttl => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: T, ttl: Duration) {
        let entry = Entry {
            value,
            inserted_at: self.clock.now(),
            ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Horloge pilotée à la main pour tester la péremption.
    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, d: Duration) {
            *self.offset.lock() += d;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock()
        }
    }

    #[test]
    fn hit_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(clock.clone());
        cache.set("k", 42, Duration::from_secs(30));
        clock.advance(Duration::from_secs(29));
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn miss_after_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(clock.clone());
        cache.set("k", 42, Duration::from_secs(30));
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get("k"), None);
        // une fois expirée, l'entrée reste un miss
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn set_replaces_entry_and_resets_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(clock.clone());
        cache.set("k", 1, Duration::from_secs(30));
        clock.advance(Duration::from_secs(20));
        cache.set("k", 2, Duration::from_secs(30));
        clock.advance(Duration::from_secs(20));
        // 40s après le premier set mais 20s après le second : toujours vivant
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn unknown_key_is_a_miss() {
        let cache: TtlCache<u32> = TtlCache::new(Arc::new(SystemClock));
        assert_eq!(cache.get("absent"), None);
    }
}
