use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Values kept for a fixed time-to-live, then rebuilt on next access.
///
/// Invalidation is all-or-nothing. A replacement value is fully built before
/// it is stored; a failed rebuild drops the stale entry and stores nothing.
#[derive(Debug)]
pub struct TimedCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V> TimedCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if present and not expired.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
    }

    /// The fresh value for `key`, built and stored first when absent or
    /// expired. Errors from `build` are passed through.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        build: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        let ttl = self.ttl;
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().0.elapsed() >= ttl {
                    match build() {
                        Ok(value) => {
                            entry.insert((Instant::now(), value));
                        }
                        Err(e) => {
                            entry.remove();
                            return Err(e);
                        }
                    }
                }
                Ok(&entry.into_mut().1)
            }
            Entry::Vacant(entry) => {
                let value = build()?;
                Ok(&entry.insert((Instant::now(), value)).1)
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
