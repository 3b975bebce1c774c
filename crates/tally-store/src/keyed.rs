//! KeyedStore — concurrency-safe name → value map for one metric kind.
//!
//! Readers share the lock; writers are exclusive. The backing map is
//! allocated lazily by [`KeyedStore::init`] (or by the first write), and
//! concurrent initializers all observe the single map the first one
//! installed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::{Counter, MetricValue};

/// Thread-safe mapping from metric name to its current value.
pub struct KeyedStore<T: MetricValue> {
    map: OnceLock<RwLock<HashMap<String, T>>>,
}

impl<T: MetricValue> Default for KeyedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MetricValue> KeyedStore<T> {
    /// Create an unallocated store. Reads on it report every name as absent.
    pub const fn new() -> Self {
        Self {
            map: OnceLock::new(),
        }
    }

    /// Allocate the backing map if absent. Idempotent.
    pub fn init(&self) {
        self.lock();
    }

    fn lock(&self) -> &RwLock<HashMap<String, T>> {
        self.map.get_or_init(|| RwLock::new(HashMap::new()))
    }

    // The map only holds plain values, so a panic mid-write cannot leave it
    // in a state worth refusing to read.
    fn read(&self) -> Option<RwLockReadGuard<'_, HashMap<String, T>>> {
        self.map
            .get()
            .map(|lock| lock.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, T>> {
        self.lock().write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the value stored under `name`.
    pub fn set(&self, name: &str, value: T) {
        self.write().insert(name.to_string(), value);
    }

    /// Current value under `name`, or `None` if it was never written.
    pub fn get(&self, name: &str) -> Option<T> {
        self.read().and_then(|map| map.get(name).copied())
    }

    /// Copy of the whole store, ordered by name.
    pub fn get_all(&self) -> BTreeMap<String, T> {
        match self.read() {
            Some(map) => map.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            None => BTreeMap::new(),
        }
    }

    /// Read-modify-write under a single write lock. `f` receives the current
    /// value (if any) and returns the value to store.
    pub fn update(&self, name: &str, f: impl FnOnce(Option<T>) -> T) -> T {
        let mut map = self.write();
        let next = f(map.get(name).copied());
        map.insert(name.to_string(), next);
        next
    }

    pub fn len(&self) -> usize {
        self.read().map_or(0, |map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyedStore<Counter> {
    /// Add `delta` to the running total under `name` and return the new total.
    /// An absent counter starts from zero.
    pub fn add(&self, name: &str, delta: Counter) -> Counter {
        self.update(name, |old| old.unwrap_or_default().add(delta))
    }
}

impl<T: MetricValue> fmt::Display for KeyedStore<T> {
    /// One `name: value` line per entry, ordered by name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.get_all() {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

impl<T: MetricValue> fmt::Debug for KeyedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .finish()
    }
}
