// src/context.rs

//! Shared state handed to every command of a run.
//!
//! All accessors take `&self`: the graph scheduler hands the same context to
//! commands running in parallel, so implementations must synchronise
//! mutation internally.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Key-value store passed through an execution.
pub trait Context: Send + Sync {
    type Value: Clone + Send + Sync;

    fn get(&self, key: &str) -> Option<Self::Value>;

    /// Store `value` under `key`, returning the previous value.
    fn set(&self, key: &str, value: Self::Value) -> Option<Self::Value>;

    fn remove(&self, key: &str) -> Option<Self::Value>;

    /// Snapshot of the keys currently present.
    fn keys(&self) -> Vec<String>;

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Concurrency-safe in-memory [`Context`].
pub struct MapContext<V = String> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> MapContext<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic inside another command must not make the context unusable for
    // the rest of the run.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> Default for MapContext<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for MapContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapContext")
            .field("entries", &*self.read())
            .finish()
    }
}

impl<V> FromIterator<(String, V)> for MapContext<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<V: Clone + Send + Sync> Context for MapContext<V> {
    type Value = V;

    fn get(&self, key: &str) -> Option<V> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: V) -> Option<V> {
        self.write().insert(key.to_string(), value)
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.write().remove(key)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }
}
