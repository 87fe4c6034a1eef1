//! Name-keyed registries for long-lived render state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GraphicsError;

/// Shared objects looked up by name.
///
/// Entries are `Arc`s so callers can hold on to one while the registry
/// replaces it. Inserting an existing name replaces the entry.
pub struct Registry<T> {
    /// Kind of object stored, used in logs and errors.
    kind: &'static str,
    entries: HashMap<String, Arc<T>>,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Insert or replace. Returns the previous entry, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: Arc<T>) -> Option<Arc<T>> {
        let name = name.into();
        let previous = self.entries.insert(name.clone(), value);
        if previous.is_some() {
            log::debug!("Replaced {} '{}'", self.kind, name);
        } else {
            log::debug!("Registered {} '{}'", self.kind, name);
        }
        previous
    }

    /// Look up an entry, logging a warning on a miss.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        let entry = self.entries.get(name).cloned();
        if entry.is_none() {
            log::warn!("{} '{}' not found", self.kind, name);
        }
        entry
    }

    /// Look up an entry that must exist.
    pub fn get_required(&self, name: &str) -> Result<Arc<T>, GraphicsError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| GraphicsError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<T>> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in arbitrary order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("len", &self.entries.len())
            .finish()
    }
}
