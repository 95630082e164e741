//! Fixed-size pools for short-lived bodies (dust, planets).
//!
//! Everything is created up front. `acquire` moves an item from storage to
//! the active set, `release` moves it back. The pool never grows: an empty
//! storage makes `acquire` return `None` and the caller skips the spawn.

use crate::entity::EntityKey;
use std::collections::BTreeMap;

pub trait Poolable {
    fn key(&self) -> &EntityKey;
    fn set_key(&mut self, key: EntityKey);
    /// Reset to the state of a freshly created item.
    fn recycle(&mut self);
    /// A reserved stored item is skipped by `acquire`.
    fn is_reserved(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct Pool<T> {
    storage: Vec<T>,
    active: BTreeMap<EntityKey, T>,
    created: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn new(capacity: usize, mut make: impl FnMut(usize) -> T) -> Self {
        Self {
            storage: (0..capacity).map(&mut make).collect(),
            active: BTreeMap::new(),
            created: capacity,
        }
    }

    /// Take the most recently stored non-reserved item, let `configure`
    /// set it up (it may change the key) and activate it.
    ///
    /// Returns `None` when nothing is available or the configured key is
    /// already active.
    pub fn acquire(&mut self, configure: impl FnOnce(&mut T)) -> Option<&mut T> {
        let idx = self.storage.iter().rposition(|item| !item.is_reserved())?;
        let mut item = self.storage.remove(idx);
        configure(&mut item);
        let key = item.key().clone();
        if self.active.contains_key(&key) {
            tracing::warn!("Pool acquire rejected duplicate key {}", key);
            item.recycle();
            self.storage.push(item);
            return None;
        }
        Some(self.active.entry(key).or_insert(item))
    }

    /// Recycle and store the active item `key`.
    pub fn release(&mut self, key: &EntityKey) -> bool {
        self.release_with(key, T::recycle)
    }

    /// Store the active item `key`, running `finish` instead of `recycle`.
    /// Used when the item stays reserved while it animates out.
    pub fn release_with(&mut self, key: &EntityKey, finish: impl FnOnce(&mut T)) -> bool {
        match self.active.remove(key) {
            Some(mut item) => {
                finish(&mut item);
                self.storage.push(item);
                true
            }
            None => false,
        }
    }

    /// Release every active item and clear reservations in storage.
    pub fn erase_all(&mut self) -> Vec<EntityKey> {
        let keys: Vec<EntityKey> = self.active.keys().cloned().collect();
        for key in &keys {
            self.release(key);
        }
        for item in self.storage.iter_mut().filter(|i| i.is_reserved()) {
            item.recycle();
        }
        keys
    }

    pub fn get(&self, key: &EntityKey) -> Option<&T> {
        self.active.get(key)
    }

    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut T> {
        self.active.get_mut(key)
    }

    /// A stored (released) item, e.g. one still animating out.
    pub fn stored_mut(&mut self, key: &EntityKey) -> Option<&mut T> {
        self.storage.iter_mut().find(|item| item.key() == key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.active.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.active.values_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.active.keys()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    /// Stored items `acquire` could hand out right now.
    pub fn available(&self) -> usize {
        self.storage.iter().filter(|i| !i.is_reserved()).count()
    }

    pub fn total_created(&self) -> usize {
        self.created
    }
}
