use std::hash::Hash;
use std::ops::Index;

use hashbrown::HashMap;

use crate::is_debug;

pub trait KeyIndexKey<K> {
    fn key(&self) -> &K;
}

/// Insertion-ordered vector with O(1) lookup by key.
#[derive(Debug, Clone)]
pub struct KeyIndexVec<K: Copy + Eq + Hash, V: KeyIndexKey<K>> {
    items: Vec<V>,
    idx_by_key: HashMap<K, usize>,
}

impl<K, V> Default for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    fn default() -> Self {
        Self {
            items: Vec::new(),
            idx_by_key: HashMap::new(),
        }
    }
}

impl<K, V> KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    /// Appends `v`. A value with an already present key replaces the old one in place.
    pub fn push(&mut self, v: V) {
        let key = *v.key();
        match self.idx_by_key.get(&key) {
            Some(&idx) => self.items[idx] = v,
            None => {
                self.idx_by_key.insert(key, self.items.len());
                self.items.push(v);
            }
        }
    }

    pub fn remove_by_key(&mut self, key: &K) -> Option<V> {
        let idx = self.idx_by_key.remove(key)?;
        let removed = self.items.remove(idx);
        assert!(*removed.key() == *key);

        self.reindex_from(idx);

        Some(removed)
    }

    /// Removes every item matching `remove` and returns the removed items in order.
    pub fn extract_if(&mut self, mut remove: impl FnMut(&V) -> bool) -> Vec<V> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if remove(&item) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;

        if !removed.is_empty() {
            self.idx_by_key.clear();
            self.reindex_from(0);
        }

        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.idx_by_key.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, V> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        assert_eq!(self.items.len(), self.idx_by_key.len());
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        assert_eq!(self.items.len(), self.idx_by_key.len());
        self.items.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&V> {
        self.items.get(idx)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.idx_by_key.contains_key(key)
    }

    pub fn index_of_key(&self, key: &K) -> Option<usize> {
        self.idx_by_key.get(key).copied()
    }

    pub fn by_key(&self, key: &K) -> Option<&V> {
        self.index_of_key(key).map(|idx| &self.items[idx])
    }

    pub fn by_key_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.index_of_key(key)?;
        Some(&mut self.items[idx])
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, item) in self.items.iter().enumerate().skip(start) {
            self.idx_by_key.insert(*item.key(), pos);
        }

        if is_debug() {
            assert_eq!(self.items.len(), self.idx_by_key.len());
            for (idx, v) in self.items.iter().enumerate() {
                assert_eq!(Some(idx), self.index_of_key(v.key()));
            }
        }
    }
}

impl<K, V> Index<usize> for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    type Output = V;

    fn index(&self, idx: usize) -> &Self::Output {
        assert!(idx < self.items.len());
        &self.items[idx]
    }
}

impl<'a, K, V> IntoIterator for &'a KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
