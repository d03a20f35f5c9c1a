//! Collections

extern crate unsafe_any;

pub use unsafe_any::UnsafeAnyExt;

const VACANT: usize = usize::MAX;

/// Map from small integer keys to items, stored packed
///
/// `slots[key]` is the position of the key's item in `items`, and `owners[pos]` the key that owns
/// the item at `pos`. Items stay in insertion order until a removal moves the last one into the hole
#[derive(Debug, Clone)]
pub struct SparseSet<T> {
    slots: Vec<usize>,
    owners: Vec<usize>,
    items: Vec<T>,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        SparseSet { slots: Vec::new(), owners: Vec::new(), items: Vec::new() }
    }
}

impl<T> SparseSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: usize) -> bool {
        self.position(key).is_some()
    }

    /// Stores `item` under `key`, handing back the item it replaced
    pub fn insert_with(&mut self, key: usize, item: T) -> Option<T> {
        if let Some(pos) = self.position(key) {
            return Some(std::mem::replace(&mut self.items[pos], item))
        }

        if key >= self.slots.len() {
            self.slots.resize(key + 1, VACANT);
        }
        self.slots[key] = self.items.len();
        self.owners.push(key);
        self.items.push(item);
        None
    }

    pub fn remove(&mut self, key: usize) -> Option<T> {
        let pos = self.position(key)?;
        self.slots[key] = VACANT;

        self.owners.swap_remove(pos);
        let item = self.items.swap_remove(pos);

        if let Some(&moved) = self.owners.get(pos) {
            self.slots[moved] = pos;
        }
        Some(item)
    }

    /// One past the largest key ever stored
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = VACANT);
        self.owners.clear();
        self.items.clear();
    }

    pub fn get(&self, key: usize) -> Option<&T> {
        let pos = self.position(key)?;
        self.items.get(pos)
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        let pos = self.position(key)?;
        self.items.get_mut(pos)
    }

    /// Keys in packed order
    pub fn keys(&self) -> &[usize] {
        &self.owners
    }

    pub fn kv_pairs(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.owners.iter().copied().zip(self.items.iter())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    fn position(&self, key: usize) -> Option<usize> {
        match self.slots.get(key) {
            Some(&pos) if pos != VACANT && self.owners.get(pos) == Some(&key) => Some(pos),
            _ => None,
        }
    }
}

impl<'a, T> IntoIterator for &'a SparseSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut SparseSet<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
