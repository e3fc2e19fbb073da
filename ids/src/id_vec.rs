//! [`Vec`] wrapper with [`Id`] indexing.
use core::{
    fmt::{self, Debug},
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use crate::{Id, IdRange};

/// [`Vec`] wrapper, representing a collection that maps `K` keys to `V` values.
///
/// It has entries `(k, v)` with `v` being the item at position [`k.id_index()`][Id::id_index] of
/// the wrapped vector. This means the keys always span a contiguous range of ids starting at
/// [`K::MIN_ID`][Id::MIN_ID], having index `0`.
///
/// All entries have distinct and valid keys. Depending on the used id type, this limits the
/// maximum allowed length of the wrapped vector.
pub struct IdVec<K, V> {
    // invariant: `values.len() <= K::MAX_ID_INDEX.saturating_add(1)`
    values: Vec<V>,
    _phantom: PhantomData<K>,
}

impl<K: Id, V: Clone> Clone for IdVec<K, V> {
    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<K: Id, V> Default for IdVec<K, V> {
    #[inline(always)]
    fn default() -> Self {
        Self {
            values: Default::default(),
            _phantom: PhantomData,
        }
    }
}

impl<K: Id, V> IdVec<K, V> {
    /// Creates an `IdVec` from a vector of values.
    ///
    /// # Panics
    ///
    /// Panics when `K` cannot index the full length of the vector.
    #[inline]
    #[track_caller]
    pub fn from_vec(vec: Vec<V>) -> Self {
        assert!(vec.len() <= K::MAX_ID_INDEX.saturating_add(1));
        Self {
            values: vec,
            _phantom: PhantomData,
        }
    }

    /// Creates an `IdVec` with `len` entries, all set to clones of `value`.
    #[inline]
    #[track_caller]
    pub fn from_elem(value: V, len: usize) -> Self
    where
        V: Clone,
    {
        Self::from_vec(vec![value; len])
    }

    /// Returns the values as a slice.
    #[inline(always)]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Returns the keys as a contiguous range of ids.
    #[inline(always)]
    pub fn keys(&self) -> IdRange<K> {
        IdRange::from_index_range(0..self.values.len())
    }

    /// Returns the number of entries in the collection.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no entries in the collection.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the key that the next [`push`][Self::push] will use.
    #[inline(always)]
    #[track_caller]
    pub fn next_unused_key(&self) -> K {
        K::from_id_index(self.values.len())
    }

    /// Appends a value, returning its newly assigned key.
    ///
    /// # Panics
    ///
    /// Panics when the key space of `K` is exhausted.
    #[inline]
    #[track_caller]
    pub fn push(&mut self, value: V) -> K {
        let key = self.next_unused_key();
        self.values.push(value);
        key
    }

    /// Returns a reference to the value associated with the given key.
    ///
    /// Returns `None` when the key is out-of-bounds.
    #[inline(always)]
    pub fn get(&self, key: K) -> Option<&V> {
        self.values.get(key.id_index())
    }

    /// Swaps the values associated with the two given keys.
    #[inline(always)]
    pub fn swap(&mut self, key_a: K, key_b: K) {
        self.values.swap(key_a.id_index(), key_b.id_index())
    }

    /// Returns an iterator over all entries using value references.
    #[inline(always)]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (K, &V)> + ExactSizeIterator + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (K::from_id_index(index), value))
    }
}

impl<K: Id, V> Index<K> for IdVec<K, V> {
    type Output = V;

    #[inline(always)]
    fn index(&self, index: K) -> &Self::Output {
        &self.values[index.id_index()]
    }
}

impl<K: Id, V> IndexMut<K> for IdVec<K, V> {
    #[inline(always)]
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.values[index.id_index()]
    }
}

impl<K: Id, V> Index<IdRange<K>> for IdVec<K, V> {
    type Output = [V];

    #[inline(always)]
    fn index(&self, index: IdRange<K>) -> &Self::Output {
        &self.values[index.indices()]
    }
}

impl<K: Id, V> IndexMut<IdRange<K>> for IdVec<K, V> {
    #[inline(always)]
    fn index_mut(&mut self, index: IdRange<K>) -> &mut Self::Output {
        &mut self.values[index.indices()]
    }
}

impl<K: Id, V: PartialEq> PartialEq for IdVec<K, V> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<K: Id, V: Eq> Eq for IdVec<K, V> {}

impl<K: Id, V: Debug> Debug for IdVec<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Id, V> FromIterator<V> for IdVec<K, V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self::from_vec(Vec::from_iter(iter))
    }
}
