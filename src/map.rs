extern crate alloc;

use alloc::boxed::Box;
use core::{
    borrow::Borrow,
    fmt,
    marker::PhantomPinned,
    mem,
    ops::{Index, IndexMut},
    ptr::NonNull,
};

use cordyceps::Linked;

use crate::{bst::Slot, AvlTree, Error, Links, Result, TreeNode};

/// An ordered map based on an [AVL tree].
///
/// Inserting a key that is already present overwrites its value in place; keys are unique.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlMap<K: Ord + fmt::Debug, V> {
    tree: AvlTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

impl<K, V> MapNode<K, V> {
    fn new(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord + fmt::Debug, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord + fmt::Debug, V> AvlMap<K, V> {
    /// Creates a new, empty `AvlMap`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .get_mut(key)
            // SAFETY: Pinning is not structural for `node.value`.
            .map(|node| unsafe { &mut node.get_unchecked_mut().value })
    }

    /// Returns a reference to the value associated with `key`, or [`Error::KeyNotFound`].
    pub fn at<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns a mutable reference to the value associated with `key`, or
    /// [`Error::KeyNotFound`].
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the key was already present, its value is overwritten in place and the old value is
    /// returned. The tree shape is only changed when a new key is added.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.raw.find_slot(&key) {
            Slot::Occupied(mut node) => {
                // SAFETY: the tree is mutably borrowed, and the value is not part of the links
                // or the key.
                let node = unsafe { node.as_mut() };
                Some(mem::replace(&mut node.value, value))
            }

            Slot::Vacant { parent, dir } => {
                let ptr = MapNode::into_ptr(MapNode::new(key, value));
                unsafe { self.tree.insert_at(parent, dir, ptr) };
                None
            }
        }
    }

    /// Returns a mutable reference to the value associated with `key`, inserting the result of
    /// `default` first if the key is absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let mut ptr = match self.tree.raw.find_slot(&key) {
            Slot::Occupied(node) => node,

            Slot::Vacant { parent, dir } => {
                let ptr = MapNode::into_ptr(MapNode::new(key, default()));
                unsafe { self.tree.insert_at(parent, dir, ptr) };
                ptr
            }
        };

        unsafe { &mut ptr.as_mut().value }
    }

    /// Returns a cursor pointing to the entry for `key`, or to the end if there is none.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor {
            inner: self.tree.find(key),
        }
    }

    /// Returns a cursor pointing to the entry with the minimum key.
    ///
    /// For an empty map this equals [`cursor_end`](Self::cursor_end).
    pub fn cursor_first(&self) -> Cursor<'_, K, V> {
        Cursor {
            inner: self.tree.cursor_first(),
        }
    }

    /// Returns a cursor pointing past the last entry.
    pub fn cursor_end(&self) -> Cursor<'_, K, V> {
        Cursor {
            inner: self.tree.cursor_end(),
        }
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Removes the value associated with `key` from the map.
    ///
    /// Removing a key that is not present does nothing and returns `None`.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|node| node.value)
    }

    /// Returns an iterator over the entries of the map, sorted by key.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Returns an iterator over the keys of the map, in sorted order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Returns an iterator over the values of the map, sorted by key.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<K, V, Q> Index<&Q> for AvlMap<K, V>
where
    K: Borrow<Q> + Ord + fmt::Debug,
    Q: Ord + ?Sized,
{
    type Output = V;

    /// Returns a reference to the value associated with `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the map.
    fn index(&self, key: &Q) -> &V {
        self.at(key).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<K, V, Q> IndexMut<&Q> for AvlMap<K, V>
where
    K: Borrow<Q> + Ord + fmt::Debug,
    Q: Ord + ?Sized,
{
    /// Returns a mutable reference to the value associated with `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the map.
    fn index_mut(&mut self, key: &Q) -> &mut V {
        self.at_mut(key).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<K: Ord + fmt::Debug, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + fmt::Debug, V> Extend<(K, V)> for AvlMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord + fmt::Debug, V> FromIterator<(K, V)> for AvlMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AvlMap::new();
        map.extend(iter);
        map
    }
}

impl<'a, K: Ord + fmt::Debug, V> IntoIterator for &'a AvlMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the entries of an [`AvlMap`], sorted by key.
pub struct Iter<'a, K: Ord + fmt::Debug, V> {
    inner: crate::Iter<'a, MapNode<K, V>>,
}

impl<'a, K: Ord + fmt::Debug, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| (&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Ord + fmt::Debug, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|node| (&node.key, &node.value))
    }
}

impl<K: Ord + fmt::Debug, V> ExactSizeIterator for Iter<'_, K, V> {}

/// A cursor over the entries of an [`AvlMap`].
///
/// A cursor points at an entry or at the end position. Two cursors are equal iff they point at
/// the same entry, or are both at the end.
pub struct Cursor<'a, K: Ord + fmt::Debug, V> {
    inner: crate::Cursor<'a, MapNode<K, V>>,
}

impl<'a, K: Ord + fmt::Debug, V> Cursor<'a, K, V> {
    /// Returns `true` if the cursor is at the end position.
    pub fn is_end(&self) -> bool {
        self.inner.is_end()
    }

    /// Returns the entry the cursor points at, or `None` at the end position.
    pub fn key_value(&self) -> Option<(&'a K, &'a V)> {
        self.inner.get().map(|node| (&node.key, &node.value))
    }

    /// Returns the key the cursor points at.
    pub fn key(&self) -> Option<&'a K> {
        self.key_value().map(|(k, _)| k)
    }

    /// Returns the value the cursor points at.
    pub fn value(&self) -> Option<&'a V> {
        self.key_value().map(|(_, v)| v)
    }

    /// Advances to the entry with the next larger key, or to the end position after the last
    /// entry. From the end position, moves to the first entry.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves to the entry with the next smaller key, or to the end position before the first
    /// entry. From the end position, moves to the last entry.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }
}

impl<K: Ord + fmt::Debug, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        Cursor {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Ord + fmt::Debug, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K: Ord + fmt::Debug, V> Eq for Cursor<'_, K, V> {}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.key_value()).finish()
    }
}
