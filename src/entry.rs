use core::{borrow::Borrow, pin::Pin, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

/// A view into a single entry in an [`AvlTree`], which may be either vacant or occupied.
pub enum Entry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    Vacant(VacantEntry<'tree, 'key, T, Q>),
    Occupied(OccupiedEntry<'tree, T>),
}

impl<'tree, 'key, T, Q> Entry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    // The caller must ensure that `key` belongs in the `dir` child slot of `parent`, which is
    // empty, or that the tree is empty and `parent` is `None`.
    pub(crate) unsafe fn vacant(
        tree: &'tree mut AvlTree<T>,
        key: &'key Q,
        parent: Link<T>,
        dir: Dir,
    ) -> Self {
        Entry::Vacant(VacantEntry {
            tree,
            key,
            parent,
            dir,
        })
    }

    // The caller must ensure that `node` is an element of `tree`.
    pub(crate) unsafe fn occupied(tree: &'tree mut AvlTree<T>, node: NonNull<T>) -> Self {
        Entry::Occupied(OccupiedEntry { tree, node })
    }

    /// Returns `true` if the entry holds an item.
    pub fn is_occupied(&self) -> bool {
        matches!(self, Entry::Occupied(_))
    }
}

pub struct VacantEntry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    key: &'key Q,
    parent: Link<T>,
    dir: Dir,
}

impl<'tree, 'key, T, Q> VacantEntry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    /// Returns the key that was used to look up this entry.
    pub fn key(&self) -> &'key Q {
        self.key
    }

    /// Inserts `item` at the key associated with this entry.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the key returned by `item.key()` is equal to the key used to
    /// retrieve this entry.
    pub unsafe fn insert(self, item: T::Handle) -> Pin<&'tree mut T> {
        let mut ptr = T::into_ptr(item);

        unsafe {
            debug_assert!(
                Borrow::<Q>::borrow(ptr.as_ref().key()) == self.key,
                "item key must match the entry key"
            );

            self.tree.insert_at(self.parent, self.dir, ptr);

            Pin::new_unchecked(ptr.as_mut())
        }
    }
}

pub struct OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    node: NonNull<T>,
}

impl<'tree, T> OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a reference to the item in the entry.
    pub fn get(&self) -> &T {
        // SAFETY: `self.tree` is mutably borrowed for `'tree`
        unsafe { self.node.as_ref() }
    }

    /// Returns a pinned mutable reference to the item in the entry.
    ///
    /// Pinning keeps the links in place; the key must still not be modified.
    pub fn get_mut(&mut self) -> Pin<&mut T> {
        // SAFETY: `self.tree` is mutably borrowed, and `self.node` is guaranteed pinned by
        // contract with `Linked`.
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Converts the entry into a pinned mutable reference to its item, bound to the tree borrow.
    pub fn into_mut(mut self) -> Pin<&'tree mut T> {
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Inserts a new item into the entry, returning the previous item.
    ///
    /// The new item takes over the exact position and balance factor of the old one, so the shape
    /// of the tree does not change.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `item`'s key is equivalent to the key of the existing item.
    pub unsafe fn insert(&mut self, item: T::Handle) -> T::Handle {
        let new_ptr = T::into_ptr(item);
        let old_ptr = self.node;

        // Point this entry at the new item.
        self.node = new_ptr;

        unsafe { self.tree.raw.replace_node(old_ptr, new_ptr) }
    }

    /// Removes and returns the item pointed to by this entry.
    pub fn remove(self) -> T::Handle {
        unsafe { self.tree.remove_at(self.node) }
    }
}
