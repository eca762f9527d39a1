use core::{fmt, pin::Pin};

use crate::{same_link, AvlTree, BsTree, Link, Links, TreeNode};

/// A cursor over a [`BsTree`] or [`AvlTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first. The ghost doubles as the end position: two cursors compare equal iff
/// they point at the same element, and every cursor at the ghost equals every other.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree BsTree<T>,
    ptr: Link<T>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree BsTree<T>, ptr: Link<T>) -> Cursor<'tree, T> {
        Cursor { tree, ptr }
    }

    /// Returns `true` if the cursor points to the "ghost" non-element.
    pub fn is_end(&self) -> bool {
        self.ptr.is_none()
    }

    /// Moves the cursor to the next element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the first
    /// element. If it is pointing to the last element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        self.ptr = match self.ptr {
            Some(p) => unsafe { self.tree.successor_raw(p) },
            None => self.tree.first_raw(),
        };
    }

    /// Moves the cursor to the previous element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the last
    /// element. If it is pointing to the first element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        self.ptr = match self.ptr {
            Some(p) => unsafe { self.tree.predecessor_raw(p) },
            None => self.tree.last_raw(),
        };
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&'tree T> {
        // SAFETY: the tree is borrowed for `'tree`, so the node cannot be unlinked or freed.
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&'tree T> {
        let mut next = self.clone();
        next.move_next();
        next.get()
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        let mut prev = self.clone();
        prev.move_prev();
        prev.get()
    }
}

impl<T> Clone for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        Cursor {
            tree: self.tree,
            ptr: self.ptr,
        }
    }
}

impl<T> PartialEq for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn eq(&self, other: &Self) -> bool {
        same_link(self.ptr, other.ptr)
    }
}

impl<T> Eq for Cursor<'_, T> where T: TreeNode<Links<T>> + ?Sized {}

impl<T> fmt::Debug for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor")
            .field(&self.get().map(|item| item.key()))
            .finish()
    }
}

/// A cursor over an [`AvlTree`] which supports editing operations.
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    ptr: Link<T>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree mut AvlTree<T>, ptr: Link<T>) -> CursorMut<'tree, T> {
        CursorMut { tree, ptr }
    }

    /// Returns a read-only cursor pointing to the current element.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor::new(&self.tree.raw, self.ptr)
    }

    /// Moves the cursor to the next element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the first
    /// element. If it is pointing to the last element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        self.ptr = match self.ptr {
            Some(p) => unsafe { self.tree.raw.successor_raw(p) },
            None => self.tree.raw.first_raw(),
        };
    }

    /// Moves the cursor to the previous element of the tree.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the last
    /// element. If it is pointing to the first element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        self.ptr = match self.ptr {
            Some(p) => unsafe { self.tree.raw.predecessor_raw(p) },
            None => self.tree.raw.last_raw(),
        };
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    /// Returns a pinned mutable reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    ///
    /// # Safety
    ///
    /// The caller must ensure that modifications to the returned value do not violate the
    /// invariants of the tree. In particular, the result of comparisons between the key of the
    /// returned item and the keys of other items in the tree must not change.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        self.ptr
            .map(|mut p| unsafe { Pin::new_unchecked(p.as_mut()) })
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&T> {
        self.as_cursor().peek_next()
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&T> {
        self.as_cursor().peek_prev()
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the next element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        self.move_next();

        // Removal rewires links but never moves or frees other nodes, so the new position stays
        // valid.
        Some(unsafe { self.tree.remove_at(remove) })
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the previous element. If the cursor
    /// is pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        let remove = self.ptr?;

        self.move_prev();

        Some(unsafe { self.tree.remove_at(remove) })
    }
}
