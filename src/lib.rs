//! Intrusive binary search trees: a plain (unbalanced) BST and an AVL tree.
//!
//! Nodes embed their own [`Links`] and are handed to the tree through
//! [`cordyceps::Linked`] handles. The tree owns every linked node until it is removed, and node
//! storage is never moved while linked: structural changes only rewire links.
//!
//! [`AvlMap`] is an owning ordered map built on top of [`AvlTree`].

// Conventions used in comments:
// - The parent of a node `x` is denoted `p(x)`, and its grandparent `g(x)`.
// - `h(x)` is the height of the subtree rooted at `x`; a missing subtree has height -1.
// - The balance factor of `x` is `b(x) = h(right(x)) - h(left(x))`.
//
// The AVL invariant is that `b(x) ∈ {-1, 0, 1}` for every node `x` whenever no operation is in
// progress. Balance factors are maintained incrementally: insertion and removal report which side
// of a node changed height, and the fix-up loops adjust `b` on the way up.
//
// The plain BST uses the same `Links` and keeps every balance factor at 0.

use core::{cell::UnsafeCell, fmt, marker::PhantomPinned, mem, ops::Not, ptr::NonNull};

use cordyceps::Linked;

pub mod avl;
pub mod bst;
mod cursor;
mod debug;
mod entry;
mod error;
mod iter;
pub mod map;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use avl::AvlTree;
pub use bst::BsTree;
pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use error::{Error, Result};
pub use iter::Iter;
pub use map::AvlMap;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// The links embedded in every tree node.
///
/// A node must not be moved while it is linked into a tree.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The change in balance factor when the subtree on this side grows by one level.
    #[inline]
    pub(crate) const fn delta(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

pub(crate) type Link<T> = Option<NonNull<T>>;

// Nodes are compared by address only; the metadata of a wide pointer is ignored.
#[inline]
pub(crate) fn same_node<T: ?Sized>(a: NonNull<T>, b: NonNull<T>) -> bool {
    core::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

#[inline]
pub(crate) fn same_link<T: ?Sized>(a: Link<T>, b: Link<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_node(a, b),
        (a, b) => a.is_none() && b.is_none(),
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    pub(crate) fn has_two_children(&self) -> bool {
        self.left().is_some() && self.right().is_some()
    }

    #[inline]
    pub(crate) fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    pub(crate) fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    pub(crate) fn children(&self) -> [Link<T>; 2] {
        unsafe { (*self.inner.get()).children }
    }

    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    pub(crate) fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    pub(crate) fn set_children(&mut self, children: [Link<T>; 2]) -> [Link<T>; 2] {
        mem::replace(&mut self.inner.get_mut().children, children)
    }

    #[inline]
    pub(crate) fn set_balance(&mut self, balance: i8) -> i8 {
        mem::replace(&mut self.inner.get_mut().balance, balance)
    }

    /// Resets the links to the unlinked state.
    #[inline]
    pub(crate) fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
