use core::{borrow::Borrow, fmt, pin::Pin, ptr::NonNull};

use crate::{
    bst::{BsTree, Slot},
    cursor::{Cursor, CursorMut},
    entry::Entry,
    iter::Iter,
    Dir, Link, Links, TreeNode,
};

/// An intrusive AVL tree.
///
/// Every node carries a balance factor `b(x) = h(right(x)) - h(left(x))` which is kept in
/// `{-1, 0, 1}` between operations, bounding the height of the tree to about `1.44 * log2(n + 2)`.
///
/// The tree is built on the same link structure and primitives as [`BsTree`]; only insertion and
/// removal differ, each followed by a bottom-up fix-up of the balance factors.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) raw: BsTree<T>,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree {
            raw: BsTree::new(),
        }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns the number of levels in the tree. An empty tree has height 0.
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Returns the underlying binary search tree, for read-only inspection.
    pub fn as_bst(&self) -> &BsTree<T> {
        &self.raw
    }

    /// Panics if the tree is not a valid binary search tree, or if any balance factor is outside
    /// `{-1, 0, 1}` or disagrees with the actual heights of the node's subtrees.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.raw.assert_invariants();

        if let Some(root) = self.raw.root {
            unsafe { self.assert_balance_at(root) };
        }
    }

    // Returns the height of the subtree rooted at `node`.
    unsafe fn assert_balance_at(&self, node: NonNull<T>) -> isize {
        unsafe {
            let links = self.raw.links(node);
            let height = |child: Link<T>| child.map(|c| self.assert_balance_at(c)).unwrap_or(-1);

            let left = height(links.left());
            let right = height(links.right());
            let balance = links.balance();

            assert!(
                (-1..=1).contains(&balance),
                "balance factor {balance} of {:?} is out of range",
                node.as_ref().key(),
            );
            assert_eq!(
                isize::from(balance),
                right - left,
                "balance factor of {:?} does not match subtree heights",
                node.as_ref().key(),
            );

            1 + left.max(right)
        }
    }

    /// Returns a reference to the item corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.raw.get(key)
    }

    /// Returns a pinned mutable reference to the item corresponding to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.raw.get_mut(key)
    }

    /// Returns `true` if the tree contains an item with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.raw.contains_key(key)
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.raw.first()
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.raw.last()
    }

    /// Returns an iterator over the items of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.raw.iter()
    }

    /// Returns a cursor pointing to the minimum element, or to the end if the tree is empty.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        self.raw.cursor_first()
    }

    /// Returns a cursor pointing to the maximum element, or to the end if the tree is empty.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        self.raw.cursor_last()
    }

    /// Returns a cursor pointing to the "ghost" end non-element.
    pub fn cursor_end(&self) -> Cursor<'_, T> {
        self.raw.cursor_end()
    }

    /// Returns an editing cursor pointing to the minimum element.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        let first = self.raw.first_raw();
        CursorMut::new(self, first)
    }

    /// Returns an editing cursor pointing to the maximum element.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        let last = self.raw.last_raw();
        CursorMut::new(self, last)
    }

    /// Returns a cursor pointing to the item with the given key, or to the end if there is none.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.raw.find(key)
    }

    /// Returns the entry for `key`, which may be vacant or occupied.
    pub fn entry<'tree, 'key, Q>(&'tree mut self, key: &'key Q) -> Entry<'tree, 'key, T, Q>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.raw.find_slot(key) {
            Slot::Occupied(node) => unsafe { Entry::occupied(self, node) },
            Slot::Vacant { parent, dir } => unsafe { Entry::vacant(self, key, parent, dir) },
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with the same key, `item` takes over its position and the
    /// previous item is returned; the shape of the tree is unchanged.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);
        let key = unsafe { ptr.as_ref().key() };

        match self.raw.find_slot(key) {
            Slot::Occupied(old) => Some(unsafe { self.raw.replace_node(old, ptr) }),
            Slot::Vacant { parent, dir } => {
                unsafe { self.insert_at(parent, dir, ptr) };
                None
            }
        }
    }

    // Attaches `node` as the `dir` child of `parent` (or as the root) and restores the AVL
    // invariant.
    pub(crate) unsafe fn insert_at(&mut self, parent: Link<T>, dir: Dir, node: NonNull<T>) {
        unsafe {
            self.raw.attach(parent, dir, node);

            if let Some(parent) = parent {
                self.rebalance_inserted(parent, node);
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after the insertion of the leaf `node` below
    // `parent`.
    //
    // Invariants on entry:
    // - `node` is a leaf with balance 0.
    // - All other balance factors describe the tree as it was before the insertion.
    unsafe fn rebalance_inserted(&mut self, parent: NonNull<T>, node: NonNull<T>) {
        unsafe {
            let dir = self.raw.which_child(parent, node);

            // If the parent already had a child, that child is on the other side and the new leaf
            // evens it out. The height of the parent is unchanged.
            if self.raw.links(parent).balance() != 0 {
                self.raw.links_mut(parent).set_balance(0);
                return;
            }

            // Otherwise the parent was a leaf and has grown by one level.
            self.raw.links_mut(parent).set_balance(dir.delta());

            // `p` has just grown by one level through its child `n`.
            let mut n = node;
            let mut p = parent;

            while let Some(g) = self.raw.links(p).parent() {
                let side = self.raw.which_child(g, p);
                let balance = self.raw.links(g).balance() + side.delta();

                match balance {
                    // The shorter side of `g` caught up. `h(g)` is unchanged.
                    0 => {
                        self.raw.links_mut(g).set_balance(0);
                        return;
                    }

                    // `g` was even and has grown by one level. Ascend.
                    -1 | 1 => {
                        self.raw.links_mut(g).set_balance(balance);
                        n = p;
                        p = g;
                    }

                    // `g` is two levels heavier on `side`. One rotation brings `h(g)` back to its
                    // height before the insertion, so the ancestors are unaffected.
                    _ => {
                        self.rebalance_heavy_insert(g, p, n, side);
                        return;
                    }
                }
            }
        }
    }

    // Restores balance at `g`, which is heavy by two on `side` after its child `p` grew through
    // its child `n`.
    unsafe fn rebalance_heavy_insert(
        &mut self,
        g: NonNull<T>,
        p: NonNull<T>,
        n: NonNull<T>,
        side: Dir,
    ) {
        unsafe {
            let d = side.delta();

            if self.raw.which_child(p, n) == side {
                // Zig-zig: rotate `g` away from the heavy side.
                tracing::trace!(key = ?g.as_ref().key(), ?side, "insert: single rotation");

                self.rotate(g, !side);
                self.raw.links_mut(p).set_balance(0);
                self.raw.links_mut(g).set_balance(0);
            } else {
                // Zig-zag: lift `n` above both `p` and `g`.
                tracing::trace!(key = ?g.as_ref().key(), ?side, "insert: double rotation");

                let (p_balance, g_balance) =
                    Self::double_rotation_balances(self.raw.links(n).balance(), d);

                self.rotate(p, side);
                self.rotate(g, !side);
                self.raw.links_mut(p).set_balance(p_balance);
                self.raw.links_mut(g).set_balance(g_balance);
                self.raw.links_mut(n).set_balance(0);
            }
        }
    }

    // Computes the final balance factors of the lower and upper nodes of a double rotation.
    //
    // `pivot_balance` is the balance of the node lifted to the top, and `d` is the delta of the side
    // on which the upper node was heavy. The lower node receives the pivot's `d`-side subtree and
    // the upper node receives its `-d`-side subtree; whichever gets the shorter one leans away
    // from it.
    fn double_rotation_balances(pivot_balance: i8, d: i8) -> (i8, i8) {
        if pivot_balance == d {
            (0, -d)
        } else if pivot_balance == 0 {
            (0, 0)
        } else {
            (d, 0)
        }
    }

    /// Removes the item with the given key from the tree and returns it.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.raw.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.raw.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.raw.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// A node with two children first trades places, and balance factors, with its in-order
    /// predecessor. It then has at most one child and is spliced out, after which the balance
    /// factors are repaired from its former parent upward.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            if self.raw.links(node).has_two_children() {
                let pred = self
                    .raw
                    .predecessor_raw(node)
                    .expect("node with a left child must have a predecessor");
                self.raw.swap_nodes(node, pred);
            }

            if let Some((parent, dir)) = self.raw.splice(node) {
                self.rebalance_removed(parent, dir);
            }

            T::from_ptr(node)
        }
    }

    // Performs a bottom-up rebalance after the `dir` subtree of `parent` lost one level.
    //
    // Unlike insertion, a rotation does not always absorb the height loss, so this may run all
    // the way to the root.
    unsafe fn rebalance_removed(&mut self, parent: NonNull<T>, dir: Dir) {
        let mut x = parent;
        let mut shrunk = dir;

        unsafe {
            loop {
                // Record where `x` hangs before any rotation moves it.
                let up = self.raw.links(x).parent();
                let up_dir = up.map(|up| self.raw.which_child(up, x));

                let balance = self.raw.links(x).balance() - shrunk.delta();

                match balance {
                    // `x` was even. `h(x)` is unchanged.
                    -1 | 1 => {
                        self.raw.links_mut(x).set_balance(balance);
                        return;
                    }

                    // The taller side of `x` was cut down. `h(x)` shrank by one; keep going.
                    0 => {
                        self.raw.links_mut(x).set_balance(0);
                    }

                    // `x` is two levels heavier on the side opposite `shrunk`.
                    _ => {
                        if !self.rebalance_heavy_remove(x, !shrunk) {
                            return;
                        }
                    }
                }

                match (up, up_dir) {
                    (Some(up), Some(up_dir)) => {
                        x = up;
                        shrunk = up_dir;
                    }
                    _ => return,
                }
            }
        }
    }

    // Restores balance at `x`, which is heavy by two on `heavy`.
    //
    // Returns `true` if the rebalanced subtree is one level shorter than it was before the
    // removal, in which case the fix-up must continue upward.
    unsafe fn rebalance_heavy_remove(&mut self, x: NonNull<T>, heavy: Dir) -> bool {
        unsafe {
            let d = heavy.delta();
            let c = self
                .raw
                .links(x)
                .child(heavy)
                .expect("heavy side of a node must have a child");
            let c_balance = self.raw.links(c).balance();

            if c_balance == d {
                // `c` is heavy on the outside: a single rotation evens both nodes out.
                tracing::trace!(key = ?x.as_ref().key(), ?heavy, "remove: single rotation");

                self.rotate(x, !heavy);
                self.raw.links_mut(x).set_balance(0);
                self.raw.links_mut(c).set_balance(0);
                true
            } else if c_balance == 0 {
                // `c` is even: after a single rotation the subtree keeps its height.
                tracing::trace!(
                    key = ?x.as_ref().key(),
                    ?heavy,
                    "remove: single rotation, height kept"
                );

                self.rotate(x, !heavy);
                self.raw.links_mut(x).set_balance(d);
                self.raw.links_mut(c).set_balance(-d);
                false
            } else {
                // `c` is heavy on the inside: lift its inner child above both nodes.
                tracing::trace!(key = ?x.as_ref().key(), ?heavy, "remove: double rotation");

                let g = self
                    .raw
                    .links(c)
                    .child(!heavy)
                    .expect("inside-heavy node must have an inner child");
                let (c_new, x_new) =
                    Self::double_rotation_balances(self.raw.links(g).balance(), d);

                self.rotate(c, heavy);
                self.rotate(x, !heavy);
                self.raw.links_mut(c).set_balance(c_new);
                self.raw.links_mut(x).set_balance(x_new);
                self.raw.links_mut(g).set_balance(0);
                true
            }
        }
    }

    // Rotates `pivot` down toward `dir`: its `!dir` child takes its place and `pivot` becomes that
    // child's `dir` child. The child's former `dir` subtree is reattached as the `!dir` child of
    // `pivot`.
    //
    // `Dir::Left` is a left rotation and `Dir::Right` a right rotation. Balance factors are not
    // updated.
    pub(crate) unsafe fn rotate(&mut self, pivot: NonNull<T>, dir: Dir) {
        unsafe {
            let up = self
                .raw
                .links(pivot)
                .child(!dir)
                .expect("rotation requires a child opposite the rotation direction");

            let across = self.raw.links(up).child(dir);
            self.raw.links_mut(pivot).set_child(!dir, across);
            self.raw.maybe_set_parent(across, Some(pivot));

            let parent = self.raw.links(pivot).parent();
            self.raw.replace_child_or_set_root(parent, pivot, Some(up));
            self.raw.links_mut(up).set_parent(parent);

            self.raw.links_mut(up).set_child(dir, Some(pivot));
            self.raw.links_mut(pivot).set_parent(Some(up));
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        self.raw.clear();
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}
