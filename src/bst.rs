use core::{borrow::Borrow, cmp::Ordering, fmt, pin::Pin, ptr::NonNull};

use crate::{cursor::Cursor, iter::Iter, same_link, same_node, Dir, Link, Links, TreeNode};

/// An intrusive binary search tree with no rebalancing.
///
/// Items are placed purely by key comparison, so the height of the tree depends on insertion
/// order. The structural primitives defined here (slot lookup, splicing, neighbor walks and node
/// swapping) are shared with [`AvlTree`](crate::AvlTree).
pub struct BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) root: Link<T>,
    pub(crate) len: usize,
}

/// The position of a key in a tree.
pub(crate) enum Slot<T: ?Sized> {
    /// The key is held by this node.
    Occupied(NonNull<T>),
    /// The key is absent; it belongs in the `dir` child of `parent`, or at the root if `parent` is
    /// `None`.
    Vacant { parent: Link<T>, dir: Dir },
}

impl<T> BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> BsTree<T> {
        BsTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.root.is_none();

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == (self.len == 0));
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of levels in the tree. An empty tree has height 0.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack = Vec::new();
        stack.extend(self.root.map(|root| (root, 1)));

        while let Some((node, depth)) = stack.pop() {
            height = height.max(depth);

            let children = unsafe { self.links(node).children() };
            stack.extend(children.into_iter().flatten().map(|child| (child, depth + 1)));
        }

        height
    }

    /// Returns `true` if, for every node, the heights of its two subtrees differ by at most one.
    ///
    /// This is a diagnostic: nothing in this tree keeps it balanced.
    pub fn is_balanced(&self) -> bool {
        // Post-order walk. `heights` holds the heights of finished subtrees, the right one on top.
        let mut stack: Vec<(NonNull<T>, bool)> =
            self.root.map(|root| (root, false)).into_iter().collect();
        let mut heights: Vec<isize> = Vec::new();

        while let Some((node, expanded)) = stack.pop() {
            let [left, right] = unsafe { self.links(node).children() };

            if !expanded {
                stack.push((node, true));
                stack.extend([right, left].into_iter().flatten().map(|child| (child, false)));
                continue;
            }

            let mut finished = |child: Link<T>| match child {
                Some(_) => heights.pop().expect("finished child must have a height"),
                None => -1,
            };
            let right = finished(right);
            let left = finished(left);

            if (left - right).abs() > 1 {
                return false;
            }

            heights.push(1 + left.max(right));
        }

        true
    }

    /// Panics if the link structure is not a valid binary search tree.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree must have length 0");
            return;
        };

        unsafe {
            assert!(self.links(root).parent().is_none(), "root must not have a parent");
            self.assert_links_at(root);

            // An in-order walk must visit strictly increasing keys.
            let mut count = 1;
            let mut prev = self.min_in_subtree(root);
            while let Some(next) = self.successor_raw(prev) {
                assert!(
                    prev.as_ref().key() < next.as_ref().key(),
                    "keys out of order: {:?} precedes {:?}",
                    prev.as_ref().key(),
                    next.as_ref().key(),
                );

                count += 1;
                prev = next;
            }

            assert_eq!(count, self.len, "tree length does not match node count");
        }
    }

    unsafe fn assert_links_at(&self, root: NonNull<T>) {
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            for child in unsafe { self.links(node).children() }.into_iter().flatten() {
                // Ensure child's parent link points to this node.
                let parent =
                    unsafe { self.links(child).parent() }.expect("child parent pointer not set");
                assert!(same_node(node, parent), "child parent pointer is stale");

                stack.push(child);
            }
        }
    }

    /// Returns a reference to the item corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the item corresponding to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains an item with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.find_slot(key) {
            Slot::Occupied(node) => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    // Descends from the root by key comparison until either the key or an empty child link is
    // found.
    pub(crate) fn find_slot<Q>(&self, key: &Q) -> Slot<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut parent = None;
        let mut dir = Dir::Left;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                dir = match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => Dir::Left,
                    Ordering::Equal => return Slot::Occupied(cur),
                    Ordering::Greater => Dir::Right,
                };

                parent = Some(cur);
                opt_cur = self.links(cur).child(dir);
            }
        }

        Slot::Vacant { parent, dir }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let first = self.first_raw()?;
        unsafe { Some(Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let last = self.last_raw()?;
        unsafe { Some(Pin::new_unchecked(last.as_ref())) }
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.min_in_subtree(root) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.max_in_subtree(root) })
    }

    /// Returns an iterator over the items of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing to the minimum element, or to the end if the tree is empty.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.first_raw())
    }

    /// Returns a cursor pointing to the maximum element, or to the end if the tree is empty.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.last_raw())
    }

    /// Returns a cursor pointing to the "ghost" end non-element.
    pub fn cursor_end(&self) -> Cursor<'_, T> {
        Cursor::new(self, None)
    }

    /// Returns a cursor pointing to the item with the given key, or to the end if there is none.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::new(self, self.get_raw(key))
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with the same key, `item` takes over its position and the
    /// previous item is returned.
    ///
    /// This operation completes in _O(h)_ time, where _h_ is the height of the tree.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);
        let key = unsafe { ptr.as_ref().key() };

        match self.find_slot(key) {
            Slot::Occupied(old) => Some(unsafe { self.replace_node(old, ptr) }),
            Slot::Vacant { parent, dir } => {
                unsafe { self.attach(parent, dir, ptr) };
                None
            }
        }
    }

    /// Removes the item with the given key from the tree and returns it.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// A node with two children first trades places with its in-order predecessor, which has at
    /// most one child, and is then spliced out from there.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            if self.links(node).has_two_children() {
                let pred = self
                    .predecessor_raw(node)
                    .expect("node with a left child must have a predecessor");
                self.swap_nodes(node, pred);
            }

            self.splice(node);

            T::from_ptr(node)
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        if self.root.is_some() {
            tracing::debug!(len = self.len, "clearing tree");
        }

        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node, which has no left child.
                let cur = self.min_in_subtree(cur);
                let parent = self.links(cur).parent();
                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    pub(crate) unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    pub(crate) unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    // Links `node` into the empty `dir` child slot of `parent`, or as the root.
    //
    // `node`'s links are reset first, so it enters the tree as a balanced leaf.
    pub(crate) unsafe fn attach(&mut self, parent: Link<T>, dir: Dir, node: NonNull<T>) {
        unsafe {
            let links = self.links_mut(node);
            links.clear();
            links.set_parent(parent);

            match parent {
                Some(parent) => {
                    let prev = self.links_mut(parent).set_child(dir, Some(node));
                    debug_assert!(prev.is_none(), "attach target slot must be empty");
                }
                None => {
                    debug_assert!(self.root.is_none(), "only an empty tree can take a new root");
                    self.root = Some(node);
                }
            }
        }

        self.len += 1;
    }

    // Links `new` into the exact position of `old`, including its balance factor, and unlinks
    // `old`.
    pub(crate) unsafe fn replace_node(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            let old_links = self.links(old);
            let parent = old_links.parent();
            let children = old_links.children();
            let balance = old_links.balance();

            match parent {
                Some(parent) => {
                    let dir = self.which_child(parent, old);
                    self.links_mut(parent).set_child(dir, Some(new));
                }
                None => self.root = Some(new),
            }

            for child in children.into_iter().flatten() {
                self.links_mut(child).set_parent(Some(new));
            }

            let new_links = self.links_mut(new);
            new_links.set_parent(parent);
            new_links.set_children(children);
            new_links.set_balance(balance);

            self.links_mut(old).clear();

            T::from_ptr(old)
        }
    }

    // Unlinks `node`, which must have at most one child, promoting that child into its place.
    //
    // Returns the former parent of `node` and the side of the parent it was removed from, or
    // `None` if `node` was the root.
    pub(crate) unsafe fn splice(&mut self, node: NonNull<T>) -> Option<(NonNull<T>, Dir)> {
        unsafe {
            let links = self.links(node);
            debug_assert!(!links.has_two_children(), "cannot splice a binary node");

            let parent = links.parent();
            let child = links.left().or(links.right());

            let removed_from = match parent {
                Some(parent) => {
                    let dir = self.which_child(parent, node);
                    self.links_mut(parent).set_child(dir, child);
                    Some((parent, dir))
                }
                None => {
                    self.root = child;
                    None
                }
            };

            self.maybe_set_parent(child, parent);
            self.links_mut(node).clear();
            self.len -= 1;

            removed_from
        }
    }

    // Exchanges the tree positions of `a` and `b`.
    //
    // The parent, children and balance factor of each node are traded; keys and values do not
    // move. Handles the case where one node is the direct child of the other.
    pub(crate) unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if same_node(a, b) {
            return;
        }

        unsafe {
            let a_parent = self.links(a).parent();
            let b_parent = self.links(b).parent();
            let a_dir = a_parent.map(|p| self.which_child(p, a));
            let b_dir = b_parent.map(|p| self.which_child(p, b));

            let a_children = self.links(a).children();
            let b_children = self.links(b).children();
            let a_balance = self.links(a).balance();
            let b_balance = self.links(b).balance();

            let a_links = self.links_mut(a);
            a_links.set_parent(b_parent);
            a_links.set_children(b_children);
            a_links.set_balance(b_balance);

            let b_links = self.links_mut(b);
            b_links.set_parent(a_parent);
            b_links.set_children(a_children);
            b_links.set_balance(a_balance);

            // If one node was the child of the other, the raw exchange left each of them pointing
            // at itself.
            if same_link(b_parent, Some(a)) {
                let dir = b_dir.expect("child must have a side");
                self.links_mut(a).set_parent(Some(b));
                self.links_mut(b).set_child(dir, Some(a));
            } else if same_link(a_parent, Some(b)) {
                let dir = a_dir.expect("child must have a side");
                self.links_mut(b).set_parent(Some(a));
                self.links_mut(a).set_child(dir, Some(b));
            }

            // Point the neighbors at the nodes' new positions.
            for (node, other, dir) in [(a, b, b_dir), (b, a, a_dir)] {
                for child in self.links(node).children().into_iter().flatten() {
                    self.links_mut(child).set_parent(Some(node));
                }

                match self.links(node).parent() {
                    Some(parent) if same_node(parent, other) => (),
                    Some(parent) => {
                        let dir = dir.expect("non-root node must have a side");
                        self.links_mut(parent).set_child(dir, Some(node));
                    }
                    None => self.root = Some(node),
                }
            }
        }
    }

    // Returns the `dir`-most node of the subtree rooted at `root`.
    #[inline]
    pub(crate) unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        cur
    }

    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Left) }
    }

    #[inline]
    pub(crate) unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Right) }
    }

    // Returns the in-order neighbor of `node` on the `dir` side: its predecessor for `Dir::Left`,
    // its successor for `Dir::Right`.
    //
    // If `node` has a `dir` child, this is the `!dir`-most node of that subtree. Otherwise it is the
    // first ancestor reached by climbing out of a `!dir` child.
    pub(crate) unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = self.links(node).child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            let mut cur = node;
            while let Some(parent) = self.links(cur).parent() {
                if same_link(self.links(parent).child(!dir), Some(cur)) {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    #[inline]
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    #[inline]
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    #[inline]
    pub(crate) unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of `parent`.
    #[inline]
    pub(crate) unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);
            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    #[inline]
    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if same_link(self.links(parent).left(), Some(child)) {
                Dir::Left
            } else {
                debug_assert!(
                    same_link(self.links(parent).right(), Some(child)),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }
}

impl<T> Default for BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|item| item.key())).finish()
    }
}

impl<T> Drop for BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}
