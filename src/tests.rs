extern crate std;

use std::{ops::Range, prelude::v1::*};

use cordyceps::Linked;
use proptest::prelude::*;
use rstest::rstest;

use crate::model::{self, TestNode};

use super::*;

fn avl_from(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn bst_from(keys: &[u32]) -> BsTree<TestNode> {
    let mut tree: BsTree<TestNode> = BsTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn node(tree: &BsTree<TestNode>, key: u32) -> NonNull<TestNode> {
    tree.get_raw(&key).expect("item not found")
}

fn key_of(node: Option<NonNull<TestNode>>) -> Option<u32> {
    node.map(|n| unsafe { n.as_ref().key })
}

fn root_key(tree: &BsTree<TestNode>) -> Option<u32> {
    key_of(tree.root)
}

fn child_key(tree: &BsTree<TestNode>, key: u32, dir: Dir) -> Option<u32> {
    key_of(unsafe { tree.links(node(tree, key)).child(dir) })
}

fn parent_key(tree: &BsTree<TestNode>, key: u32) -> Option<u32> {
    key_of(unsafe { tree.links(node(tree, key)).parent() })
}

fn balance(tree: &AvlTree<TestNode>, key: u32) -> i8 {
    unsafe { tree.raw.links(node(&tree.raw, key)).balance() }
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn permutations(n: u32) -> Vec<Vec<u32>> {
    fn permute(prefix: &mut Vec<u32>, rest: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
        if rest.is_empty() {
            out.push(prefix.clone());
            return;
        }

        for i in 0..rest.len() {
            let key = rest.remove(i);
            prefix.push(key);
            permute(prefix, rest, out);
            prefix.pop();
            rest.insert(i, key);
        }
    }

    let mut out = Vec::new();
    permute(&mut Vec::new(), &mut (0..n).collect(), &mut out);
    out
}

fn insert_find_all(keys: &[u32]) {
    let tree = avl_from(keys);

    for key in keys {
        let node = tree.raw.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    assert_eq!(tree.len(), keys.len());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn five_elems_find() {
    for keys in permutations(5) {
        insert_find_all(&keys);
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = avl_from(keys);

    for key in keys {
        let node = tree.raw.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) };
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert_eq!(tree.remove(key).map(|node| node.key), Some(*key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_six() {
    for keys in permutations(6) {
        insert_remove_all(&keys);
    }
}

#[test]
fn remove_in_every_order() {
    // Every removal order of every insertion order of 5 keys.
    let orders = permutations(5);

    for insert_order in &orders {
        for remove_order in &orders {
            let mut tree = avl_from(insert_order);

            for key in remove_order {
                assert!(tree.remove(key).is_some());
                tree.assert_invariants();
            }

            assert!(tree.is_empty());
        }
    }
}

// Rotation scenarios ==========================================================

#[rstest]
#[case::right_right(&[1, 2, 3])]
#[case::left_left(&[3, 2, 1])]
#[case::right_left(&[1, 3, 2])]
#[case::left_right(&[3, 1, 2])]
fn three_keys_rebalance_to_middle_root(#[case] keys: &[u32]) {
    let tree = avl_from(keys);

    assert_eq!(root_key(&tree.raw), Some(2));
    assert_eq!(child_key(&tree.raw, 2, Dir::Left), Some(1));
    assert_eq!(child_key(&tree.raw, 2, Dir::Right), Some(3));

    for key in 1..=3 {
        assert_eq!(balance(&tree, key), 0);
    }
}

#[test]
fn ascending_insert_rotates_left() {
    let mut tree = avl_from(&[1, 2]);
    assert_eq!(root_key(&tree.raw), Some(1));
    assert_eq!(balance(&tree, 1), 1);

    tree.insert(TestNode::new(3));
    tree.assert_invariants();

    assert_eq!(root_key(&tree.raw), Some(2));
    assert_eq!(parent_key(&tree.raw, 1), Some(2));
    assert_eq!(tree.height(), 2);
}

#[test]
fn zig_zag_insert_lifts_inner_node() {
    let tree = avl_from(&[3, 1, 2]);

    assert_eq!(root_key(&tree.raw), Some(2));
    assert_eq!(parent_key(&tree.raw, 1), Some(2));
    assert_eq!(parent_key(&tree.raw, 3), Some(2));
    unsafe {
        assert!(tree.raw.links(node(&tree.raw, 1)).is_leaf());
        assert!(tree.raw.links(node(&tree.raw, 3)).is_leaf());
    }
}

#[rstest]
// The inner node of the double rotation is left-heavy, even, or right-heavy.
#[case::inner_left_heavy(&[20, 10, 30, 5, 15, 12], [(15, 0), (10, 0), (20, 1), (12, 0)])]
#[case::inner_right_heavy(&[20, 10, 30, 5, 15, 17], [(15, 0), (10, -1), (20, 0), (17, 0)])]
#[case::mirror_inner_right_heavy(&[10, 5, 20, 15, 25, 17], [(15, 0), (10, -1), (20, 0), (17, 0)])]
#[case::mirror_inner_left_heavy(&[10, 5, 20, 15, 25, 12], [(15, 0), (10, 0), (20, 1), (12, 0)])]
fn double_rotation_balances(#[case] keys: &[u32], #[case] expected: [(u32, i8); 4]) {
    let tree = avl_from(keys);

    assert_eq!(root_key(&tree.raw), Some(15));

    for (key, expected_balance) in expected {
        assert_eq!(balance(&tree, key), expected_balance, "balance of {key}");
    }
}

#[test]
fn insert_stops_at_shorter_side() {
    let mut tree = avl_from(&[2, 1, 3, 4]);
    assert_eq!(balance(&tree, 2), 1);
    assert_eq!(balance(&tree, 3), 1);

    // The new key evens out 2, so nothing above it changes.
    tree.insert(TestNode::new(0));
    tree.assert_invariants();
    assert_eq!(balance(&tree, 2), 0);
    assert_eq!(balance(&tree, 3), 1);
    assert_eq!(balance(&tree, 1), -1);
    assert_eq!(root_key(&tree.raw), Some(2));
}

#[test]
fn perfect_tree_from_ascending_keys() {
    let tree = avl_from(&[1, 2, 3, 4, 5, 6, 7]);

    assert_eq!(root_key(&tree.raw), Some(4));
    assert_eq!(tree.height(), 3);

    for key in 1..=7 {
        assert_eq!(balance(&tree, key), 0);
    }
}

#[test]
fn delete_from_perfect_tree() {
    let mut tree = avl_from(&[1, 2, 3, 4, 5, 6, 7]);

    assert_eq!(tree.remove(&1).map(|node| node.key), Some(1));
    tree.assert_invariants();

    assert_eq!(tree.height(), 3);
    assert_eq!(balance(&tree, 2), 1);
    assert_eq!(balance(&tree, 4), 0);

    // Emptying the left side forces a rotation at the root.
    tree.remove(&3);
    tree.assert_invariants();
    tree.remove(&2);
    tree.assert_invariants();

    assert_eq!(root_key(&tree.raw), Some(6));
    assert_eq!(tree.height(), 3);
    assert_eq!(keys(&tree), [4, 5, 6, 7]);
}

#[test]
fn delete_cascades_rotations_to_root() {
    // A minimal AVL tree of height 5, leaning left at every level.
    let mut tree = avl_from(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
    assert_eq!(tree.height(), 5);
    assert_eq!(balance(&tree, 8), -1);
    assert_eq!(balance(&tree, 11), -1);

    // Removing 12 unbalances 11, and the rotation there shortens the right side of 8, which
    // then needs a rotation of its own.
    tree.remove(&12);
    tree.assert_invariants();

    assert_eq!(root_key(&tree.raw), Some(5));
    assert_eq!(tree.height(), 4);
    assert_eq!(parent_key(&tree.raw, 8), Some(5));
    assert_eq!(parent_key(&tree.raw, 10), Some(8));
    assert_eq!(parent_key(&tree.raw, 7), Some(8));

    for key in [5, 8, 10] {
        assert_eq!(balance(&tree, key), 0, "balance of {key}");
    }
}

#[test]
fn delete_with_even_sibling_keeps_height() {
    let mut tree = avl_from(&[2, 1, 4, 3, 5]);
    assert_eq!(balance(&tree, 4), 0);

    tree.remove(&1);
    tree.assert_invariants();

    // A single rotation at 2 around the even child 4.
    assert_eq!(root_key(&tree.raw), Some(4));
    assert_eq!(balance(&tree, 4), -1);
    assert_eq!(balance(&tree, 2), 1);
    assert_eq!(tree.height(), 3);
}

#[test]
fn delete_double_rotation() {
    let mut tree = avl_from(&[5, 2, 8, 7]);
    assert_eq!(balance(&tree, 5), 1);
    assert_eq!(balance(&tree, 8), -1);

    tree.remove(&2);
    tree.assert_invariants();

    assert_eq!(root_key(&tree.raw), Some(7));
    assert_eq!(child_key(&tree.raw, 7, Dir::Left), Some(5));
    assert_eq!(child_key(&tree.raw, 7, Dir::Right), Some(8));
    assert_eq!(tree.height(), 2);
}

#[test]
fn delete_two_children_uses_predecessor() {
    let mut tree = avl_from(&[5, 3, 8]);
    let pred = node(&tree.raw, 3);

    assert_eq!(tree.remove(&5).map(|node| node.key), Some(5));
    tree.assert_invariants();

    // The predecessor node itself, not a copy, now holds the root position.
    assert_eq!(tree.raw.root, Some(pred));
    assert_eq!(child_key(&tree.raw, 3, Dir::Right), Some(8));
    assert_eq!(child_key(&tree.raw, 3, Dir::Left), None);
    assert_eq!(balance(&tree, 3), 1);
    assert_eq!(tree.len(), 2);
}

#[test]
fn delete_two_children_deep_predecessor() {
    let mut tree = avl_from(&[50, 25, 75, 10, 40, 60, 90, 35, 45, 95]);

    tree.remove(&50);
    tree.assert_invariants();

    assert_eq!(root_key(&tree.raw), Some(45));
    assert!(!tree.contains_key(&50));
    assert_eq!(tree.len(), 9);
}

#[test]
fn remove_missing_key_is_noop() {
    let mut tree = avl_from(&[1, 2, 3]);

    assert!(tree.remove(&4).is_none());
    tree.assert_invariants();
    assert_eq!(keys(&tree), [1, 2, 3]);

    let mut empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.remove(&1).is_none());
    assert!(empty.pop_first().is_none());
    assert!(empty.pop_last().is_none());
}

#[test]
fn overwrite_keeps_single_node() {
    let mut tree = avl_from(&[2, 1, 3]);
    let shape = (root_key(&tree.raw), balance(&tree, 2));

    let old = tree
        .insert(TestNode::with_value(1, 10))
        .expect("existing item should be returned");
    assert_eq!((old.key, old.value), (1, 0));
    tree.assert_invariants();

    let replaced = tree
        .insert(TestNode::with_value(1, 20))
        .expect("existing item should be returned");
    assert_eq!(replaced.value, 10);

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.get(&1).map(|node| node.value), Some(20));
    assert_eq!((root_key(&tree.raw), balance(&tree, 2)), shape);
}

#[test]
fn overwrite_root_with_children() {
    let mut tree = avl_from(&[2, 1, 3, 4]);

    tree.insert(TestNode::with_value(2, 7));
    tree.assert_invariants();

    let root = tree.raw.root.expect("tree should have a root");
    assert_eq!(unsafe { root.as_ref().value }, 7);
    assert_eq!(balance(&tree, 2), 1);
    assert_eq!(parent_key(&tree.raw, 1), Some(2));
}

#[test]
fn pop_ends() {
    let mut tree = avl_from(&[4, 2, 6, 1, 3, 5, 7]);

    assert_eq!(tree.pop_first().map(|node| node.key), Some(1));
    assert_eq!(tree.pop_last().map(|node| node.key), Some(7));
    tree.assert_invariants();

    assert_eq!(tree.first().map(|node| node.key), Some(2));
    assert_eq!(tree.last().map(|node| node.key), Some(6));
}

#[test]
fn clear_and_reuse() {
    let mut tree = avl_from(&[5, 3, 8, 1, 4]);

    tree.clear();
    tree.assert_invariants();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.height(), 0);
    assert!(tree.first().is_none());

    tree.insert(TestNode::new(9));
    tree.assert_invariants();
    assert_eq!(keys(&tree), [9]);
}

#[test]
fn ascending_insert_stays_logarithmic() {
    let keys: Vec<u32> = (0..1000).collect();
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in &keys {
        tree.insert(TestNode::new(key));
    }

    tree.assert_invariants();
    model::assert_height_bound(tree.height(), tree.len());

    for key in (0..1000).step_by(3) {
        tree.remove(&key);
    }

    tree.assert_invariants();
    model::assert_height_bound(tree.height(), tree.len());
}

// Rotations and structural primitives =========================================

#[test]
fn rotate_left_and_right() {
    let mut tree = avl_from(&[2, 1, 3]);
    let two = node(&tree.raw, 2);

    unsafe { tree.rotate(two, Dir::Left) };
    tree.raw.assert_invariants();
    assert_eq!(root_key(&tree.raw), Some(3));
    assert_eq!(child_key(&tree.raw, 3, Dir::Left), Some(2));
    assert_eq!(child_key(&tree.raw, 2, Dir::Left), Some(1));
    assert_eq!(child_key(&tree.raw, 2, Dir::Right), None);

    let three = node(&tree.raw, 3);
    unsafe { tree.rotate(three, Dir::Right) };
    tree.raw.assert_invariants();
    assert_eq!(root_key(&tree.raw), Some(2));
    assert_eq!(child_key(&tree.raw, 2, Dir::Right), Some(3));

    // Balance factors are left to the caller.
    tree.assert_invariants();
}

#[test]
fn rotate_moves_inner_subtree() {
    let mut tree = bst_from(&[4, 2, 6, 1, 3]);
    let mut avl = AvlTree {
        raw: core::mem::take(&mut tree),
    };

    let four = node(&avl.raw, 4);
    unsafe { avl.rotate(four, Dir::Right) };
    avl.raw.assert_invariants();

    assert_eq!(root_key(&avl.raw), Some(2));
    assert_eq!(child_key(&avl.raw, 4, Dir::Left), Some(3));
    assert_eq!(parent_key(&avl.raw, 3), Some(4));
    assert_eq!(parent_key(&avl.raw, 4), Some(2));
}

#[test]
fn swap_unrelated_nodes() {
    let mut tree = bst_from(&[4, 2, 6, 1, 3, 5, 7]);
    let two = node(&tree, 2);
    let six = node(&tree, 6);

    unsafe { tree.swap_nodes(two, six) };

    assert_eq!(unsafe { tree.links(tree.root.unwrap()).left() }, Some(six));
    assert_eq!(unsafe { tree.links(tree.root.unwrap()).right() }, Some(two));
    assert_eq!(
        unsafe { tree.links(six).children() },
        [Some(node_at(&tree, 1)), Some(node_at(&tree, 3))]
    );
    assert_eq!(key_of(unsafe { tree.links(node_at(&tree, 1)).parent() }), Some(6));
    assert_eq!(key_of(unsafe { tree.links(node_at(&tree, 7)).parent() }), Some(2));

    unsafe { tree.swap_nodes(six, two) };
    tree.assert_invariants();
    assert_eq!(child_key(&tree, 4, Dir::Left), Some(2));
}

// Finds a node by walking every link, since key lookup is unreliable mid-swap.
fn node_at(tree: &BsTree<TestNode>, key: u32) -> NonNull<TestNode> {
    let mut stack: Vec<NonNull<TestNode>> = tree.root.into_iter().collect();

    while let Some(cur) = stack.pop() {
        if unsafe { cur.as_ref().key } == key {
            return cur;
        }

        stack.extend(unsafe { tree.links(cur).children() }.into_iter().flatten());
    }

    panic!("key {key} not linked");
}

#[test]
fn swap_parent_and_child() {
    let mut tree = bst_from(&[4, 2, 6, 1, 3]);
    let four = node(&tree, 4);
    let two = node(&tree, 2);

    unsafe { tree.swap_nodes(four, two) };

    unsafe {
        assert_eq!(tree.root, Some(two));
        assert_eq!(tree.links(two).parent(), None);
        assert_eq!(tree.links(two).left(), Some(four));
        assert_eq!(key_of(tree.links(two).right()), Some(6));
        assert_eq!(tree.links(four).parent(), Some(two));
        assert_eq!(key_of(tree.links(four).left()), Some(1));
        assert_eq!(key_of(tree.links(four).right()), Some(3));
        assert_eq!(tree.links(node_at(&tree, 6)).parent(), Some(two));
        assert_eq!(tree.links(node_at(&tree, 3)).parent(), Some(four));
    }

    // Swapping in the other argument order restores the tree.
    unsafe { tree.swap_nodes(two, four) };
    tree.assert_invariants();
    assert_eq!(root_key(&tree), Some(4));
}

#[test]
fn swap_with_right_child_below_root() {
    let mut tree = bst_from(&[2, 1, 4, 3, 5]);
    let four = node(&tree, 4);
    let five = node(&tree, 5);

    unsafe { tree.swap_nodes(four, five) };

    unsafe {
        assert_eq!(tree.links(tree.root.unwrap()).right(), Some(five));
        assert_eq!(tree.links(five).right(), Some(four));
        assert_eq!(key_of(tree.links(five).left()), Some(3));
        assert!(tree.links(four).is_leaf());
    }

    unsafe { tree.swap_nodes(four, five) };
    tree.assert_invariants();
}

#[test]
fn swap_carries_balance_with_position() {
    let mut tree = avl_from(&[1, 2, 3, 4]);
    assert_eq!(balance(&tree, 2), 1);
    assert_eq!(balance(&tree, 4), 0);

    let two = node(&tree.raw, 2);
    let four = node(&tree.raw, 4);
    unsafe { tree.raw.swap_nodes(two, four) };

    unsafe {
        assert_eq!(tree.raw.root, Some(four));
        assert_eq!(tree.raw.links(four).balance(), 1);
        assert_eq!(tree.raw.links(two).balance(), 0);
    }

    unsafe { tree.raw.swap_nodes(two, four) };
    tree.assert_invariants();
}

#[test]
fn predecessor_and_successor() {
    let tree = bst_from(&[4, 2, 6, 1, 3, 5, 7]);

    unsafe {
        assert_eq!(key_of(tree.predecessor_raw(node(&tree, 4))), Some(3));
        assert_eq!(key_of(tree.successor_raw(node(&tree, 4))), Some(5));
        assert_eq!(key_of(tree.successor_raw(node(&tree, 3))), Some(4));
        assert_eq!(key_of(tree.predecessor_raw(node(&tree, 5))), Some(4));
        assert_eq!(key_of(tree.predecessor_raw(node(&tree, 1))), None);
        assert_eq!(key_of(tree.successor_raw(node(&tree, 7))), None);
    }
}

// Unbalanced tree =============================================================

#[test]
fn bst_keeps_insertion_shape() {
    let tree = bst_from(&[1, 2, 3, 4]);

    assert_eq!(root_key(&tree), Some(1));
    assert_eq!(tree.height(), 4);
    assert!(!tree.is_balanced());
}

#[rstest]
#[case::empty(&[], true)]
#[case::single(&[1], true)]
#[case::full(&[2, 1, 3], true)]
#[case::chain(&[1, 2, 3], false)]
#[case::lopsided(&[4, 2, 6, 1, 3, 0], false)]
#[case::uneven_but_balanced(&[4, 2, 6, 1, 3, 5], true)]
fn bst_is_balanced(#[case] keys: &[u32], #[case] expected: bool) {
    assert_eq!(bst_from(keys).is_balanced(), expected);
}

// Links `len` ascending keys into a right-leaning chain without descending for each one.
fn bst_chain(len: u32) -> BsTree<TestNode> {
    let mut tree: BsTree<TestNode> = BsTree::new();
    let mut last = None;

    for key in 0..len {
        let node = TestNode::into_ptr(TestNode::new(key));
        unsafe { tree.attach(last, Dir::Right, node) };
        last = Some(node);
    }

    tree
}

#[test]
fn deep_chain_diagnostics_do_not_recurse() {
    let tree = bst_chain(200_000);

    assert_eq!(tree.len(), 200_000);
    assert_eq!(tree.height(), 200_000);
    assert!(!tree.is_balanced());
    tree.assert_invariants();
}

#[test]
fn deep_balanced_tree_is_balanced() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in 0..50_000 {
        tree.insert(TestNode::new(key));
    }

    assert!(tree.as_bst().is_balanced());
    tree.as_bst().assert_invariants();
}

#[test]
fn cursors_compare_by_node_address() {
    let tree = bst_from(&[2, 1, 3]);

    assert_eq!(tree.cursor_first(), tree.find(&1));
    assert_ne!(tree.cursor_first(), tree.cursor_last());
    assert_eq!(tree.cursor_end(), tree.find(&4));

    unsafe {
        assert!(same_link(tree.root, Some(node(&tree, 2))));
        assert!(!same_link(tree.root, None));
        assert!(same_link::<TestNode>(None, None));
        assert!(same_node(node(&tree, 1), tree.first_raw().unwrap()));
        assert_eq!(tree.which_child(node(&tree, 2), node(&tree, 3)), Dir::Right);
    }
}

#[test]
fn bst_remove_two_children() {
    let mut tree = bst_from(&[5, 3, 8, 1, 4, 7, 9]);
    let pred = node(&tree, 4);

    assert_eq!(tree.remove(&5).map(|node| node.key), Some(5));
    tree.assert_invariants();

    assert_eq!(tree.root, Some(pred));
    assert_eq!(child_key(&tree, 3, Dir::Right), None);
    assert_eq!(tree.len(), 6);
}

#[test]
fn bst_remove_splices_single_child() {
    let mut tree = bst_from(&[5, 3, 1]);

    tree.remove(&3);
    tree.assert_invariants();
    assert_eq!(child_key(&tree, 5, Dir::Left), Some(1));

    tree.remove(&5);
    tree.assert_invariants();
    assert_eq!(root_key(&tree), Some(1));
}

#[test]
fn avl_is_always_balanced() {
    let tree = avl_from(&[10, 20, 30, 40, 50, 25, 5, 4, 3]);
    assert!(tree.as_bst().is_balanced());
}

// Iteration ===================================================================

#[test]
fn iter_in_order_both_ends() {
    let tree = avl_from(&[5, 3, 8, 1, 4, 7, 9, 2, 6]);

    assert_eq!(keys(&tree), (1..=9).collect::<Vec<_>>());
    assert_eq!(
        tree.iter().rev().map(|node| node.key).collect::<Vec<_>>(),
        (1..=9).rev().collect::<Vec<_>>()
    );

    let mut iter = tree.iter();
    assert_eq!(iter.len(), 9);
    assert_eq!(iter.next().map(|node| node.key), Some(1));
    assert_eq!(iter.next_back().map(|node| node.key), Some(9));
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.map(|node| node.key).collect::<Vec<_>>(), [2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn cursor_walks_to_end() {
    let tree = avl_from(&[2, 1, 3]);
    let mut cursor = tree.cursor_first();
    let mut seen = Vec::new();

    while cursor != tree.cursor_end() {
        seen.push(cursor.get().map(|node| node.key).unwrap());
        cursor.move_next();
    }

    assert_eq!(seen, [1, 2, 3]);
    assert!(cursor.is_end());

    // From the end, the cursor wraps around.
    cursor.move_next();
    assert_eq!(cursor, tree.cursor_first());
    cursor.move_prev();
    assert!(cursor.is_end());
    cursor.move_prev();
    assert_eq!(cursor, tree.cursor_last());
}

#[test]
fn find_returns_cursor() {
    let tree = avl_from(&[4, 2, 6]);

    let found = tree.find(&2);
    assert_eq!(found.get().map(|node| node.key), Some(2));
    assert_eq!(found.peek_next().map(|node| node.key), Some(4));
    assert_eq!(found.peek_prev().map(|node| node.key), None);
    assert_eq!(found, tree.find(&2));
    assert_ne!(found, tree.find(&4));

    assert_eq!(tree.find(&5), tree.cursor_end());

    let empty: AvlTree<TestNode> = AvlTree::new();
    assert_eq!(empty.cursor_first(), empty.cursor_end());
}

#[test]
fn cursor_mut_removes() {
    let mut tree = avl_from(&[1, 2, 3, 4, 5]);
    let mut cursor = tree.cursor_first_mut();

    cursor.move_next();
    assert_eq!(cursor.remove_current().map(|node| node.key), Some(2));
    assert_eq!(cursor.get().map(|node| node.key), Some(3));
    assert_eq!(
        cursor.remove_current_and_move_prev().map(|node| node.key),
        Some(3)
    );
    assert_eq!(cursor.get().map(|node| node.key), Some(1));

    drop(cursor);
    tree.assert_invariants();
    assert_eq!(keys(&tree), [1, 4, 5]);
}

// Entries =====================================================================

#[test]
fn entry_vacant_then_occupied() {
    let mut tree = avl_from(&[1, 2]);

    match tree.entry(&3) {
        Entry::Vacant(entry) => {
            assert_eq!(entry.key(), &3);
            unsafe { entry.insert(TestNode::new(3)) };
        }
        Entry::Occupied(_) => panic!("3 should be vacant"),
    }
    tree.assert_invariants();
    assert_eq!(root_key(&tree.raw), Some(2));

    match tree.entry(&3) {
        Entry::Occupied(mut entry) => {
            assert_eq!(entry.get().key, 3);
            let old = unsafe { entry.insert(TestNode::with_value(3, 30)) };
            assert_eq!(old.value, 0);
            assert_eq!(entry.get().value, 30);
        }
        Entry::Vacant(_) => panic!("3 should be occupied"),
    }
    tree.assert_invariants();

    match tree.entry(&2) {
        Entry::Occupied(entry) => assert_eq!(entry.remove().key, 2),
        Entry::Vacant(_) => panic!("2 should be occupied"),
    }
    tree.assert_invariants();
    assert_eq!(keys(&tree), [1, 3]);
    assert!(!tree.entry(&2).is_occupied());
}

// Map =========================================================================

#[test]
fn map_insert_overwrites() {
    let mut map = AvlMap::new();

    assert_eq!(map.insert(1, "one"), None);
    assert_eq!(map.insert(2, "two"), None);
    assert_eq!(map.insert(1, "uno"), Some("one"));

    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&1), Some(&"uno"));
    map.assert_invariants();
}

#[test]
fn map_index_and_at() {
    let mut map: AvlMap<u32, u32> = (0..10).map(|k| (k, k * 10)).collect();

    assert_eq!(map[&3], 30);
    map[&3] += 1;
    assert_eq!(map.at(&3), Ok(&31));
    assert_eq!(map.at(&42), Err(Error::KeyNotFound));
    assert_eq!(map.at_mut(&42), Err(Error::KeyNotFound));
    assert_eq!(Error::KeyNotFound.to_string(), "key not found");
}

#[test]
#[should_panic(expected = "key not found")]
fn map_index_missing_panics() {
    let map: AvlMap<u32, u32> = AvlMap::new();
    let _ = map[&1];
}

#[test]
fn map_find_and_cursors() {
    let map: AvlMap<u32, char> = [(3, 'c'), (1, 'a'), (2, 'b')].into_iter().collect();

    let mut cursor = map.find(&2);
    assert_eq!(cursor.key_value(), Some((&2, &'b')));
    cursor.move_next();
    assert_eq!(cursor.value(), Some(&'c'));
    cursor.move_next();
    assert_eq!(cursor, map.cursor_end());

    assert!(map.find(&9).is_end());
    assert_eq!(map.cursor_first().key(), Some(&1));
}

#[test]
fn map_remove_and_pop() {
    let mut map: AvlMap<u32, u32> = (1..=7).map(|k| (k, k)).collect();

    assert_eq!(map.remove(&4), Some(4));
    assert_eq!(map.remove(&4), None);
    assert_eq!(map.pop_first(), Some((1, 1)));
    assert_eq!(map.pop_last(), Some((7, 7)));
    map.assert_invariants();

    assert_eq!(map.keys().copied().collect::<Vec<_>>(), [2, 3, 5, 6]);
    assert_eq!(map.first_key_value(), Some((&2, &2)));
    assert_eq!(map.last_key_value(), Some((&6, &6)));
}

#[test]
fn map_get_or_insert_with() {
    let mut map: AvlMap<&str, Vec<u32>> = AvlMap::new();

    map.get_or_insert_with("a", Vec::new).push(1);
    map.get_or_insert_with("a", || unreachable!()).push(2);
    map.get_or_insert_with("b", Vec::new).push(3);

    assert_eq!(map.get("a"), Some(&vec![1, 2]));
    assert_eq!(map.values().map(Vec::len).collect::<Vec<_>>(), [2, 1]);
    map.assert_invariants();
}

#[test]
fn map_debug_and_clear() {
    let mut map: AvlMap<u32, &str> = [(2, "b"), (1, "a")].into_iter().collect();

    assert_eq!(format!("{map:?}"), r#"{1: "a", 2: "b"}"#);

    map.clear();
    assert!(map.is_empty());
    assert_eq!(format!("{map:?}"), "{}");
}

#[test]
fn map_drops_values() {
    use std::rc::Rc;

    let value = Rc::new(());
    let mut map = AvlMap::new();

    for key in 0..16 {
        map.insert(key, Rc::clone(&value));
    }
    assert_eq!(Rc::strong_count(&value), 17);

    map.remove(&3);
    assert_eq!(Rc::strong_count(&value), 16);

    drop(map);
    assert_eq!(Rc::strong_count(&value), 1);
}

// Model equivalence ===========================================================

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn bst_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_bst_equivalence(ops);
    }

    #[test]
    fn map_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_map_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }

    #[test]
    fn insert_then_find(keys in proptest::collection::vec(any::<u32>(), 0..200), probe in any::<u32>()) {
        let mut tree: AvlTree<TestNode> = AvlTree::new();

        for &key in &keys {
            tree.insert(TestNode::with_value(key, key.wrapping_mul(3)));
        }

        prop_assert_eq!(
            tree.get(&probe).map(|node| node.value),
            keys.contains(&probe).then(|| probe.wrapping_mul(3))
        );

        tree.remove(&probe);
        prop_assert!(tree.get(&probe).is_none());
        prop_assert!(tree.find(&probe) == tree.cursor_end());
        tree.assert_invariants();
    }
}
