//! Model-based checking of the trees against `std::collections`.
//!
//! Shared by the property tests and the fuzz targets.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlMap, AvlTree, BsTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
    pub value: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        TestNode::with_value(key, 0)
    }

    pub fn with_value(key: u32, value: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
            value,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// Panics if a tree of `len` items is taller than the AVL height bound allows.
pub fn assert_height_bound(height: usize, len: usize) {
    let bound = 1.45 * ((len + 2) as f64).log2();
    assert!(
        height as f64 <= bound,
        "height {height} exceeds AVL bound {bound:.2} for {len} items"
    );
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Get(ItemValue),
    Remove(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
}

impl Op {
    fn finalize(self, model: &BTreeMap<u32, u32>) -> FinalOp {
        // `Index` values pick an existing key, so that removals and overwrites actually hit.
        fn get_key(m: &BTreeMap<u32, u32>, i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => m
                    .keys()
                    .nth(idx % m.len().max(1))
                    .copied()
                    .unwrap_or(idx as u32),
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_key(model, item)),
            Op::Get(item) => FinalOp::Get(get_key(model, item)),
            Op::Remove(item) => FinalOp::Remove(get_key(model, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Remove(u32),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

/// The common surface of the trees under test.
trait ModelTree {
    fn insert(&mut self, key: u32, value: u32) -> Option<u32>;
    fn get(&self, key: u32) -> Option<u32>;
    fn remove(&mut self, key: u32) -> Option<(u32, u32)>;
    fn first(&self) -> Option<u32>;
    fn last(&self) -> Option<u32>;
    fn pop_first(&mut self) -> Option<(u32, u32)>;
    fn pop_last(&mut self) -> Option<(u32, u32)>;
    fn len(&self) -> usize;
    fn entries(&self) -> Vec<(u32, u32)>;
    fn check(&self);
}

fn pair(node: Box<TestNode>) -> (u32, u32) {
    (node.key, node.value)
}

impl ModelTree for BsTree<TestNode> {
    fn insert(&mut self, key: u32, value: u32) -> Option<u32> {
        BsTree::insert(self, TestNode::with_value(key, value)).map(|old| old.value)
    }

    fn get(&self, key: u32) -> Option<u32> {
        BsTree::get(self, &key).map(|node| node.value)
    }

    fn remove(&mut self, key: u32) -> Option<(u32, u32)> {
        BsTree::remove(self, &key).map(pair)
    }

    fn first(&self) -> Option<u32> {
        BsTree::first(self).map(|node| node.key)
    }

    fn last(&self) -> Option<u32> {
        BsTree::last(self).map(|node| node.key)
    }

    fn pop_first(&mut self) -> Option<(u32, u32)> {
        BsTree::pop_first(self).map(pair)
    }

    fn pop_last(&mut self) -> Option<(u32, u32)> {
        BsTree::pop_last(self).map(pair)
    }

    fn len(&self) -> usize {
        BsTree::len(self)
    }

    fn entries(&self) -> Vec<(u32, u32)> {
        self.iter().map(|node| (node.key, node.value)).collect()
    }

    fn check(&self) {
        self.assert_invariants();
    }
}

impl ModelTree for AvlTree<TestNode> {
    fn insert(&mut self, key: u32, value: u32) -> Option<u32> {
        AvlTree::insert(self, TestNode::with_value(key, value)).map(|old| old.value)
    }

    fn get(&self, key: u32) -> Option<u32> {
        AvlTree::get(self, &key).map(|node| node.value)
    }

    fn remove(&mut self, key: u32) -> Option<(u32, u32)> {
        AvlTree::remove(self, &key).map(pair)
    }

    fn first(&self) -> Option<u32> {
        AvlTree::first(self).map(|node| node.key)
    }

    fn last(&self) -> Option<u32> {
        AvlTree::last(self).map(|node| node.key)
    }

    fn pop_first(&mut self) -> Option<(u32, u32)> {
        AvlTree::pop_first(self).map(pair)
    }

    fn pop_last(&mut self) -> Option<(u32, u32)> {
        AvlTree::pop_last(self).map(pair)
    }

    fn len(&self) -> usize {
        AvlTree::len(self)
    }

    fn entries(&self) -> Vec<(u32, u32)> {
        self.iter().map(|node| (node.key, node.value)).collect()
    }

    fn check(&self) {
        self.assert_invariants();
        assert_height_bound(self.height(), AvlTree::len(self));
    }
}

impl ModelTree for AvlMap<u32, u32> {
    fn insert(&mut self, key: u32, value: u32) -> Option<u32> {
        AvlMap::insert(self, key, value)
    }

    fn get(&self, key: u32) -> Option<u32> {
        AvlMap::get(self, &key).copied()
    }

    fn remove(&mut self, key: u32) -> Option<(u32, u32)> {
        AvlMap::remove(self, &key).map(|value| (key, value))
    }

    fn first(&self) -> Option<u32> {
        self.first_key_value().map(|(&k, _)| k)
    }

    fn last(&self) -> Option<u32> {
        self.last_key_value().map(|(&k, _)| k)
    }

    fn pop_first(&mut self) -> Option<(u32, u32)> {
        AvlMap::pop_first(self)
    }

    fn pop_last(&mut self) -> Option<(u32, u32)> {
        AvlMap::pop_last(self)
    }

    fn len(&self) -> usize {
        AvlMap::len(self)
    }

    fn entries(&self) -> Vec<(u32, u32)> {
        self.iter().map(|(&k, &v)| (k, v)).collect()
    }

    fn check(&self) {
        self.assert_invariants();
        assert_height_bound(self.height(), AvlMap::len(self));
    }
}

fn run_equivalence<M: ModelTree>(mut tree: M, ops: Vec<Op>) {
    let mut btree = BTreeMap::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&btree);
        let value = op_id as u32;

        match final_op {
            FinalOp::Insert(key) => {
                let from_btree = btree.insert(key, value);
                let from_tree = tree.insert(key, value);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Get(key) => {
                let from_btree = btree.get(&key).copied();
                let from_tree = tree.get(key);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(key) => {
                let from_btree = btree.remove(&key).map(|v| (key, v));
                let from_tree = tree.remove(key);

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.keys().next().copied();
                let from_tree = tree.first();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_tree = tree.pop_first();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.keys().next_back().copied();
                let from_tree = tree.last();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_tree = tree.pop_last();

                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        tree.check();
        assert_eq!(btree.len(), tree.len());
        assert!(btree
            .iter()
            .map(|(&k, &v)| (k, v))
            .eq(tree.entries().into_iter()));
    }
}

/// Runs `ops` against an [`AvlTree`] and a `BTreeMap`, checking that they agree and that the AVL
/// invariants hold after every operation.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    run_equivalence(AvlTree::<TestNode>::new(), ops);
}

/// Runs `ops` against a [`BsTree`] and a `BTreeMap`.
pub fn run_bst_equivalence(ops: Vec<Op>) {
    run_equivalence(BsTree::<TestNode>::new(), ops);
}

/// Runs `ops` against an [`AvlMap`] and a `BTreeMap`.
pub fn run_map_equivalence(ops: Vec<Op>) {
    run_equivalence(AvlMap::<u32, u32>::new(), ops);
}

#[derive(Clone, Debug, Arbitrary)]
pub enum CursorOp {
    // Get is not an operation as it's executed on every loop iteration to check equivalence.
    MovePrev,
    MoveNext,
    PeekNext,
    PeekPrev,
    RemoveCurrent,
    RemoveCurrentMovePrev,
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    proptest::prop_oneof![
        Just(CursorOp::MovePrev),
        Just(CursorOp::MoveNext),
        Just(CursorOp::PeekNext),
        Just(CursorOp::PeekPrev),
        Just(CursorOp::RemoveCurrent),
        Just(CursorOp::RemoveCurrentMovePrev),
    ]
}

#[derive(Clone, Debug)]
pub struct CursorEquivalenceInput {
    pub values: Vec<u32>,
    pub ops: Vec<CursorOp>,
}

impl<'a> arbitrary::Arbitrary<'a> for CursorEquivalenceInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        fn value(u: &mut arbitrary::Unstructured<'_>) -> u32 {
            u32::arbitrary(u).unwrap_or(0)
        }

        fn op(u: &mut arbitrary::Unstructured<'_>) -> CursorOp {
            CursorOp::arbitrary(u).unwrap_or(CursorOp::MoveNext)
        }

        let num_values = u8::arbitrary(u)? % 100;
        let num_ops = u16::arbitrary(u)? % 1000;

        let values = core::iter::repeat_with(|| value(u))
            .take(num_values.into())
            .collect();

        let ops = core::iter::repeat_with(|| op(u))
            .take(num_ops.into())
            .collect();

        Ok(CursorEquivalenceInput { values, ops })
    }
}

/// Drives a [`CursorMut`](crate::CursorMut) over an [`AvlTree`] alongside an index into a sorted
/// `Vec`, checking that both always point at the same value.
pub fn run_cursor_equivalence(mut values: Vec<u32>, ops: Vec<CursorOp>) {
    values.sort_unstable();
    values.dedup();

    let mut vec = Vec::new();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    for val in values {
        vec.push(val);
        avl.insert(TestNode::new(val));
    }

    fn vec_curs_prev(v: &[u32], curs: Option<usize>) -> Option<usize> {
        match curs {
            Some(i) => i.checked_sub(1),
            None => v.len().checked_sub(1),
        }
    }

    fn vec_curs_next(v: &[u32], curs: Option<usize>) -> Option<usize> {
        match curs {
            Some(i) => i.checked_add(1).filter(|&i| i < v.len()),
            None => (!v.is_empty()).then_some(0),
        }
    }

    let mut vec_curs = vec_curs_next(&vec, None);
    let mut avl_curs = avl.cursor_first_mut();

    // Check that the initial states are equivalent.
    {
        let v = vec_curs.map(|i| &vec[i]);
        let w = avl_curs.get().map(TestNode::key);

        assert_eq!(v, w);
    }

    for op in ops {
        match op {
            CursorOp::MoveNext => {
                vec_curs = vec_curs_next(&vec, vec_curs);
                avl_curs.move_next();
            }

            CursorOp::MovePrev => {
                vec_curs = vec_curs_prev(&vec, vec_curs);
                avl_curs.move_prev();
            }

            CursorOp::PeekNext => {
                let v = vec_curs_next(&vec, vec_curs).map(|i| &vec[i]);
                let w = avl_curs.peek_next().map(TestNode::key);

                assert_eq!(v, w);
            }

            CursorOp::PeekPrev => {
                let v = vec_curs_prev(&vec, vec_curs).map(|i| &vec[i]);
                let w = avl_curs.peek_prev().map(TestNode::key);

                assert_eq!(v, w);
            }

            CursorOp::RemoveCurrent => {
                let v = vec_curs.map(|i| vec.remove(i));

                if vec_curs == Some(vec.len()) {
                    vec_curs = None;
                }

                let w = avl_curs.remove_current().map(|node| node.key);

                assert_eq!(v, w);
            }

            CursorOp::RemoveCurrentMovePrev => {
                let new_v_curs = vec_curs.is_some().then(|| vec_curs_prev(&vec, vec_curs));
                let v = vec_curs.map(|i| vec.remove(i));

                if let Some(vc) = new_v_curs {
                    vec_curs = vc;
                }

                let w = avl_curs
                    .remove_current_and_move_prev()
                    .map(|node| node.key);

                assert_eq!(v, w);
            }
        }

        let v = vec_curs.map(|i| &vec[i]);
        let w = avl_curs.get().map(TestNode::key);

        assert_eq!(v, w);
    }

    drop(avl_curs);
    avl.assert_invariants();
    assert!(avl.iter().map(|node| node.key).eq(vec.iter().copied()));
}
