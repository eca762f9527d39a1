use std::ptr::NonNull;

use cordyceps::Linked;
use cordyceps_avl::{AvlMap, AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
struct Word {
    links: Links<Word>,
    key: u32,
    text: &'static str,
}

impl Word {
    fn new(key: u32, text: &'static str) -> Box<Word> {
        Box::new(Word {
            links: Links::new(),
            key,
            text,
        })
    }
}

unsafe impl Linked<Links<Word>> for Word {
    type Handle = Box<Word>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Word>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<Word>> for Word {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

fn main() {
    let mut tree: AvlTree<Word> = AvlTree::new();

    for (key, text) in [(1, "one"), (2, "two"), (3, "three"), (4, "four"), (5, "five")] {
        tree.insert(Word::new(key, text));
        tree.assert_invariants();
        println!(
            "height {}: {:?}",
            tree.height(),
            tree.iter().map(|word| word.text).collect::<Vec<_>>()
        );
    }

    let old = tree.insert(Word::new(3, "drei")).unwrap();
    assert_eq!(old.text, "three");
    tree.assert_invariants();

    let mut graph = String::new();
    tree.dotgraph("words", &mut graph).unwrap();
    println!("{graph}");

    let first = tree.pop_first().unwrap();
    assert_eq!(first.key, 1);
    tree.assert_invariants();

    let removed = tree.remove(&4).unwrap();
    assert_eq!(removed.text, "four");
    tree.assert_invariants();
    println!("{:?}", tree.iter().map(|word| word.key).collect::<Vec<_>>());

    drop(tree);

    let mut map: AvlMap<u32, &str> = (0..8).map(|k| (k, "even")).collect();
    for k in (1..8).step_by(2) {
        map[&k] = "odd";
    }
    map.assert_invariants();
    println!("{map:?}");
    println!("{}", map.at(&9).unwrap_err());
}
