#![no_main]
use libfuzzer_sys::fuzz_target;

use cordyceps_avl::model::{run_bst_equivalence, Op};

fuzz_target!(|ops: Vec<Op>| {
    // Sorted input degrades the tree into a list; keep runs short.
    if ops.len() <= 512 {
        run_bst_equivalence(ops)
    }
});
