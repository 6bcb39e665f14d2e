// ==============================================
// CIRCLE BACKING EQUIVALENCE (property tests)
// ==============================================
//
// The sorted-array and red-black-tree backings must present the Circle
// contract identically. Both are driven with the same randomized operation
// sequences; every observable result has to agree.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use ringtree::circle::{new_circle, CircleBacking};

#[derive(Debug, Clone)]
enum CircleOp {
    Insert(u32),
    Delete(u32),
    FindClosest(u32),
    FindNextClosest(u32),
}

fn op_strategy() -> impl Strategy<Value = CircleOp> {
    // A narrow hash domain forces duplicate inserts, deletes of present
    // entries, and probes that land exactly on entries.
    let hash = 0u32..64;
    prop_oneof![
        hash.clone().prop_map(CircleOp::Insert),
        hash.clone().prop_map(CircleOp::Delete),
        hash.clone().prop_map(CircleOp::FindClosest),
        hash.prop_map(CircleOp::FindNextClosest),
    ]
}

fn wide_op_strategy() -> impl Strategy<Value = CircleOp> {
    let hash = any::<u32>();
    prop_oneof![
        hash.clone().prop_map(CircleOp::Insert),
        hash.clone().prop_map(CircleOp::Delete),
        hash.clone().prop_map(CircleOp::FindClosest),
        hash.prop_map(CircleOp::FindNextClosest),
    ]
}

fn run_equivalence(ops: Vec<CircleOp>) -> Result<(), TestCaseError> {
    let mut array = new_circle(CircleBacking::Array);
    let mut tree = new_circle(CircleBacking::RbTree);

    for op in ops {
        match op {
            CircleOp::Insert(hash) => {
                let id = format!("owner-{}", hash % 7);
                let a = array.insert(hash, &id);
                let t = tree.insert(hash, &id);
                array.sort();
                tree.sort();
                prop_assert_eq!(a, t, "insert({}) disagreed", hash);
            }
            CircleOp::Delete(hash) => {
                let a = array.delete(hash);
                let t = tree.delete(hash);
                prop_assert_eq!(a, t, "delete({}) disagreed", hash);
            }
            CircleOp::FindClosest(hash) => {
                prop_assert_eq!(
                    array.find_closest(hash),
                    tree.find_closest(hash),
                    "find_closest({}) disagreed",
                    hash
                );
            }
            CircleOp::FindNextClosest(hash) => {
                prop_assert_eq!(
                    array.find_next_closest(hash),
                    tree.find_next_closest(hash),
                    "find_next_closest({}) disagreed",
                    hash
                );
            }
        }
        prop_assert_eq!(array.len(), tree.len());
    }

    prop_assert_eq!(array.entries(), tree.entries());
    Ok(())
}

proptest! {
    #[test]
    fn backings_agree_on_dense_sequences(ops in prop::collection::vec(op_strategy(), 1..200)) {
        run_equivalence(ops)?;
    }

    #[test]
    fn backings_agree_on_full_range_sequences(ops in prop::collection::vec(wide_op_strategy(), 1..100)) {
        run_equivalence(ops)?;
    }
}
