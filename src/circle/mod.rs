//! One ring's ordered collection of virtual nodes.
//!
//! A `Circle` maps 32-bit vnode hashes to owning member ids and answers the
//! two successor queries consistent hashing lives on:
//!
//! ```text
//!            0x0000            find_closest(h):      smallest entry >= h,
//!         ┌───●──────┐                               wrapping to the minimum
//!     ●───┘          └───●     find_next_closest(h): smallest entry >  h,
//!     │     hash ring    │                           wrapping to the minimum
//!     ●───┐          ┌───●
//!         └────●─────┘
//! ```
//!
//! Two interchangeable backings implement the same contract:
//!
//! | Backing                  | Insert        | Successor | Best for           |
//! |--------------------------|---------------|-----------|--------------------|
//! | [`ArrayCircle`]          | append + sort | O(log n)  | small, read-heavy  |
//! | [`RbTreeCircle`]         | O(log n)      | O(log n)  | write-heavy        |
//!
//! The choice is orthogonal to the ring algorithm and is made per tree via
//! [`CircleBacking`].

use std::fmt;

mod array;
mod rbtree;

pub use array::ArrayCircle;
pub use rbtree::RbTreeCircle;

/// A virtual node: a hash position owned by a member id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VNode {
    pub hash: u32,
    pub id: String,
}

/// Backing store used for each ring's circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircleBacking {
    /// Sorted vector; compact and cache-friendly for rarely-mutated circles.
    Array,
    /// Left-leaning red-black tree; amortizes over write-heavy workloads.
    #[default]
    RbTree,
}

/// Contract shared by both circle backings.
///
/// Hashes are unique within a circle. Successor queries are undefined on an
/// empty circle and return `None` there.
pub trait Circle: fmt::Debug + Send + Sync {
    /// Inserts a vnode. Returns `false` when the hash is already present.
    fn insert(&mut self, hash: u32, id: &str) -> bool;

    /// Deletes a vnode by hash. Returns `false` when absent.
    fn delete(&mut self, hash: u32) -> bool;

    /// The vnode with the smallest hash `>= hash`, wrapping to the minimum.
    fn find_closest(&self, hash: u32) -> Option<(u32, &str)>;

    /// The vnode with the smallest hash strictly `> hash`, wrapping to the
    /// minimum.
    fn find_next_closest(&self, hash: u32) -> Option<(u32, &str)>;

    /// Number of vnodes on the circle.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-establishes ordering after inserts. No-op for self-ordering
    /// backings.
    fn sort(&mut self) {}

    /// Hash-ordered traversal, for snapshots and tests.
    fn entries(&self) -> Vec<VNode>;
}

/// Creates an empty circle with the requested backing.
pub fn new_circle(backing: CircleBacking) -> Box<dyn Circle> {
    match backing {
        CircleBacking::Array => Box::new(ArrayCircle::new()),
        CircleBacking::RbTree => Box::new(RbTreeCircle::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backings() -> Vec<Box<dyn Circle>> {
        vec![
            new_circle(CircleBacking::Array),
            new_circle(CircleBacking::RbTree),
        ]
    }

    #[test]
    fn empty_circle_has_no_successors() {
        for circle in backings() {
            assert!(circle.is_empty());
            assert_eq!(circle.find_closest(0), None);
            assert_eq!(circle.find_next_closest(u32::MAX), None);
        }
    }

    #[test]
    fn duplicate_hash_rejected() {
        for mut circle in backings() {
            assert!(circle.insert(100, "a"));
            assert!(!circle.insert(100, "b"));
            circle.sort();
            assert_eq!(circle.len(), 1);
            assert_eq!(circle.find_closest(100), Some((100, "a")));
        }
    }

    #[test]
    fn closest_wraps_past_the_maximum() {
        for mut circle in backings() {
            circle.insert(10, "a");
            circle.insert(200, "b");
            circle.sort();

            assert_eq!(circle.find_closest(5), Some((10, "a")));
            assert_eq!(circle.find_closest(10), Some((10, "a")));
            assert_eq!(circle.find_closest(11), Some((200, "b")));
            assert_eq!(circle.find_closest(201), Some((10, "a")));
        }
    }

    #[test]
    fn next_closest_is_strictly_greater() {
        for mut circle in backings() {
            circle.insert(10, "a");
            circle.insert(200, "b");
            circle.sort();

            assert_eq!(circle.find_next_closest(9), Some((10, "a")));
            assert_eq!(circle.find_next_closest(10), Some((200, "b")));
            assert_eq!(circle.find_next_closest(200), Some((10, "a")));
            assert_eq!(circle.find_next_closest(u32::MAX), Some((10, "a")));
        }
    }

    #[test]
    fn delete_removes_only_the_target() {
        for mut circle in backings() {
            circle.insert(1, "a");
            circle.insert(2, "b");
            circle.insert(3, "c");
            circle.sort();

            assert!(circle.delete(2));
            assert!(!circle.delete(2));
            assert_eq!(circle.len(), 2);
            assert_eq!(circle.find_closest(2), Some((3, "c")));
        }
    }

    #[test]
    fn entries_are_hash_ordered() {
        for mut circle in backings() {
            for (h, id) in [(300u32, "c"), (100, "a"), (200, "b")] {
                circle.insert(h, id);
            }
            circle.sort();

            let entries = circle.entries();
            let hashes: Vec<u32> = entries.iter().map(|v| v.hash).collect();
            assert_eq!(hashes, vec![100, 200, 300]);
            assert_eq!(entries[0].id, "a");
            assert_eq!(entries[2].id, "c");
        }
    }
}
