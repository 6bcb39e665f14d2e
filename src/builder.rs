//! Tree construction with per-tree tuning.
//!
//! The tuning knobs that a single-process prototype would make globals
//! (replicas per member, branch factor, circle backing) live on the tree
//! itself, so independent trees with different settings coexist in one
//! process.
//!
//! ## Example
//!
//! ```
//! use ringtree::{CircleBacking, Node, RingTreeBuilder};
//!
//! let tree = RingTreeBuilder::new(8)
//!     .replicas(64)
//!     .branch_factor(2)
//!     .backing(CircleBacking::Array)
//!     .build();
//! tree.insert_node(Node::new("server-1", 100)).unwrap();
//! ```

use std::sync::Arc;

use crate::circle::CircleBacking;
use crate::ring::{Ring, RingTree, TreeContext};
use crate::stats::{TimingObserver, TreeStats};

/// Builder for a [`RingTree`].
///
/// Out-of-range values are floored to their minimums rather than rejected:
/// `max_count` to 2, `replicas` and `branch_factor` to 1.
pub struct RingTreeBuilder {
    max_count: usize,
    replicas: usize,
    branch_factor: usize,
    backing: CircleBacking,
    timer: Option<Arc<dyn TimingObserver>>,
}

impl RingTreeBuilder {
    /// Starts a builder for a tree whose root holds up to `max_count`
    /// members.
    pub fn new(max_count: usize) -> Self {
        Self {
            max_count,
            replicas: 20,
            branch_factor: 1,
            backing: CircleBacking::default(),
            timer: None,
        }
    }

    /// Virtual nodes contributed by each member (default 20).
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Multiplier applied to `max_count` for each level of sub-ring
    /// (default 1: sub-rings keep their parent's fan-out).
    pub fn branch_factor(mut self, branch_factor: usize) -> Self {
        self.branch_factor = branch_factor;
        self
    }

    /// Circle backing used by every ring (default red-black tree).
    pub fn backing(mut self, backing: CircleBacking) -> Self {
        self.backing = backing;
        self
    }

    /// Callback receiving the latency of every completed operation.
    pub fn timing_observer(mut self, observer: Arc<dyn TimingObserver>) -> Self {
        self.timer = Some(observer);
        self
    }

    pub fn build(self) -> RingTree {
        let ctx = Arc::new(TreeContext {
            replicas: self.replicas.max(1),
            branch_factor: self.branch_factor.max(1),
            backing: self.backing,
            stats: TreeStats::default(),
            timer: self.timer,
        });
        RingTree::from_root(Ring::new_root(ctx, self.max_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn defaults_match_documented_values() {
        let tree = RingTreeBuilder::new(4).build();
        tree.insert_node(Node::new("a", 10)).unwrap();
        // 20 replicas by default.
        assert_eq!(tree.snapshot().circle.len(), 20);
    }

    #[test]
    fn replicas_floor_to_one() {
        let tree = RingTreeBuilder::new(4).replicas(0).build();
        tree.insert_node(Node::new("a", 10)).unwrap();
        assert_eq!(tree.snapshot().circle.len(), 1);
    }

    #[test]
    fn custom_replica_count_applies() {
        let tree = RingTreeBuilder::new(4).replicas(5).build();
        tree.insert_node(Node::new("a", 10)).unwrap();
        tree.insert_node(Node::new("b", 10)).unwrap();
        assert_eq!(tree.snapshot().circle.len(), 10);
    }

    #[test]
    fn branch_factor_widens_subrings() {
        let tree = RingTreeBuilder::new(2).branch_factor(3).build();
        tree.insert_node(Node::new("a", 1)).unwrap();
        for key in ["k1", "k2", "k3", "k4"] {
            tree.insert_key(key).unwrap();
        }
        let snapshot = tree.snapshot();
        let branch = snapshot
            .members
            .iter()
            .find_map(|m| match m {
                crate::ring::MemberSnapshot::Ring(sub) => Some(sub),
                _ => None,
            })
            .expect("overflow at capacity must split");
        assert_eq!(branch.max_count, 6);
    }
}
