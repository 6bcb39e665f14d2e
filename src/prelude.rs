//! Convenience re-exports for common usage.
//!
//! ```
//! use ringtree::prelude::*;
//!
//! let tree = RingTree::new(4);
//! tree.insert_node(Node::new("server-1", 100)).unwrap();
//! ```

pub use crate::builder::RingTreeBuilder;
pub use crate::circle::{Circle, CircleBacking, VNode};
pub use crate::error::{Result, RingError};
pub use crate::node::Node;
pub use crate::ring::{KeyLocation, RingSnapshot, RingTree};
pub use crate::stats::{Op, OpTimes, TimingObserver};
