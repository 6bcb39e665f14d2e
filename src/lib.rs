//! ringtree: hierarchical consistent hashing.
//!
//! A classical consistent-hash ring spreads keys over one circular hash
//! namespace. A `RingTree` recursively promotes an overloaded leaf into a
//! nested sub-ring, producing a tree of rings: every ring is a hash circle
//! whose members are either leaf nodes or deeper rings. Lookups descend from
//! the root; load-driven splits and collapses keep the tree shape consistent
//! with observed load.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod circle;
pub mod error;
pub mod hash;
pub mod node;
pub mod prelude;
pub mod ring;
pub mod stats;

mod id;
mod remap;

pub use builder::RingTreeBuilder;
pub use circle::{Circle, CircleBacking, VNode};
pub use error::{Result, RingError};
pub use node::{LeafSnapshot, Node};
pub use ring::{KeyLocation, MemberSnapshot, RingSnapshot, RingTree};
pub use stats::{
    CounterSnapshot, HierarchyReport, LevelReport, LoadSummary, Op, OpTimeStats, OpTimes,
    RemapStats, RingLoadReport, TimingObserver,
};
