//! The ring hierarchy: consistent-hash circles whose members are leaves or
//! deeper rings.
//!
//! ## Architecture
//!
//! ```text
//!   RingTree ──► Ring (level 0, "main")
//!                 │  circle: vnode hash -> member id
//!                 │  members: id -> Leaf(Node) | Branch(Ring)
//!                 │
//!        ┌────────┴─────────┐
//!        ▼                  ▼
//!      Node "a"          Ring "b" (level 1)        ◄─ was an overloaded
//!      keys, load          │                          leaf, promoted by
//!                   ┌──────┴──────┐                   split_node
//!                   ▼             ▼
//!                 Node ..       Node ..
//! ```
//!
//! A key descends from the root: hash at the ring's level, resolve the
//! closest-clockwise vnode, recurse when the owner is a Branch. Structural
//! events run inline: `insert_key` grows the tree (sibling node, then split)
//! when a leaf overflows, `remove_key` shrinks it (node removal, then
//! collapse) on underflow. Every membership change triggers a localized
//! remap pass so key residency always matches the circle.
//!
//! ## Locking
//!
//! Every ring owns a `parking_lot::RwLock` over its circle and members.
//! Reads take shared locks during descent and release the parent before
//! entering a child. Writes take the exclusive lock of the ring whose state
//! they mutate and release it before internal retries. Lock order is parent
//! before child only; collapse therefore locks the parent first, then the
//! sub-ring.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::builder::RingTreeBuilder;
use crate::circle::{new_circle, Circle, CircleBacking, VNode};
use crate::error::{Result, RingError};
use crate::hash::hash32;
use crate::node::{LeafSnapshot, Node};
use crate::remap::should_move;
use crate::stats::{
    load_distribution, HierarchyReport, LevelReport, LoadSummary, Op, RingLoadReport,
    TimingObserver, TreeStats,
};

// ---------------------------------------------------------------------------
// Shared tree context
// ---------------------------------------------------------------------------

/// Tuning and observability shared by every ring in one tree.
pub(crate) struct TreeContext {
    pub(crate) replicas: usize,
    pub(crate) branch_factor: usize,
    pub(crate) backing: CircleBacking,
    pub(crate) stats: TreeStats,
    pub(crate) timer: Option<Arc<dyn TimingObserver>>,
}

impl TreeContext {
    fn observe(&self, op: Op, start: Instant) {
        if let Some(timer) = &self.timer {
            timer.record(op, start.elapsed());
        }
    }
}

// ---------------------------------------------------------------------------
// Members and per-ring state
// ---------------------------------------------------------------------------

enum Member {
    Leaf(Node),
    Branch(Arc<Ring>),
}

struct RingState {
    circle: Box<dyn Circle>,
    members: FxHashMap<String, Member>,
}

impl RingState {
    /// Collapse predicate: fewer than two members, none of them a sub-ring.
    /// The branch check is the hard safety guard against losing a deeper
    /// sub-tree.
    fn should_collapse(&self, has_parent: bool) -> bool {
        has_parent
            && self.members.len() < 2
            && !self
                .members
                .values()
                .any(|m| matches!(m, Member::Branch(_)))
    }

    /// True when no leaf member of this ring holds keys. Branch members are
    /// not inspected.
    fn no_leaf_holds_keys(&self) -> bool {
        self.members.values().all(|m| match m {
            Member::Leaf(node) => node.load() == 0,
            Member::Branch(_) => true,
        })
    }

    fn has_branch(&self) -> bool {
        self.members
            .values()
            .any(|m| matches!(m, Member::Branch(_)))
    }
}

/// Where a key resolves to, as returned by [`RingTree::find_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocation {
    /// Id of the leaf responsible for the key.
    pub node_id: String,
    /// Id of the ring directly containing that leaf.
    pub ring_id: String,
    /// Level of that ring.
    pub ring_level: u32,
    /// The vnode hash the key resolves to.
    pub vnode: u32,
    /// The key's hash at `ring_level`.
    pub key_hash: u32,
}

/// Internal resolution result; holds the leaf's parent ring for locking.
struct Located {
    ring: Arc<Ring>,
    node_id: String,
    vnode: u32,
    key_hash: u32,
}

// ---------------------------------------------------------------------------
// Ring
// ---------------------------------------------------------------------------

pub(crate) struct Ring {
    id: String,
    level: u32,
    max_count: usize,
    // Both links are weak: the members map is the only owner of sub-rings,
    // so dropping the tree drops every descendant without cycles.
    me: Weak<Ring>,
    parent: Weak<Ring>,
    ctx: Arc<TreeContext>,
    state: RwLock<RingState>,
}

impl Ring {
    pub(crate) fn new_root(ctx: Arc<TreeContext>, max_count: usize) -> Arc<Self> {
        let backing = ctx.backing;
        Arc::new_cyclic(|me| Self {
            id: "main".to_owned(),
            level: 0,
            max_count: max_count.max(2),
            me: me.clone(),
            parent: Weak::new(),
            ctx,
            state: RwLock::new(RingState {
                circle: new_circle(backing),
                members: FxHashMap::default(),
            }),
        })
    }

    fn new_child(parent: &Ring, id: String) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            level: parent.level + 1,
            max_count: parent.max_count * parent.ctx.branch_factor,
            me: me.clone(),
            parent: parent.me.clone(),
            ctx: Arc::clone(&parent.ctx),
            state: RwLock::new(RingState {
                circle: new_circle(parent.ctx.backing),
                members: FxHashMap::default(),
            }),
        })
    }

    /// An owning handle to this ring. Every ring is constructed inside an
    /// `Arc`, and `&self` proves it is still alive.
    fn handle(&self) -> Arc<Ring> {
        self.me.upgrade().expect("ring outlives its self-reference")
    }

    fn parent(&self) -> Option<Arc<Ring>> {
        self.parent.upgrade()
    }

    /// Resolves the leaf responsible for `key`, descending through branches.
    ///
    /// Each ring is read-locked only while it is being inspected; the lock
    /// is released before descending into a child.
    fn locate(&self, key: &str) -> Result<Located> {
        let child = {
            let state = self.state.read();
            if state.members.is_empty() {
                return Err(RingError::EmptyRing);
            }
            let key_hash = hash32(key, self.level);
            let (vnode, owner) = state
                .circle
                .find_closest(key_hash)
                .ok_or(RingError::InvariantViolation(
                    "populated ring with an empty circle",
                ))?;
            match state.members.get(owner) {
                Some(Member::Leaf(_)) => {
                    return Ok(Located {
                        ring: self.handle(),
                        node_id: owner.to_owned(),
                        vnode,
                        key_hash,
                    });
                }
                Some(Member::Branch(sub)) => Arc::clone(sub),
                None => {
                    return Err(RingError::InvariantViolation(
                        "circle entry does not resolve to a member",
                    ));
                }
            }
        };
        child.locate(key)
    }

    /// Adds a leaf member and its `replicas` vnodes, remapping keys onto
    /// each new vnode as it lands.
    fn insert_node(&self, node: Node) -> Result<()> {
        let start = Instant::now();
        let mut state = self.state.write();
        if state.members.len() >= self.max_count {
            return Err(RingError::CapacityExceeded {
                limit: self.max_count,
            });
        }
        if state.members.contains_key(node.id()) {
            return Err(RingError::DuplicateNode(node.id().to_owned()));
        }

        let id = node.id().to_owned();
        state.members.insert(id.clone(), Member::Leaf(node));

        for replica in 0..self.ctx.replicas {
            let vnode = hash32(&id, replica as u32);
            {
                let RingState { circle, members } = &mut *state;
                if !circle.insert(vnode, &id) {
                    trace!(ring = %self.id, vnode, "vnode hash collision ignored");
                    continue;
                }
                circle.sort();
                if let Some(Member::Leaf(n)) = members.get_mut(&id) {
                    n.register_vnode(vnode);
                }
            }
            // Keys can live on this ring's leaves or anywhere below a
            // branch member; either way the new vnode may now own them.
            if state.members.len() > 1 && (!state.no_leaf_holds_keys() || state.has_branch()) {
                self.remap_new_vnode(&mut state, &id, vnode)?;
            }
        }

        self.ctx.stats.node_added();
        self.ctx.stats.end_remap_epoch();
        debug!(ring = %self.id, level = self.level, node = %id, "node joined ring");
        self.ctx.observe(Op::InsertNode, start);
        Ok(())
    }

    /// Pulls onto the just-inserted vnode every key in its new arc, taking
    /// them from the next-clockwise vnode's owner.
    fn remap_new_vnode(&self, state: &mut RingState, new_id: &str, new_vnode: u32) -> Result<()> {
        let (next_vnode, next_id) = match state.circle.find_next_closest(new_vnode) {
            Some((hash, id)) => (hash, id.to_owned()),
            None => return Ok(()),
        };

        let from_branch = match state.members.get(&next_id) {
            Some(Member::Leaf(_)) => None,
            Some(Member::Branch(sub)) => Some(Arc::clone(sub)),
            None => {
                return Err(RingError::InvariantViolation(
                    "successor vnode has no owning member",
                ));
            }
        };

        let moved = match from_branch {
            None => {
                let Some(Member::Leaf(next)) = state.members.get_mut(&next_id) else {
                    return Err(RingError::InvariantViolation(
                        "successor changed kind during remap",
                    ));
                };
                let picked: Vec<(String, u32)> = next
                    .vnode_keys(next_vnode)
                    .map(|set| {
                        set.iter()
                            .filter(|&(_, &key_hash)| should_move(key_hash, new_vnode, next_vnode))
                            .map(|(key, &key_hash)| (key.clone(), key_hash))
                            .collect()
                    })
                    .unwrap_or_default();
                for (key, _) in &picked {
                    next.remove_key(next_vnode, key);
                }
                picked
            }
            Some(sub) => {
                // The successor is a sub-ring: examine every key beneath it,
                // re-hashed at this ring's level. A sub-ring owns many arcs,
                // so membership in the new vnode's arc is decided against
                // the circle itself rather than the pairwise predicate.
                let mut picked = Vec::new();
                Self::drain_subtree_matches(
                    &sub,
                    self.level,
                    new_vnode,
                    state.circle.as_ref(),
                    &mut picked,
                )?;
                picked
            }
        };

        if moved.is_empty() {
            return Ok(());
        }
        let Some(Member::Leaf(dest)) = state.members.get_mut(new_id) else {
            return Err(RingError::InvariantViolation(
                "remap destination is not a leaf",
            ));
        };
        trace!(
            ring = %self.id,
            vnode = new_vnode,
            moved = moved.len(),
            "keys remapped onto new vnode"
        );
        for (key, key_hash) in moved {
            dest.store_key(new_vnode, key, key_hash);
            self.ctx.stats.key_remapped();
        }
        Ok(())
    }

    /// Walks every leaf below `ring`, removing keys whose hash at
    /// `outer_level` now resolves to the freshly-inserted vnode on
    /// `outer_circle`. The sub-ring keeps its structure; only key sets
    /// shrink. Locks are acquired per ring on the way down, never across
    /// the whole recursion.
    fn drain_subtree_matches(
        ring: &Arc<Ring>,
        outer_level: u32,
        new_vnode: u32,
        outer_circle: &dyn Circle,
        out: &mut Vec<(String, u32)>,
    ) -> Result<()> {
        let mut deeper = Vec::new();
        {
            let mut state = ring.state.write();
            for member in state.members.values_mut() {
                match member {
                    Member::Leaf(node) => {
                        for vnode in node.vnode_hashes() {
                            let picked: Vec<(String, u32)> = node
                                .vnode_keys(vnode)
                                .map(|set| {
                                    set.keys()
                                        .filter_map(|key| {
                                            let rehash = hash32(key, outer_level);
                                            let claimed = outer_circle
                                                .find_closest(rehash)
                                                .is_some_and(|(hash, _)| hash == new_vnode);
                                            claimed.then(|| (key.clone(), rehash))
                                        })
                                        .collect()
                                })
                                .unwrap_or_default();
                            for (key, _) in &picked {
                                node.remove_key(vnode, key);
                            }
                            out.extend(picked);
                        }
                    }
                    Member::Branch(sub) => deeper.push(Arc::clone(sub)),
                }
            }
        }
        for sub in deeper {
            Self::drain_subtree_matches(&sub, outer_level, new_vnode, outer_circle, out)?;
        }
        Ok(())
    }

    /// Removes a leaf member, migrating its keys to their next-clockwise
    /// owners, or collapses the ring when it is about to lose its last
    /// distinct member.
    fn remove_node(&self, node_id: &str) -> Result<()> {
        let start = Instant::now();
        {
            let state = self.state.read();
            if state.members.len() <= 1 && self.parent().is_none() {
                return Err(RingError::NotEnoughMembers);
            }
            if !state.members.contains_key(node_id) {
                return Err(RingError::NodeNotFound(node_id.to_owned()));
            }
            if state.should_collapse(self.parent().is_some()) {
                drop(state);
                return self.collapse_into_parent(node_id);
            }
        }

        let mut state = self.state.write();
        let RingState { circle, members } = &mut *state;
        let vnodes = match members.get(node_id) {
            Some(Member::Leaf(node)) => node.vnode_hashes(),
            Some(Member::Branch(_)) => return Err(RingError::NodeNotFound(node_id.to_owned())),
            None => return Err(RingError::NodeNotFound(node_id.to_owned())),
        };

        for vnode in vnodes {
            let occupied = matches!(
                members.get(node_id),
                Some(Member::Leaf(node)) if node.has_keys_on(vnode)
            );
            if occupied {
                // Successor owned by another member. The cursor advances
                // from the previous successor's hash; coming back around to
                // the starting vnode means no other member owns anything.
                let (next_vnode, next_id) = {
                    let mut cursor = vnode;
                    loop {
                        let Some((hash, id)) = circle.find_next_closest(cursor) else {
                            return Err(RingError::InvariantViolation(
                                "successor search on an empty circle",
                            ));
                        };
                        if id != node_id {
                            break (hash, id.to_owned());
                        }
                        if hash == vnode {
                            return Err(RingError::InvariantViolation(
                                "no successor owned by another member",
                            ));
                        }
                        cursor = hash;
                    }
                };

                let moved = match members.get_mut(node_id) {
                    Some(Member::Leaf(node)) => node.take_keys_on(vnode),
                    _ => Vec::new(),
                };
                trace!(
                    ring = %self.id,
                    from = vnode,
                    to = next_vnode,
                    moved = moved.len(),
                    "draining vnode"
                );
                match members.get_mut(&next_id) {
                    Some(Member::Leaf(dest)) => {
                        for (key, key_hash) in moved {
                            dest.store_key(next_vnode, key, key_hash);
                            self.ctx.stats.key_remapped();
                        }
                    }
                    Some(Member::Branch(sub)) => {
                        let sub = Arc::clone(sub);
                        for (key, _) in moved {
                            self.ctx.stats.key_removed();
                            self.ctx.stats.key_remapped();
                            sub.insert_key(&key)?;
                        }
                    }
                    None => {
                        return Err(RingError::InvariantViolation(
                            "successor vnode has no owning member",
                        ));
                    }
                }
            }

            if let Some(Member::Leaf(node)) = members.get_mut(node_id) {
                node.drop_vnode(vnode);
            }
            circle.delete(vnode);
        }
        circle.sort();

        let remaining = match members.get(node_id) {
            Some(Member::Leaf(node)) => node.load(),
            _ => 0,
        };
        if remaining != 0 {
            return Err(RingError::DrainFailure {
                node: node_id.to_owned(),
                remaining,
            });
        }
        members.remove(node_id);
        self.ctx.stats.node_removed();
        self.ctx.stats.end_remap_epoch();
        debug!(ring = %self.id, level = self.level, node = %node_id, "node left ring");
        self.ctx.observe(Op::RemoveNode, start);
        Ok(())
    }

    /// Replaces this sub-ring with a single leaf in its parent, then pushes
    /// every gathered key back through the parent. The parent's circle
    /// keeps the vnode entries registered under this ring's id; they now
    /// resolve to the replacement leaf.
    fn collapse_into_parent(&self, hint_node_id: &str) -> Result<()> {
        let start = Instant::now();
        let parent = self.parent().ok_or(RingError::RootCollapse)?;

        let gathered: Vec<String> = {
            let mut parent_state = parent.state.write();
            let mut state = self.state.write();

            if state.members.len() > 2 {
                return Err(RingError::InvariantViolation(
                    "collapse attempted on a ring with more than two members",
                ));
            }
            if state.has_branch() {
                return Err(RingError::InvariantViolation(
                    "collapse attempted on a ring holding a sub-ring",
                ));
            }
            let threshold = match state.members.get(hint_node_id) {
                Some(Member::Leaf(node)) => node.threshold(),
                _ => return Err(RingError::NodeNotFound(hint_node_id.to_owned())),
            };

            let mut gathered = Vec::new();
            for member in state.members.values_mut() {
                if let Member::Leaf(node) = member {
                    gathered.extend(node.drain_all_keys().into_iter().map(|(key, _)| key));
                    self.ctx.stats.node_removed();
                }
            }
            state.members.clear();

            let mut replacement = Node::new(self.id.clone(), threshold);
            for replica in 0..self.ctx.replicas {
                replacement.register_vnode(hash32(&self.id, replica as u32));
            }
            parent_state
                .members
                .insert(self.id.clone(), Member::Leaf(replacement));
            self.ctx.stats.node_added();

            for _ in &gathered {
                self.ctx.stats.key_removed();
            }
            gathered
        };

        debug!(
            ring = %self.id,
            level = self.level,
            keys = gathered.len(),
            "collapsed sub-ring into parent leaf"
        );
        for key in &gathered {
            parent.insert_key(key)?;
        }
        self.ctx.observe(Op::Collapse, start);
        Ok(())
    }

    /// Promotes an overloaded leaf into a sub-ring under the same id.
    ///
    /// The parent's write lock is held for the whole transition, so
    /// concurrent descents block until the sub-ring is populated; the
    /// replacement itself is one map write, and the id keeps resolving
    /// throughout.
    fn split_node(&self, node_id: &str) -> Result<Arc<Ring>> {
        let start = Instant::now();
        let mut state = self.state.write();
        match state.members.get(node_id) {
            Some(Member::Leaf(_)) => {}
            // Another writer already split this leaf; reuse its ring.
            Some(Member::Branch(sub)) => return Ok(Arc::clone(sub)),
            None => return Err(RingError::NodeNotFound(node_id.to_owned())),
        }

        let sub = Ring::new_child(self, node_id.to_owned());
        let replaced = state
            .members
            .insert(node_id.to_owned(), Member::Branch(Arc::clone(&sub)));
        let Some(Member::Leaf(mut old_node)) = replaced else {
            return Err(RingError::InvariantViolation(
                "split target changed kind during replacement",
            ));
        };
        self.ctx.stats.node_removed();
        debug!(
            ring = %self.id,
            node = %node_id,
            level = self.level + 1,
            "promoted overloaded leaf to sub-ring"
        );

        sub.insert_node(Node::new("", old_node.threshold()))?;
        sub.insert_node(Node::new("", old_node.threshold()))?;

        for (key, _) in old_node.drain_all_keys() {
            self.ctx.stats.key_removed();
            sub.insert_key(&key)?;
        }
        drop(state);

        self.ctx.stats.end_remap_epoch();
        self.ctx.observe(Op::Split, start);
        Ok(sub)
    }

    /// Stores a key on its resolved leaf, growing the structure when the
    /// leaf cannot take it.
    fn insert_key(&self, key: &str) -> Result<()> {
        let start = Instant::now();
        let located = self.locate(key)?;
        let ring = located.ring;

        enum Recovery {
            Sibling(usize),
            Split,
        }

        let recovery = {
            let mut state = ring.state.write();
            match state.members.get_mut(&located.node_id) {
                Some(Member::Leaf(node)) => {
                    if node.contains_key_on(located.vnode, key) {
                        return Err(RingError::DuplicateKey(key.to_owned()));
                    }
                    if node.load() < node.threshold() {
                        node.store_key(located.vnode, key.to_owned(), located.key_hash);
                        self.ctx.stats.key_added();
                        drop(state);
                        self.ctx.observe(Op::InsertKey, start);
                        return Ok(());
                    }
                    let threshold = node.threshold();
                    if state.members.len() < ring.max_count {
                        Recovery::Sibling(threshold)
                    } else {
                        Recovery::Split
                    }
                }
                // The leaf was split or removed between locate and lock;
                // resolve again from the same ring.
                Some(Member::Branch(sub)) => {
                    let sub = Arc::clone(sub);
                    drop(state);
                    return sub.insert_key(key);
                }
                None => {
                    drop(state);
                    return ring.insert_key(key);
                }
            }
        };

        match recovery {
            Recovery::Sibling(threshold) => {
                debug!(ring = %ring.id, level = ring.level, "leaf overloaded, adding sibling");
                match ring.insert_node(Node::new("", threshold)) {
                    Ok(()) => {}
                    // Another writer filled the ring first; the retry below
                    // takes the split path instead.
                    Err(RingError::CapacityExceeded { .. }) => {}
                    Err(err) => return Err(err),
                }
                ring.insert_key(key)
            }
            Recovery::Split => {
                let sub = ring.split_node(&located.node_id)?;
                sub.insert_key(key)
            }
        }
    }

    /// Removes a key from its resolved leaf, shrinking the structure when
    /// the leaf underflows.
    fn remove_key(&self, key: &str) -> Result<()> {
        let start = Instant::now();
        let located = self.locate(key)?;
        let ring = located.ring;

        let underflowed = {
            let mut state = ring.state.write();
            match state.members.get_mut(&located.node_id) {
                Some(Member::Leaf(node)) => {
                    if !node.remove_key(located.vnode, key) {
                        return Err(RingError::KeyNotFound(key.to_owned()));
                    }
                    self.ctx.stats.key_removed();
                    node.is_underflowed()
                }
                Some(Member::Branch(sub)) => {
                    let sub = Arc::clone(sub);
                    drop(state);
                    return sub.remove_key(key);
                }
                None => return Err(RingError::KeyNotFound(key.to_owned())),
            }
        };
        self.ctx.observe(Op::RemoveKey, start);

        // The underflow rule is skipped for direct children of the root to
        // preserve the minimum fan-out.
        if underflowed && ring.parent().is_some() {
            return ring.remove_node(&located.node_id);
        }
        Ok(())
    }

    /// Pure resolver: the id of the leaf holding `key`.
    fn lookup(&self, key: &str) -> Result<String> {
        let start = Instant::now();
        let located = self.locate(key)?;
        let state = located.ring.state.read();
        match state.members.get(&located.node_id) {
            Some(Member::Leaf(node)) if node.contains_key_on(located.vnode, key) => {
                drop(state);
                self.ctx.observe(Op::Lookup, start);
                Ok(located.node_id)
            }
            _ => Err(RingError::KeyNotFound(key.to_owned())),
        }
    }

    /// Applies `op` to every leaf in this ring's subtree, descending into
    /// branches in parallel. When `level` is 0 the walk also propagates
    /// upward through the parent chain, re-descending from each ancestor.
    fn traverse<F>(&self, op: &F, level: u32)
    where
        F: Fn(&Node) + Sync,
    {
        {
            let state = self.state.read();
            std::thread::scope(|scope| {
                for member in state.members.values() {
                    match member {
                        Member::Leaf(node) => op(node),
                        Member::Branch(sub) => {
                            let sub = Arc::clone(sub);
                            scope.spawn(move || sub.traverse(op, level + 1));
                        }
                    }
                }
            });
        }
        if level == 0 {
            let mut ancestor = self.parent();
            while let Some(ring) = ancestor {
                ring.traverse(op, 1);
                ancestor = ring.parent();
            }
        }
    }

    /// Delivers `message` to this ring and every member below it, branches
    /// in parallel. The scope join is the completion barrier.
    fn gossip_down(&self, message: &str) {
        trace!(ring = %self.id, message, "gossip received");
        self.ctx.stats.gossip_delivered();
        let state = self.state.read();
        std::thread::scope(|scope| {
            for member in state.members.values() {
                match member {
                    Member::Leaf(node) => {
                        scope.spawn(move || {
                            node.receive_message(message);
                            self.ctx.stats.gossip_delivered();
                        });
                    }
                    Member::Branch(sub) => {
                        let sub = Arc::clone(sub);
                        scope.spawn(move || sub.gossip_down(message));
                    }
                }
            }
        });
    }

    fn snapshot(&self) -> RingSnapshot {
        let state = self.state.read();
        RingSnapshot {
            id: self.id.clone(),
            level: self.level,
            max_count: self.max_count,
            circle: state.circle.entries(),
            members: state
                .members
                .values()
                .map(|member| match member {
                    Member::Leaf(node) => MemberSnapshot::Leaf(node.snapshot()),
                    Member::Branch(sub) => MemberSnapshot::Ring(sub.snapshot()),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Recursive point-in-time view of a ring and everything below it.
#[derive(Debug, Clone)]
pub struct RingSnapshot {
    pub id: String,
    pub level: u32,
    pub max_count: usize,
    /// Hash-ordered circle entries.
    pub circle: Vec<VNode>,
    pub members: Vec<MemberSnapshot>,
}

/// One member in a [`RingSnapshot`].
#[derive(Debug, Clone)]
pub enum MemberSnapshot {
    Leaf(LeafSnapshot),
    Ring(RingSnapshot),
}

impl RingSnapshot {
    /// Maximum level of any ring in this subtree.
    pub fn depth(&self) -> u32 {
        self.members
            .iter()
            .filter_map(|m| match m {
                MemberSnapshot::Ring(sub) => Some(sub.depth()),
                MemberSnapshot::Leaf(_) => None,
            })
            .max()
            .unwrap_or(self.level)
    }

    /// Leaf loads directly on this ring, skipping sub-rings.
    pub fn leaf_loads(&self) -> Vec<usize> {
        self.members
            .iter()
            .filter_map(|m| match m {
                MemberSnapshot::Leaf(leaf) => Some(leaf.load),
                MemberSnapshot::Ring(_) => None,
            })
            .collect()
    }

    /// Sum of all key counts in this subtree.
    pub fn total_load(&self) -> usize {
        self.members
            .iter()
            .map(|m| match m {
                MemberSnapshot::Leaf(leaf) => leaf.load,
                MemberSnapshot::Ring(sub) => sub.total_load(),
            })
            .sum()
    }

    fn visit_rings<'a>(&'a self, f: &mut impl FnMut(&'a RingSnapshot)) {
        f(self);
        for member in &self.members {
            if let MemberSnapshot::Ring(sub) = member {
                sub.visit_rings(f);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// A hierarchical consistent-hash ring tree.
///
/// Cloning is cheap and yields another handle onto the same tree; all
/// operations are safe to call from multiple threads.
///
/// # Example
///
/// ```
/// use ringtree::{Node, RingTree};
///
/// let tree = RingTree::new(4);
/// tree.insert_node(Node::new("server-1", 100)).unwrap();
/// tree.insert_key("user:42").unwrap();
/// assert_eq!(tree.lookup("user:42").unwrap(), "server-1");
/// ```
#[derive(Clone)]
pub struct RingTree {
    root: Arc<Ring>,
}

impl RingTree {
    /// Creates a tree with default tuning. `max_count` floors to 2.
    pub fn new(max_count: usize) -> Self {
        RingTreeBuilder::new(max_count).build()
    }

    pub(crate) fn from_root(root: Arc<Ring>) -> Self {
        Self { root }
    }

    /// Adds a leaf node to the root ring.
    pub fn insert_node(&self, node: Node) -> Result<()> {
        self.root.insert_node(node)
    }

    /// Removes a leaf from the root ring, draining its keys to their
    /// next-clockwise owners.
    pub fn remove_node(&self, node_id: &str) -> Result<()> {
        self.root.remove_node(node_id)
    }

    /// Inserts a key, growing the structure on overflow.
    pub fn insert_key(&self, key: &str) -> Result<()> {
        self.root.insert_key(key)
    }

    /// Removes a key, shrinking the structure on underflow.
    pub fn remove_key(&self, key: &str) -> Result<()> {
        self.root.remove_key(key)
    }

    /// Returns the id of the leaf holding `key`.
    pub fn lookup(&self, key: &str) -> Result<String> {
        self.root.lookup(key)
    }

    /// Resolves where `key` would live without asserting residency.
    pub fn find_node(&self, key: &str) -> Result<KeyLocation> {
        let located = self.root.locate(key)?;
        Ok(KeyLocation {
            node_id: located.node_id,
            ring_id: located.ring.id.clone(),
            ring_level: located.ring.level,
            vnode: located.vnode,
            key_hash: located.key_hash,
        })
    }

    /// Ids of the root ring's members.
    pub fn members(&self) -> Vec<String> {
        self.root.state.read().members.keys().cloned().collect()
    }

    /// Number of members (leaves and sub-rings) on the root ring.
    pub fn size(&self) -> usize {
        self.root.state.read().members.len()
    }

    /// True when no leaf directly on the root ring holds keys.
    pub fn is_empty(&self) -> bool {
        self.root.state.read().no_leaf_holds_keys()
    }

    /// Invokes `op` on every leaf reachable from the root; sub-rings are
    /// walked in parallel and joined before returning.
    pub fn traversal<F>(&self, op: F, starting_level: u32)
    where
        F: Fn(&Node) + Sync,
    {
        self.root.traverse(&op, starting_level);
    }

    /// Delivers `message` to every node and ring in parallel, returning
    /// once every delivery completed.
    pub fn parallel_gossip(&self, message: &str) {
        self.root.gossip_down(message);
    }

    /// Point-in-time view of the whole hierarchy.
    pub fn snapshot(&self) -> RingSnapshot {
        self.root.snapshot()
    }

    /// Maximum ring level currently present.
    pub fn depth(&self) -> u32 {
        self.snapshot().depth()
    }

    /// Per-level node and ring counts, plus the global counters.
    pub fn hierarchy(&self) -> HierarchyReport {
        let snapshot = self.snapshot();
        let mut levels: FxHashMap<u32, LevelReport> = FxHashMap::default();
        snapshot.visit_rings(&mut |ring| {
            let entry = levels.entry(ring.level).or_insert(LevelReport {
                level: ring.level,
                nodes: 0,
                rings: 0,
            });
            entry.rings += 1;
            entry.nodes += ring
                .members
                .iter()
                .filter(|m| matches!(m, MemberSnapshot::Leaf(_)))
                .count();
        });
        let mut levels: Vec<LevelReport> = levels.into_values().collect();
        levels.sort_unstable_by_key(|l| l.level);
        let counters = self.root.ctx.stats.counters();
        HierarchyReport {
            depth: snapshot.depth(),
            levels,
            nodes: counters.nodes,
            keys: counters.keys,
        }
    }

    /// Total load and per-leaf loads of the root ring, skipping sub-rings.
    pub fn loads(&self) -> (usize, Vec<usize>) {
        let loads = self.snapshot().leaf_loads();
        (loads.iter().sum(), loads)
    }

    /// Load reports for every ring in the tree, children before parents.
    pub fn total_loads(&self) -> Vec<RingLoadReport> {
        fn gather(snapshot: &RingSnapshot, out: &mut Vec<RingLoadReport>) -> usize {
            let mut loads = Vec::new();
            for member in &snapshot.members {
                match member {
                    MemberSnapshot::Leaf(leaf) => loads.push(leaf.load),
                    MemberSnapshot::Ring(sub) => loads.push(gather(sub, out)),
                }
            }
            let total = loads.iter().sum();
            let (mean, variance, stddev) = load_distribution(&loads);
            out.push(RingLoadReport {
                id: snapshot.id.clone(),
                level: snapshot.level,
                loads,
                total,
                mean,
                variance,
                stddev,
            });
            total
        }
        let snapshot = self.snapshot();
        let mut out = Vec::new();
        gather(&snapshot, &mut out);
        out
    }

    /// Every leaf load in the tree with system-wide distribution stats.
    pub fn system_load(&self) -> LoadSummary {
        let snapshot = self.snapshot();
        let mut loads = Vec::new();
        snapshot.visit_rings(&mut |ring| loads.extend(ring.leaf_loads()));
        let (mean, variance, stddev) = load_distribution(&loads);
        LoadSummary {
            loads,
            mean,
            variance,
            stddev,
        }
    }

    /// Tree-wide counters: nodes, keys, remapped keys, gossip deliveries.
    pub fn counters(&self) -> crate::stats::CounterSnapshot {
        self.root.ctx.stats.counters()
    }

    /// Aggregated remap behavior over all structural events.
    pub fn remap_stats(&self) -> crate::stats::RemapStats {
        self.root.ctx.stats.remap_stats()
    }
}
