//! Leaf nodes: bounded key holders at the bottom of the tree.
//!
//! A `Node` is the physical-server analogue. It owns a multiset of keys
//! partitioned across its registered virtual-node hashes, tracks `load`
//! (total resident keys), and carries the `threshold` at which it counts as
//! overloaded. Keys are stored with their level-specific hash so remapping
//! within the same ring never re-hashes.
//!
//! Invariants kept by every mutator:
//! - the outer key-map's key set equals the set of registered vnode hashes,
//! - `load` equals the sum of the inner key-set sizes.

use rustc_hash::FxHashMap;

use crate::id::generate_node_id;

/// Snapshot of one leaf, used by [`crate::ring::RingTree::snapshot`].
#[derive(Debug, Clone)]
pub struct LeafSnapshot {
    pub id: String,
    pub load: usize,
    pub threshold: usize,
    pub vnodes: Vec<u32>,
    pub keys: Vec<(u32, Vec<String>)>,
}

/// A leaf node holding keys under its virtual nodes.
#[derive(Debug)]
pub struct Node {
    id: String,
    threshold: usize,
    load: usize,
    keys: FxHashMap<u32, FxHashMap<String, u32>>,
}

impl Node {
    /// Creates a node with the given id and overload threshold.
    ///
    /// An empty id is replaced with a generated
    /// `"node" + base64url(20 random bytes)` identifier. The threshold is
    /// floored to 1.
    pub fn new(id: impl Into<String>, threshold: usize) -> Self {
        let id = id.into();
        let id = if id.is_empty() { generate_node_id() } else { id };
        Self {
            id,
            threshold: threshold.max(1),
            load: 0,
            keys: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Count of keys currently resident on this node.
    pub fn load(&self) -> usize {
        self.load
    }

    /// `load >= threshold`: the node cannot accept another key.
    pub fn is_overloaded(&self) -> bool {
        self.load >= self.threshold
    }

    /// `load <= floor(0.1 * threshold)`: removal may trigger a structural
    /// shrink.
    pub fn is_underflowed(&self) -> bool {
        self.load <= self.threshold / 10
    }

    /// Delivery hook used by [`crate::ring::RingTree::parallel_gossip`].
    pub fn receive_message(&self, message: &str) {
        tracing::trace!(node = %self.id, message, "gossip received");
    }

    pub(crate) fn register_vnode(&mut self, vnode: u32) {
        self.keys.entry(vnode).or_default();
    }

    pub(crate) fn vnode_hashes(&self) -> Vec<u32> {
        self.keys.keys().copied().collect()
    }

    pub(crate) fn contains_key_on(&self, vnode: u32, key: &str) -> bool {
        self.keys
            .get(&vnode)
            .is_some_and(|set| set.contains_key(key))
    }

    pub(crate) fn has_keys_on(&self, vnode: u32) -> bool {
        self.keys.get(&vnode).is_some_and(|set| !set.is_empty())
    }

    pub(crate) fn vnode_keys(&self, vnode: u32) -> Option<&FxHashMap<String, u32>> {
        self.keys.get(&vnode)
    }

    /// Stores a key under `vnode`, allocating the inner set on first touch.
    pub(crate) fn store_key(&mut self, vnode: u32, key: String, key_hash: u32) {
        let previous = self.keys.entry(vnode).or_default().insert(key, key_hash);
        debug_assert!(previous.is_none(), "store_key overwrote a resident key");
        self.load += 1;
    }

    /// Removes a key from `vnode`. Returns `false` when it was not there.
    pub(crate) fn remove_key(&mut self, vnode: u32, key: &str) -> bool {
        let removed = self
            .keys
            .get_mut(&vnode)
            .and_then(|set| set.remove(key))
            .is_some();
        if removed {
            self.load -= 1;
        }
        removed
    }

    /// Drains every key stored under `vnode`, keeping the vnode registered.
    pub(crate) fn take_keys_on(&mut self, vnode: u32) -> Vec<(String, u32)> {
        let drained: Vec<(String, u32)> = self
            .keys
            .get_mut(&vnode)
            .map(|set| set.drain().collect())
            .unwrap_or_default();
        self.load -= drained.len();
        drained
    }

    /// Unregisters `vnode` entirely, dropping any keys still on it.
    pub(crate) fn drop_vnode(&mut self, vnode: u32) {
        if let Some(set) = self.keys.remove(&vnode) {
            self.load -= set.len();
        }
    }

    /// Drains every key on the node, leaving all vnodes registered but empty.
    pub(crate) fn drain_all_keys(&mut self) -> Vec<(String, u32)> {
        let mut out = Vec::with_capacity(self.load);
        for set in self.keys.values_mut() {
            out.extend(set.drain());
        }
        self.load = 0;
        out
    }

    pub(crate) fn snapshot(&self) -> LeafSnapshot {
        let mut vnodes = self.vnode_hashes();
        vnodes.sort_unstable();
        let mut keys: Vec<(u32, Vec<String>)> = self
            .keys
            .iter()
            .map(|(&vnode, set)| {
                let mut names: Vec<String> = set.keys().cloned().collect();
                names.sort_unstable();
                (vnode, names)
            })
            .collect();
        keys.sort_unstable_by_key(|(vnode, _)| *vnode);
        LeafSnapshot {
            id: self.id.clone(),
            load: self.load,
            threshold: self.threshold,
            vnodes,
            keys,
        }
    }
}
