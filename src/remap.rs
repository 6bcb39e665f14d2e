//! Arc membership test for the remap engine.
//!
//! When a vnode is inserted, every key on the next-clockwise vnode is
//! examined: the key moves to the new vnode exactly when its hash falls into
//! the arc the new vnode now owns. Two geometries exist depending on whether
//! the new vnode sits before or after its successor on the circle.

/// Decides whether a key on the successor vnode belongs to a newly-added
/// vnode.
///
/// `new_vnode` is the hash just inserted; `next_vnode` is its next-clockwise
/// neighbor at the time of insertion.
///
/// Non-wrap case (`next_vnode >= new_vnode`): the key moves when it hashes
/// at or before the new vnode, or past both vnodes (the new vnode is the
/// circle minimum and owns the wrap arc).
///
/// Wrap case (`next_vnode < new_vnode`): the successor is across the zero
/// point; the key moves when it sits in `(next_vnode, new_vnode]`.
pub(crate) fn should_move(key_hash: u32, new_vnode: u32, next_vnode: u32) -> bool {
    if next_vnode < new_vnode {
        key_hash <= new_vnode && key_hash > next_vnode
    } else {
        key_hash <= new_vnode || (key_hash > new_vnode && key_hash > next_vnode)
    }
}
