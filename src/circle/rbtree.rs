//! Red-black tree circle backing.
//!
//! A left-leaning red-black tree keyed by vnode hash. Insert and delete are
//! the standard recursive 2-3 tree algorithms; successor queries walk down
//! from the root keeping the best candidate seen so far. Size is maintained
//! incrementally. The tree re-balances on every mutation, so
//! [`Circle::sort`] is a no-op.
//!
//! `debug_validate_invariants()` is available in debug/test builds and
//! checks ordering, black-height balance, and that red links lean left.

use crate::circle::{Circle, VNode};

type Link = Option<Box<RbNode>>;

#[derive(Debug)]
struct RbNode {
    hash: u32,
    id: String,
    red: bool,
    left: Link,
    right: Link,
}

#[derive(Debug, Default)]
pub struct RbTreeCircle {
    root: Link,
    size: usize,
}

fn is_red(link: &Link) -> bool {
    link.as_ref().is_some_and(|n| n.red)
}

fn rotate_left(mut h: Box<RbNode>) -> Box<RbNode> {
    let mut x = h.right.take().expect("rotate_left requires a right child");
    h.right = x.left.take();
    x.red = h.red;
    h.red = true;
    x.left = Some(h);
    x
}

fn rotate_right(mut h: Box<RbNode>) -> Box<RbNode> {
    let mut x = h.left.take().expect("rotate_right requires a left child");
    h.left = x.right.take();
    x.red = h.red;
    h.red = true;
    x.right = Some(h);
    x
}

fn flip_colors(h: &mut RbNode) {
    h.red = !h.red;
    if let Some(left) = h.left.as_mut() {
        left.red = !left.red;
    }
    if let Some(right) = h.right.as_mut() {
        right.red = !right.red;
    }
}

fn fix_up(mut h: Box<RbNode>) -> Box<RbNode> {
    if is_red(&h.right) {
        h = rotate_left(h);
    }
    if is_red(&h.left) && h.left.as_ref().is_some_and(|l| is_red(&l.left)) {
        h = rotate_right(h);
    }
    if is_red(&h.left) && is_red(&h.right) {
        flip_colors(&mut h);
    }
    h
}

fn move_red_left(mut h: Box<RbNode>) -> Box<RbNode> {
    flip_colors(&mut h);
    if h.right.as_ref().is_some_and(|r| is_red(&r.left)) {
        let right = h.right.take().expect("checked right child above");
        h.right = Some(rotate_right(right));
        h = rotate_left(h);
        flip_colors(&mut h);
    }
    h
}

fn move_red_right(mut h: Box<RbNode>) -> Box<RbNode> {
    flip_colors(&mut h);
    if h.left.as_ref().is_some_and(|l| is_red(&l.left)) {
        h = rotate_right(h);
        flip_colors(&mut h);
    }
    h
}

impl RbTreeCircle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tree root, exposed for structural tests.
    pub fn root_entry(&self) -> Option<(u32, &str)> {
        self.root.as_ref().map(|n| (n.hash, n.id.as_str()))
    }

    fn contains(&self, hash: u32) -> bool {
        let mut cur = self.root.as_deref();
        while let Some(n) = cur {
            if hash < n.hash {
                cur = n.left.as_deref();
            } else if hash > n.hash {
                cur = n.right.as_deref();
            } else {
                return true;
            }
        }
        false
    }

    fn min_entry(&self) -> Option<(u32, &str)> {
        let mut cur = self.root.as_deref()?;
        while let Some(left) = cur.left.as_deref() {
            cur = left;
        }
        Some((cur.hash, cur.id.as_str()))
    }

    fn insert_rec(link: Link, hash: u32, id: &str, inserted: &mut bool) -> Box<RbNode> {
        let mut h = match link {
            None => {
                *inserted = true;
                return Box::new(RbNode {
                    hash,
                    id: id.to_owned(),
                    red: true,
                    left: None,
                    right: None,
                });
            }
            Some(h) => h,
        };
        if hash < h.hash {
            h.left = Some(Self::insert_rec(h.left.take(), hash, id, inserted));
        } else if hash > h.hash {
            h.right = Some(Self::insert_rec(h.right.take(), hash, id, inserted));
        }
        fix_up(h)
    }

    fn delete_min(mut h: Box<RbNode>) -> (Link, Box<RbNode>) {
        if h.left.is_none() {
            return (None, h);
        }
        let left_left_red = h.left.as_ref().is_some_and(|l| is_red(&l.left));
        if !is_red(&h.left) && !left_left_red {
            h = move_red_left(h);
        }
        let left = h.left.take().expect("interior node keeps a left child");
        let (new_left, min) = Self::delete_min(left);
        h.left = new_left;
        (Some(fix_up(h)), min)
    }

    // Precondition: `hash` is present in the subtree rooted at `h`.
    fn delete_rec(mut h: Box<RbNode>, hash: u32) -> Link {
        if hash < h.hash {
            if h.left.is_some() {
                let left_left_red = h.left.as_ref().is_some_and(|l| is_red(&l.left));
                if !is_red(&h.left) && !left_left_red {
                    h = move_red_left(h);
                }
                let left = h.left.take().expect("guarded above");
                h.left = Self::delete_rec(left, hash);
            }
        } else {
            if is_red(&h.left) {
                h = rotate_right(h);
            }
            if hash == h.hash && h.right.is_none() {
                return None;
            }
            if h.right.is_some() {
                let right_left_red = h.right.as_ref().is_some_and(|r| is_red(&r.left));
                if !is_red(&h.right) && !right_left_red {
                    h = move_red_right(h);
                }
                if hash == h.hash {
                    let right = h.right.take().expect("guarded above");
                    let (new_right, min) = Self::delete_min(right);
                    h.hash = min.hash;
                    h.id = min.id;
                    h.right = new_right;
                } else {
                    let right = h.right.take().expect("guarded above");
                    h.right = Self::delete_rec(right, hash);
                }
            }
        }
        Some(fix_up(h))
    }

    fn collect_in_order(link: &Link, out: &mut Vec<VNode>) {
        if let Some(n) = link {
            Self::collect_in_order(&n.left, out);
            out.push(VNode {
                hash: n.hash,
                id: n.id.clone(),
            });
            Self::collect_in_order(&n.right, out);
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        fn walk(link: &Link, lo: Option<u32>, hi: Option<u32>) -> usize {
            match link {
                None => 1,
                Some(n) => {
                    if let Some(lo) = lo {
                        assert!(n.hash > lo, "ordering violated");
                    }
                    if let Some(hi) = hi {
                        assert!(n.hash < hi, "ordering violated");
                    }
                    assert!(!is_red(&n.right), "right-leaning red link");
                    if n.red {
                        assert!(!is_red(&n.left), "red node with red left child");
                    }
                    let left_height = walk(&n.left, lo, Some(n.hash));
                    let right_height = walk(&n.right, Some(n.hash), hi);
                    assert_eq!(left_height, right_height, "black height mismatch");
                    left_height + usize::from(!n.red)
                }
            }
        }
        assert!(!is_red(&self.root), "root must be black");
        walk(&self.root, None, None);
        assert_eq!(self.entries().len(), self.size, "size drifted");
    }
}

impl Circle for RbTreeCircle {
    fn insert(&mut self, hash: u32, id: &str) -> bool {
        let mut inserted = false;
        let mut root = Self::insert_rec(self.root.take(), hash, id, &mut inserted);
        root.red = false;
        self.root = Some(root);
        if inserted {
            self.size += 1;
        }
        inserted
    }

    fn delete(&mut self, hash: u32) -> bool {
        if !self.contains(hash) {
            return false;
        }
        let mut root = self.root.take().expect("contains implies a non-empty tree");
        if !is_red(&root.left) && !is_red(&root.right) {
            root.red = true;
        }
        self.root = Self::delete_rec(root, hash);
        if let Some(root) = self.root.as_mut() {
            root.red = false;
        }
        self.size -= 1;
        true
    }

    fn find_closest(&self, hash: u32) -> Option<(u32, &str)> {
        let mut best: Option<&RbNode> = None;
        let mut cur = self.root.as_deref();
        while let Some(n) = cur {
            if hash < n.hash {
                best = Some(n);
                cur = n.left.as_deref();
            } else if hash > n.hash {
                cur = n.right.as_deref();
            } else {
                return Some((n.hash, n.id.as_str()));
            }
        }
        match best {
            Some(n) => Some((n.hash, n.id.as_str())),
            None => self.min_entry(),
        }
    }

    fn find_next_closest(&self, hash: u32) -> Option<(u32, &str)> {
        let mut best: Option<&RbNode> = None;
        let mut cur = self.root.as_deref();
        while let Some(n) = cur {
            if hash < n.hash {
                best = Some(n);
                cur = n.left.as_deref();
            } else {
                cur = n.right.as_deref();
            }
        }
        match best {
            Some(n) => Some((n.hash, n.id.as_str())),
            None => self.min_entry(),
        }
    }

    fn len(&self) -> usize {
        self.size
    }

    fn entries(&self) -> Vec<VNode> {
        let mut out = Vec::with_capacity(self.size);
        Self::collect_in_order(&self.root, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    // Deterministic pseudo-random sequence; no seed plumbing needed.
    fn scrambled(count: u32) -> Vec<u32> {
        (0..count).map(|i| i.wrapping_mul(2_654_435_761)).collect()
    }

    #[test]
    fn balanced_after_ascending_inserts() {
        let mut tree = RbTreeCircle::new();
        for h in 0..256u32 {
            assert!(tree.insert(h, "n"));
            tree.debug_validate_invariants();
        }
        assert_eq!(tree.len(), 256);
    }

    #[test]
    fn balanced_after_scrambled_inserts_and_deletes() {
        let mut tree = RbTreeCircle::new();
        let hashes = scrambled(300);
        for &h in &hashes {
            assert!(tree.insert(h, "n"));
        }
        tree.debug_validate_invariants();

        for &h in hashes.iter().step_by(2) {
            assert!(tree.delete(h));
            tree.debug_validate_invariants();
        }
        assert_eq!(tree.len(), 150);

        for &h in hashes.iter().step_by(2) {
            assert!(!tree.delete(h));
        }
    }

    #[test]
    fn delete_to_empty_and_reuse() {
        let mut tree = RbTreeCircle::new();
        for &h in &[5u32, 3, 8, 1, 4] {
            tree.insert(h, "x");
        }
        for &h in &[3u32, 1, 8, 5, 4] {
            assert!(tree.delete(h));
            tree.debug_validate_invariants();
        }
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.root_entry(), None);
        assert_eq!(tree.find_closest(0), None);

        assert!(tree.insert(7, "again"));
        assert_eq!(tree.root_entry(), Some((7, "again")));
    }

    #[test]
    fn successor_queries_match_ordered_model() {
        let mut tree = RbTreeCircle::new();
        let mut model: BTreeMap<u32, String> = BTreeMap::new();
        for (i, h) in scrambled(200).into_iter().enumerate() {
            let id = format!("n{i}");
            tree.insert(h, &id);
            model.insert(h, id);
        }
        tree.debug_validate_invariants();

        let probes: Vec<u32> = scrambled(500)
            .into_iter()
            .chain([0, 1, u32::MAX - 1, u32::MAX])
            .collect();
        for probe in probes {
            let expect_closest = model
                .range(probe..)
                .next()
                .or_else(|| model.iter().next())
                .map(|(h, id)| (*h, id.as_str()));
            assert_eq!(tree.find_closest(probe), expect_closest, "probe {probe}");

            let expect_next = model
                .range(probe.saturating_add(1)..)
                .next()
                .filter(|_| probe < u32::MAX)
                .or_else(|| model.iter().next())
                .map(|(h, id)| (*h, id.as_str()));
            assert_eq!(tree.find_next_closest(probe), expect_next, "probe {probe}");
        }
    }

    #[test]
    fn in_order_entries_are_sorted_and_complete() {
        let mut tree = RbTreeCircle::new();
        let hashes = scrambled(100);
        for &h in &hashes {
            tree.insert(h, "n");
        }
        let entries = tree.entries();
        assert_eq!(entries.len(), 100);
        assert!(entries.windows(2).all(|w| w[0].hash < w[1].hash));
    }

    #[test]
    fn duplicate_insert_keeps_first_value() {
        let mut tree = RbTreeCircle::new();
        assert!(tree.insert(42, "first"));
        assert!(!tree.insert(42, "second"));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find_closest(42), Some((42, "first")));
    }
}
