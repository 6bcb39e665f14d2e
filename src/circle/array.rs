//! Sorted-vector circle backing.
//!
//! Inserts append; [`Circle::sort`] restores hash order. Successor queries
//! binary-search and therefore require the vector to be sorted, which the
//! ring guarantees by sorting after every insert. The duplicate check on
//! insert is a linear scan because the tail may be unsorted at that point.

use crate::circle::{Circle, VNode};

#[derive(Debug, Default)]
pub struct ArrayCircle {
    vnodes: Vec<VNode>,
}

impl ArrayCircle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Circle for ArrayCircle {
    fn insert(&mut self, hash: u32, id: &str) -> bool {
        if self.vnodes.iter().any(|v| v.hash == hash) {
            return false;
        }
        self.vnodes.push(VNode {
            hash,
            id: id.to_owned(),
        });
        true
    }

    fn delete(&mut self, hash: u32) -> bool {
        match self.vnodes.iter().position(|v| v.hash == hash) {
            Some(idx) => {
                self.vnodes.remove(idx);
                true
            }
            None => false,
        }
    }

    fn find_closest(&self, hash: u32) -> Option<(u32, &str)> {
        if self.vnodes.is_empty() {
            return None;
        }
        let idx = self.vnodes.partition_point(|v| v.hash < hash);
        let vnode = self.vnodes.get(idx).unwrap_or(&self.vnodes[0]);
        Some((vnode.hash, vnode.id.as_str()))
    }

    fn find_next_closest(&self, hash: u32) -> Option<(u32, &str)> {
        if self.vnodes.is_empty() {
            return None;
        }
        let idx = self.vnodes.partition_point(|v| v.hash <= hash);
        let vnode = self.vnodes.get(idx).unwrap_or(&self.vnodes[0]);
        Some((vnode.hash, vnode.id.as_str()))
    }

    fn len(&self) -> usize {
        self.vnodes.len()
    }

    fn sort(&mut self) {
        self.vnodes.sort_unstable_by_key(|v| v.hash);
    }

    fn entries(&self) -> Vec<VNode> {
        let mut entries = self.vnodes.clone();
        entries.sort_unstable_by_key(|v| v.hash);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_idempotent() {
        let mut circle = ArrayCircle::new();
        circle.insert(30, "c");
        circle.insert(10, "a");
        circle.insert(20, "b");
        circle.sort();
        let once = circle.entries();
        circle.sort();
        assert_eq!(once, circle.entries());
    }

    #[test]
    fn duplicate_check_works_before_sorting() {
        let mut circle = ArrayCircle::new();
        assert!(circle.insert(5, "a"));
        assert!(circle.insert(1, "b"));
        // Unsorted at this point; the membership test must still see 5.
        assert!(!circle.insert(5, "dup"));
        circle.sort();
        assert_eq!(circle.len(), 2);
    }

    #[test]
    fn single_entry_always_wins() {
        let mut circle = ArrayCircle::new();
        circle.insert(1000, "only");
        circle.sort();
        for probe in [0, 999, 1000, 1001, u32::MAX] {
            assert_eq!(circle.find_closest(probe), Some((1000, "only")));
        }
        // The strict successor of the sole entry wraps back onto itself.
        assert_eq!(circle.find_next_closest(1000), Some((1000, "only")));
    }
}
