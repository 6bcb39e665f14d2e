//! Error types for the ringtree library.
//!
//! ## Key Components
//!
//! - [`RingError`]: every failure a ring operation can surface, from
//!   recoverable conditions (capacity, duplicates, missing keys) to fatal
//!   ones that signal a bug in the structure itself.
//! - [`Result`]: crate-wide result alias.
//!
//! Recoverable errors propagate to the caller and leave the tree usable.
//! [`RingError::InvariantViolation`] and [`RingError::DrainFailure`] indicate
//! corrupted internal state and must never be swallowed.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RingError>;

/// Errors produced by ring-tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    /// The ring already holds `limit` members.
    CapacityExceeded { limit: usize },
    /// A member with this id is already on the ring.
    DuplicateNode(String),
    /// The key is already stored on its target virtual node.
    DuplicateKey(String),
    /// No member with this id exists on the ring.
    NodeNotFound(String),
    /// The key is not resident anywhere in the tree.
    KeyNotFound(String),
    /// The ring has no members to resolve against.
    EmptyRing,
    /// The root ring has too few members left to drain one.
    NotEnoughMembers,
    /// The root ring can never be collapsed.
    RootCollapse,
    /// Internal state no longer satisfies a structural invariant.
    InvariantViolation(&'static str),
    /// A removed node still held keys after draining; keys would be lost.
    DrainFailure { node: String, remaining: usize },
}

impl RingError {
    /// True for the "nothing there" family: missing key, missing node, or an
    /// empty ring.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RingError::KeyNotFound(_) | RingError::NodeNotFound(_) | RingError::EmptyRing
        )
    }

    /// True for errors that signal a bug rather than a recoverable condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RingError::InvariantViolation(_) | RingError::DrainFailure { .. }
        )
    }
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::CapacityExceeded { limit } => {
                write!(f, "ring is at capacity ({limit} members)")
            }
            RingError::DuplicateNode(id) => write!(f, "node {id} is already in the ring"),
            RingError::DuplicateKey(key) => write!(f, "key {key} is already in the ring"),
            RingError::NodeNotFound(id) => write!(f, "node {id} not found in members"),
            RingError::KeyNotFound(key) => write!(f, "key {key} not found"),
            RingError::EmptyRing => write!(f, "ring is empty"),
            RingError::NotEnoughMembers => {
                write!(f, "not enough members in the ring to drain a node")
            }
            RingError::RootCollapse => write!(f, "cannot collapse the root ring"),
            RingError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            RingError::DrainFailure { node, remaining } => {
                write!(f, "node {node} still holds {remaining} keys after drain")
            }
        }
    }
}

impl std::error::Error for RingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        let err = RingError::DuplicateNode("node-a".to_string());
        assert!(err.to_string().contains("node-a"));

        let err = RingError::DrainFailure {
            node: "node-b".to_string(),
            remaining: 3,
        };
        assert!(err.to_string().contains("node-b"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn not_found_family() {
        assert!(RingError::KeyNotFound("k".into()).is_not_found());
        assert!(RingError::NodeNotFound("n".into()).is_not_found());
        assert!(RingError::EmptyRing.is_not_found());
        assert!(!RingError::RootCollapse.is_not_found());
    }

    #[test]
    fn fatal_family() {
        assert!(RingError::InvariantViolation("x").is_fatal());
        assert!(RingError::DrainFailure {
            node: "n".into(),
            remaining: 1
        }
        .is_fatal());
        assert!(!RingError::CapacityExceeded { limit: 2 }.is_fatal());
        assert!(!RingError::DuplicateKey("k".into()).is_fatal());
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<RingError>();
    }
}
