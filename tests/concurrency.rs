// ==============================================
// CONCURRENCY TESTS (integration)
// ==============================================
//
// A RingTree handle is cloneable and every operation is thread-safe. These
// tests hammer one tree from several threads and check that nothing is
// lost, duplicated, or deadlocked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use ringtree::{Node, RingTree};

const THREADS: usize = 4;
const KEYS_PER_THREAD: usize = 250;

fn thread_keys(thread: usize) -> Vec<String> {
    (0..KEYS_PER_THREAD)
        .map(|i| format!("t{thread}-key-{i:04}"))
        .collect()
}

#[test]
fn concurrent_inserts_are_all_resident() {
    let tree = RingTree::new(4);
    // High threshold: no structural events, pure map contention.
    tree.insert_node(Node::new("a", 100_000)).unwrap();
    tree.insert_node(Node::new("b", 100_000)).unwrap();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let tree = tree.clone();
            scope.spawn(move || {
                for key in thread_keys(t) {
                    tree.insert_key(&key).unwrap();
                }
            });
        }
    });

    assert_eq!(tree.counters().keys, THREADS * KEYS_PER_THREAD);
    for t in 0..THREADS {
        for key in thread_keys(t) {
            tree.lookup(&key).unwrap();
        }
    }
}

#[test]
fn concurrent_inserts_survive_splits() {
    let tree = RingTree::new(2);
    tree.insert_node(Node::new("seed", 10)).unwrap();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let tree = tree.clone();
            scope.spawn(move || {
                for key in thread_keys(t) {
                    tree.insert_key(&key).unwrap();
                }
            });
        }
    });

    assert_eq!(tree.counters().keys, THREADS * KEYS_PER_THREAD);
    assert!(tree.depth() >= 1, "1000 keys at threshold 10 must split");
    for t in 0..THREADS {
        for key in thread_keys(t) {
            tree.lookup(&key).unwrap();
        }
    }
}

#[test]
fn readers_run_against_writers() {
    let tree = RingTree::new(4);
    tree.insert_node(Node::new("a", 100_000)).unwrap();
    let warmup = thread_keys(9);
    for key in &warmup {
        tree.insert_key(key).unwrap();
    }

    thread::scope(|scope| {
        let writer_tree = tree.clone();
        scope.spawn(move || {
            for key in thread_keys(0) {
                writer_tree.insert_key(&key).unwrap();
            }
        });

        for _ in 0..2 {
            let reader_tree = tree.clone();
            let warmup = &warmup;
            scope.spawn(move || {
                for _ in 0..20 {
                    for key in warmup {
                        reader_tree.lookup(key).unwrap();
                    }
                    let _ = reader_tree.snapshot();
                    let _ = reader_tree.system_load();
                }
            });
        }
    });

    assert_eq!(tree.counters().keys, KEYS_PER_THREAD + warmup.len());
}

#[test]
fn concurrent_removals_drain_cleanly() {
    let tree = RingTree::new(4);
    tree.insert_node(Node::new("a", 100_000)).unwrap();
    tree.insert_node(Node::new("b", 100_000)).unwrap();
    for t in 0..THREADS {
        for key in thread_keys(t) {
            tree.insert_key(&key).unwrap();
        }
    }

    thread::scope(|scope| {
        for t in 0..THREADS {
            let tree = tree.clone();
            scope.spawn(move || {
                for key in thread_keys(t) {
                    tree.remove_key(&key).unwrap();
                }
            });
        }
    });

    assert_eq!(tree.counters().keys, 0);
    assert_eq!(tree.snapshot().total_load(), 0);
}

#[test]
fn traversal_and_gossip_run_during_writes() {
    let tree = RingTree::new(2);
    tree.insert_node(Node::new("seed", 25)).unwrap();
    for key in thread_keys(7) {
        tree.insert_key(&key).unwrap();
    }

    thread::scope(|scope| {
        let writer_tree = tree.clone();
        scope.spawn(move || {
            for key in thread_keys(1) {
                writer_tree.insert_key(&key).unwrap();
            }
        });

        let walker_tree = tree.clone();
        scope.spawn(move || {
            for _ in 0..10 {
                let seen = AtomicUsize::new(0);
                walker_tree.traversal(
                    |_| {
                        seen.fetch_add(1, Ordering::Relaxed);
                    },
                    0,
                );
                assert!(seen.load(Ordering::Relaxed) > 0);
                walker_tree.parallel_gossip("ping");
            }
        });
    });

    assert!(tree.counters().gossip_messages > 0);
    assert_eq!(tree.counters().keys, 2 * KEYS_PER_THREAD);
}
