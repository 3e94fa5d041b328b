//! Property-based tests for reclaimable handles.
//!
//! Random get/release/relieve sequences are run against a small reference
//! model that predicts, for each `get`, whether the value is held, salvaged
//! or restored.

use deferrable::{Reclaimable, RetainPolicy, SoftPool};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
enum Op {
    /// Get, optionally keeping the returned reference outside the handle.
    Get { keep: bool },
    Release,
    /// Drop every reference kept outside the handle.
    DropHeld,
    /// Host memory pressure on the soft pool.
    Relieve,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<bool>().prop_map(|keep| Op::Get { keep }),
        3 => Just(Op::Release),
        1 => Just(Op::DropHeld),
        1 => Just(Op::Relieve),
    ]
}

fn policy_strategy() -> impl Strategy<Value = RetainPolicy> {
    prop_oneof![
        Just(RetainPolicy::NoRetain),
        Just(RetainPolicy::WeakRetain),
        Just(RetainPolicy::SoftRetain),
    ]
}

/// Reference model of one handle. Values are identified by the restore
/// call that produced them.
#[derive(Debug, Default)]
struct Model {
    present: bool,
    current: Option<usize>,
    pinned: bool,
    restores: u64,
    salvages: u64,
    releases: u64,
}

impl Model {
    fn get(&mut self, policy: RetainPolicy, held: &[Rc<usize>], next_id: usize) -> usize {
        if self.present {
            return self.current.unwrap_or(next_id);
        }
        let alive = self.current.is_some_and(|id| {
            held.iter().any(|v| **v == id) || (policy == RetainPolicy::SoftRetain && self.pinned)
        });
        let id = if alive && policy.retains() {
            self.salvages += 1;
            self.current.unwrap_or(next_id)
        } else {
            self.restores += 1;
            next_id
        };
        self.present = true;
        self.pinned = false;
        self.current = Some(id);
        id
    }

    fn release(&mut self, policy: RetainPolicy) {
        if self.present {
            self.present = false;
            self.pinned = policy == RetainPolicy::SoftRetain;
            self.releases += 1;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_handle_matches_model(
        policy in policy_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..64),
    ) {
        let calls = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&calls);
        let pool = SoftPool::new();
        let mut handle = match policy {
            RetainPolicy::SoftRetain => Reclaimable::soft_retain_in(&pool, None, move || {
                counter.set(counter.get() + 1);
                counter.get()
            }),
            other => Reclaimable::with_policy(other, None, move || {
                counter.set(counter.get() + 1);
                counter.get()
            }),
        };

        let mut model = Model::default();
        let mut held: Vec<Rc<usize>> = Vec::new();

        for op in ops {
            match op {
                Op::Get { keep } => {
                    let expected = model.get(policy, &held, calls.get() + 1);
                    let value = handle.get();
                    prop_assert_eq!(*value, expected);
                    prop_assert!(handle.is_present());
                    if keep {
                        held.push(value);
                    }
                }
                Op::Release => {
                    model.release(policy);
                    handle.release();
                    prop_assert!(!handle.is_present());
                }
                Op::DropHeld => held.clear(),
                Op::Relieve => {
                    pool.relieve();
                    model.pinned = false;
                }
            }
        }

        let stats = handle.stats();
        prop_assert_eq!(stats.restores, model.restores);
        prop_assert_eq!(stats.salvages, model.salvages);
        prop_assert_eq!(stats.releases, model.releases);
        prop_assert_eq!(calls.get() as u64, model.restores);
    }

    #[test]
    fn prop_no_retain_never_salvages(
        ops in prop::collection::vec(op_strategy(), 1..64),
    ) {
        let mut handle = Reclaimable::no_retain(None, || String::from("value"));
        let mut held = Vec::new();

        for op in ops {
            match op {
                Op::Get { keep } => {
                    let value = handle.get();
                    if keep {
                        held.push(value);
                    }
                }
                Op::Release => {
                    handle.release();
                    prop_assert!(!handle.is_salvageable());
                }
                Op::DropHeld => held.clear(),
                Op::Relieve => {}
            }
        }
        prop_assert_eq!(handle.stats().salvages, 0);
    }

    #[test]
    fn prop_bounded_pool_never_exceeds_capacity(
        capacity in 1usize..8,
        handles in 1usize..24,
    ) {
        let pool: SoftPool<usize> = SoftPool::bounded(capacity).unwrap();
        let mut all: Vec<_> = (0..handles)
            .map(|i| Reclaimable::soft_retain_in(&pool, Some(i), move || i))
            .collect();

        for handle in &mut all {
            handle.release();
            prop_assert!(pool.len() <= capacity);
        }

        let salvageable = all.iter().filter(|h| h.is_salvageable()).count();
        prop_assert_eq!(salvageable, handles.min(capacity));
        prop_assert_eq!(pool.stats().evictions as usize, handles.saturating_sub(capacity));
    }
}
