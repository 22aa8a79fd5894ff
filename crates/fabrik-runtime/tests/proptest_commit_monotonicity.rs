//! Property-based invariant tests for commit delivery.
//!
//! Random interleavings of commits, pulls and revocations check that:
//!
//! 1. Transaction numbers start at 1 and increase by one.
//! 2. Every pull delivers the newest committed revision (coalescing).
//! 3. The revision a host shows only moves forward.
//! 4. A host mirror fed every transaction matches the delivered root.
//! 5. A timeline records exactly the live commits, in order.

use std::sync::Arc;

use fabrik_core::{ShadowNode, SurfaceId};
use fabrik_harness::strategies::storm_config;
use fabrik_harness::{MountConsumer, TreeBuilder, TreeStorm};
use fabrik_runtime::{CommitStatus, PipelineConfig, ShadowTree, TimelineController};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Op {
    Commit,
    Pull,
    Revoke,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            5 => Just(Op::Commit),
            3 => Just(Op::Pull),
            1 => Just(Op::Revoke),
        ],
        1..60,
    )
}

fn new_tree() -> Arc<ShadowTree> {
    let mut config = PipelineConfig::default();
    config.mounting.verify_mirror = true;
    Arc::new(ShadowTree::new(SurfaceId(1), &config, None))
}

fn commit_root(tree: &ShadowTree, root: &Arc<ShadowNode>) -> CommitStatus {
    tree.commit(|_| Some(Arc::clone(root)))
}

// ═════════════════════════════════════════════════════════════════════════
// 1-4. Delivery
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn delivery_is_monotonic_and_coalesced(config in storm_config(), ops in ops()) {
        let tree = new_tree();
        let coordinator = Arc::clone(tree.mounting_coordinator());
        let mut consumer = MountConsumer::new(Arc::clone(&coordinator));
        let builder = TreeBuilder::with_root_family(Arc::clone(tree.root_family()));
        let mut storm = TreeStorm::new(builder, config);

        let mut root = storm.initial_root();
        let mut pending: Option<(u64, Arc<ShadowNode>)> = None;
        let mut shown = 0u64;

        for op in ops {
            match op {
                Op::Commit => {
                    prop_assert_eq!(commit_root(&tree, &root), CommitStatus::Succeeded);
                    pending = Some((tree.current_revision().number().get(), Arc::clone(&root)));
                    root = storm.next_root(&root);
                }
                Op::Revoke => {
                    coordinator.revoke();
                    pending = None;
                }
                Op::Pull => {
                    let expected_number = consumer.transactions().len() as u64 + 1;
                    let pulled = consumer.pull().map_err(|err| TestCaseError::fail(err.to_string()))?;
                    match (&pending, pulled) {
                        (None, None) => {}
                        (Some((revision, delivered)), Some(number)) => {
                            prop_assert_eq!(number, expected_number);
                            prop_assert!(*revision > shown);
                            shown = *revision;
                            prop_assert_eq!(coordinator.base_revision().number().get(), *revision);
                            prop_assert!(consumer.matches(delivered));
                        }
                        (expected, actual) => {
                            return Err(TestCaseError::fail(format!(
                                "pending {:?} but pulled {:?}",
                                expected.as_ref().map(|(n, _)| *n),
                                actual
                            )));
                        }
                    }
                    pending = None;
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Timeline
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn timeline_records_every_live_commit(config in storm_config(), commits in 1usize..30) {
        let tree = new_tree();
        let controller = TimelineController::new();
        let timeline = controller.enable(&tree);
        let builder = TreeBuilder::with_root_family(Arc::clone(tree.root_family()));
        let mut storm = TreeStorm::new(builder, config);

        let mut roots = Vec::new();
        let mut root = storm.initial_root();
        for _ in 0..commits {
            commit_root(&tree, &root);
            roots.push(Arc::clone(&root));
            root = storm.next_root(&root);
        }

        prop_assert_eq!(timeline.len(), commits);
        for (index, expected) in roots.iter().enumerate() {
            let snapshot = timeline.snapshot(index).expect("recorded frame");
            prop_assert_eq!(snapshot.frame().index(), index);
            prop_assert!(Arc::ptr_eq(snapshot.root(), expected));
        }
        let elapsed: Vec<_> = timeline.frames().iter().map(|f| f.elapsed()).collect();
        prop_assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
    }
}
