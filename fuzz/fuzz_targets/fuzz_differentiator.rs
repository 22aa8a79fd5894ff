#![no_main]

use arbitrary::Arbitrary;
use fabrik_core::SurfaceId;
use fabrik_harness::{StormConfig, StormEdit, TreeBuilder, TreeStorm};
use fabrik_render::{
    DiffOptions, DifferentiatorMode, StubViewTree, calculate_shadow_view_mutations,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    optimized_moves: bool,
    collapse: bool,
    fanout: u8,
    /// Each byte picks one edit; a step with several edits diffs across all of them.
    steps: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let mode = if input.optimized_moves {
        DifferentiatorMode::OptimizedMoves
    } else {
        DifferentiatorMode::Classic
    };
    let options = DiffOptions::new(mode).collapse_deleted_subtrees(input.collapse);
    let config = StormConfig::new(input.seed).max_fanout(usize::from(input.fanout % 5) + 1);
    let mut storm = TreeStorm::new(TreeBuilder::new(SurfaceId(1)), config);

    let mut root = storm.initial_root();
    let empty = empty_root(&storm);
    let mut mirror = StubViewTree::from_root(&empty);
    let initial = calculate_shadow_view_mutations(options, &empty, &root);
    mirror.apply(&initial).expect("initial mount applies");
    assert_eq!(mirror, StubViewTree::from_root(&root), "initial mount diverged");

    for step in input.steps.iter().take(32) {
        let mut next = root.clone();
        for byte in step.iter().take(8) {
            let edit = StormEdit::ALL[usize::from(*byte) % StormEdit::ALL.len()];
            next = storm.apply(&next, edit);
        }
        let mutations = calculate_shadow_view_mutations(options, &root, &next);
        mirror.apply(&mutations).expect("mutations apply to the mirror");
        assert_eq!(mirror, StubViewTree::from_root(&next), "mirror diverged");
        root = next;
    }
});

/// An empty root of the storm's root family.
fn empty_root(storm: &TreeStorm) -> fabrik_core::ShadowNode {
    fabrik_core::ShadowNode::new(
        storm.builder().root_family().clone(),
        fabrik_core::ShadowNodeFragment::default(),
    )
}
