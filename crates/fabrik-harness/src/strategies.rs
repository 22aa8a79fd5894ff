#![forbid(unsafe_code)]

//! Proptest strategies over differentiator settings and storm histories.

use std::sync::Arc;

use fabrik_core::{ShadowNode, SurfaceId};
use fabrik_render::{DiffOptions, DifferentiatorMode};
use proptest::prelude::*;

use crate::tree_builder::TreeBuilder;
use crate::tree_storm::{StormConfig, TreeStorm};

/// Both modes, with and without collapsed deletes.
pub fn diff_options() -> impl Strategy<Value = DiffOptions> {
    (
        prop_oneof![
            Just(DifferentiatorMode::Classic),
            Just(DifferentiatorMode::OptimizedMoves),
        ],
        any::<bool>(),
    )
        .prop_map(|(mode, collapse)| DiffOptions::new(mode).collapse_deleted_subtrees(collapse))
}

pub fn storm_config() -> impl Strategy<Value = StormConfig> {
    (any::<u64>(), 1usize..6, 0usize..3, 1usize..4, 0u8..60).prop_map(
        |(seed, edits, depth, fanout, layout_only)| {
            StormConfig::new(seed)
                .edits_per_revision(edits)
                .max_subtree_depth(depth)
                .max_fanout(fanout)
                .layout_only_percent(layout_only)
        },
    )
}

/// A chain of `len` roots of surface 1 produced by one storm.
pub fn storm_history(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Arc<ShadowNode>>> {
    (storm_config(), len).prop_map(|(config, count)| {
        TreeStorm::new(TreeBuilder::new(SurfaceId(1)), config).revisions(count)
    })
}
