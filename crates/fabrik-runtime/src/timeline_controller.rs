#![forbid(unsafe_code)]

//! Per-surface timeline registry.

use std::sync::Arc;

use ahash::AHashMap;
use fabrik_core::SurfaceId;
use parking_lot::RwLock;
use tracing::info;

use crate::commit_hook::CommitHook;
use crate::shadow_tree::ShadowTree;
use crate::timeline::Timeline;

/// Creates, tracks and detaches [`Timeline`]s by surface.
#[derive(Debug, Default)]
pub struct TimelineController {
    timelines: RwLock<AHashMap<SurfaceId, Arc<Timeline>>>,
}

impl TimelineController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a timeline to `tree`, or return the one already attached.
    ///
    /// The registry lock is never held while waiting for the tree's commit
    /// lock. When two calls race for one surface the loser detaches its own
    /// timeline.
    pub fn enable(&self, tree: &Arc<ShadowTree>) -> Arc<Timeline> {
        let surface_id = tree.surface_id();
        if let Some(existing) = self.timeline(surface_id) {
            return existing;
        }

        let timeline = Arc::new(Timeline::new(tree));
        let hook: Arc<dyn CommitHook> = timeline.clone();
        tree.register_commit_hook(Arc::clone(&hook));

        let winner = {
            let mut timelines = self.timelines.write();
            match timelines.get(&surface_id) {
                Some(existing) => Some(Arc::clone(existing)),
                None => {
                    timelines.insert(surface_id, Arc::clone(&timeline));
                    None
                }
            }
        };
        if let Some(existing) = winner {
            tree.unregister_commit_hook(&hook);
            return existing;
        }
        info!(surface_id = surface_id.get(), "timeline enabled");
        timeline
    }

    /// Detach and forget the timeline of `surface_id`.
    ///
    /// Returns `false` when none was attached.
    pub fn disable(&self, surface_id: SurfaceId) -> bool {
        let Some(timeline) = self.timelines.write().remove(&surface_id) else {
            return false;
        };
        if let Some(tree) = timeline.shadow_tree() {
            let hook: Arc<dyn CommitHook> = timeline;
            tree.unregister_commit_hook(&hook);
        }
        info!(surface_id = surface_id.get(), "timeline disabled");
        true
    }

    pub fn timeline(&self, surface_id: SurfaceId) -> Option<Arc<Timeline>> {
        self.timelines.read().get(&surface_id).cloned()
    }

    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<_> = self.timelines.read().keys().copied().collect();
        ids.sort();
        ids
    }
}
