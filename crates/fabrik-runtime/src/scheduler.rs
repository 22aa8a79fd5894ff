#![forbid(unsafe_code)]

//! Scheduler seam.
//!
//! The scheduler is the component that drives rendering for registered
//! surfaces. It is injected into the [`SurfaceManager`](crate::SurfaceManager)
//! and must outlive every surface the manager starts.

use std::sync::Arc;

use fabrik_core::SurfaceId;

use crate::commit_hook::ShadowTreeDelegate;
use crate::mounting_coordinator::MountingCoordinator;
use crate::shadow_tree::ShadowTree;
use crate::surface_handler::SurfaceHandler;

/// External collaborator notified about surface lifecycle and commits.
pub trait Scheduler: Send + Sync {
    /// A surface is about to start.
    fn register_surface(&self, surface: &SurfaceHandler);

    /// A surface has stopped.
    fn unregister_surface(&self, surface: &SurfaceHandler);

    /// A revision was committed for `surface_id` and is ready to pull.
    fn did_finish_transaction(
        &self,
        _surface_id: SurfaceId,
        _coordinator: &Arc<MountingCoordinator>,
    ) {
    }
}

/// Forwards commit notifications of a tree to its scheduler.
pub(crate) struct SchedulerDelegate {
    scheduler: Arc<dyn Scheduler>,
}

impl SchedulerDelegate {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }
}

impl ShadowTreeDelegate for SchedulerDelegate {
    fn shadow_tree_did_finish_transaction(
        &self,
        tree: &ShadowTree,
        coordinator: &Arc<MountingCoordinator>,
    ) {
        self.scheduler
            .did_finish_transaction(tree.surface_id(), coordinator);
    }
}
