#![forbid(unsafe_code)]

//! Commit hooks and tree delegates.

use std::sync::Arc;

use fabrik_core::{ShadowNode, ShadowTreeRevision};

use crate::mounting_coordinator::MountingCoordinator;
use crate::shadow_tree::ShadowTree;

/// Observer that can veto or rewrite a commit before it is published.
///
/// Hooks run in registration order while the tree's commit lock is held. A
/// hook may issue a nested commit on the same tree from inside
/// [`shadow_tree_will_commit`](CommitHook::shadow_tree_will_commit); the
/// outer commit then reports [`CommitStatus::Failed`](crate::CommitStatus)
/// and is retried, so `shadow_tree_will_commit` may see several candidates
/// for one commit. Only [`shadow_tree_did_commit`](CommitHook::shadow_tree_did_commit)
/// sees what was actually published.
pub trait CommitHook: Send + Sync {
    /// Called once the hook is part of `tree`'s registry.
    fn commit_hook_was_registered(&self, _tree: &ShadowTree) {}

    /// Inspect a candidate root.
    ///
    /// Return `new_root` to let the commit proceed, another root of the same
    /// family to substitute it, or `None` to abort the commit.
    fn shadow_tree_will_commit(
        &self,
        tree: &ShadowTree,
        old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>>;

    /// Called after `revision` was published, still under the commit lock.
    fn shadow_tree_did_commit(&self, _tree: &ShadowTree, _revision: &ShadowTreeRevision) {}

    /// Called once the hook has left `tree`'s registry.
    fn commit_hook_was_unregistered(&self, _tree: &ShadowTree) {}
}

/// Receives a notification after every published commit.
pub trait ShadowTreeDelegate: Send + Sync {
    fn shadow_tree_did_finish_transaction(
        &self,
        tree: &ShadowTree,
        coordinator: &Arc<MountingCoordinator>,
    );
}
