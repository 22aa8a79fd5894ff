#![forbid(unsafe_code)]

//! Tree owner and commit protocol.
//!
//! A [`ShadowTree`] serializes every structural change to one surface into a
//! strictly increasing sequence of [`ShadowTreeRevision`]s:
//!
//! ```text
//! commit(f)
//!   ├─ lock (re-entrant, per tree)
//!   ├─ f(current root) ──────────────▶ None: Cancelled
//!   ├─ hooks in registration order ──▶ None: Cancelled
//!   ├─ current moved underneath? ────▶ Failed (retried)
//!   ├─ publish revision n+1
//!   ├─ hooks: did_commit
//!   ├─ MountingCoordinator::push
//!   └─ delegate.did_finish_transaction
//! ```
//!
//! Readers never take the lock: [`current_revision`](ShadowTree::current_revision)
//! is a wait-free `arc-swap` load.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use fabrik_core::{
    RevisionNumber, ShadowNode, ShadowNodeFamily, ShadowNodeFragment, ShadowTreeRevision,
    SurfaceId, TransactionTelemetry,
};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use tracing::{debug, debug_span, field, warn};

use crate::commit_hook::{CommitHook, ShadowTreeDelegate};
use crate::config::{CommitConfig, PipelineConfig};
use crate::mounting_coordinator::MountingCoordinator;

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitStatus {
    /// A new revision was published.
    Succeeded,
    /// A nested commit published first and every retry lost the race.
    Failed,
    /// The transaction or a commit hook aborted the commit.
    Cancelled,
}

/// Owner of one surface's revision sequence.
pub struct ShadowTree {
    surface_id: SurfaceId,
    root_family: Arc<ShadowNodeFamily>,
    commit_lock: ReentrantMutex<()>,
    current: ArcSwap<ShadowTreeRevision>,
    hooks: RwLock<Vec<Arc<dyn CommitHook>>>,
    coordinator: Arc<MountingCoordinator>,
    delegate: Option<Arc<dyn ShadowTreeDelegate>>,
    commit_config: CommitConfig,
}

impl ShadowTree {
    /// Create a tree whose current revision is an empty root numbered 0.
    pub fn new(
        surface_id: SurfaceId,
        config: &PipelineConfig,
        delegate: Option<Arc<dyn ShadowTreeDelegate>>,
    ) -> Self {
        let root_family = ShadowNodeFamily::root(surface_id);
        let root = Arc::new(ShadowNode::new(
            Arc::clone(&root_family),
            ShadowNodeFragment::default(),
        ));
        let initial = Arc::new(ShadowTreeRevision::new(
            root,
            RevisionNumber::INITIAL,
            TransactionTelemetry::default(),
        ));
        let coordinator = Arc::new(MountingCoordinator::new(
            surface_id,
            Arc::clone(&initial),
            config,
        ));
        Self {
            surface_id,
            root_family,
            commit_lock: ReentrantMutex::new(()),
            current: ArcSwap::new(initial),
            hooks: RwLock::new(Vec::new()),
            coordinator,
            delegate,
            commit_config: config.commit,
        }
    }

    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// Family every committed root must belong to.
    #[inline]
    pub fn root_family(&self) -> &Arc<ShadowNodeFamily> {
        &self.root_family
    }

    #[inline]
    pub fn mounting_coordinator(&self) -> &Arc<MountingCoordinator> {
        &self.coordinator
    }

    /// Latest published revision. Never blocks.
    pub fn current_revision(&self) -> Arc<ShadowTreeRevision> {
        self.current.load_full()
    }

    /// Hold the commit lock. Anything that needs to be ordered with commits
    /// takes this before its own locks.
    pub(crate) fn commit_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.commit_lock.lock()
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    /// Append `hook` to the registry. Waits for an in-flight commit.
    pub fn register_commit_hook(&self, hook: Arc<dyn CommitHook>) {
        let _lock = self.commit_lock.lock();
        self.hooks.write().push(Arc::clone(&hook));
        hook.commit_hook_was_registered(self);
        debug!(surface_id = self.surface_id.get(), "commit hook registered");
    }

    /// Remove `hook` from the registry. Returns `false` if it was not
    /// registered.
    pub fn unregister_commit_hook(&self, hook: &Arc<dyn CommitHook>) -> bool {
        let _lock = self.commit_lock.lock();
        let removed = {
            let mut hooks = self.hooks.write();
            let before = hooks.len();
            hooks.retain(|h| !std::ptr::addr_eq(Arc::as_ptr(h), Arc::as_ptr(hook)));
            before != hooks.len()
        };
        if removed {
            hook.commit_hook_was_unregistered(self);
            debug!(surface_id = self.surface_id.get(), "commit hook unregistered");
        }
        removed
    }

    /// Number of registered hooks.
    pub fn commit_hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Commit the root returned by `transaction`.
    ///
    /// `transaction` receives the current root and returns the new one, or
    /// `None` to abort. It may be called more than once when a nested commit
    /// races this one.
    ///
    /// # Panics
    ///
    /// Panics if the returned root does not belong to [`root_family`](Self::root_family).
    pub fn commit<F>(&self, mut transaction: F) -> CommitStatus
    where
        F: FnMut(&Arc<ShadowNode>) -> Option<Arc<ShadowNode>>,
    {
        match self.try_commit(|root| Ok::<_, Infallible>(transaction(root))) {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`commit`](Self::commit).
    ///
    /// An error from `transaction` is returned as-is and leaves the tree
    /// untouched.
    pub fn try_commit<F, E>(&self, mut transaction: F) -> Result<CommitStatus, E>
    where
        F: FnMut(&Arc<ShadowNode>) -> Result<Option<Arc<ShadowNode>>, E>,
    {
        let max_attempts = self.commit_config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let status = self.try_commit_once(&mut transaction)?;
            if status != CommitStatus::Failed {
                return Ok(status);
            }
            debug!(
                surface_id = self.surface_id.get(),
                attempt, "commit raced a nested commit"
            );
        }
        warn!(
            surface_id = self.surface_id.get(),
            max_attempts, "commit failed after exhausting attempts"
        );
        Ok(CommitStatus::Failed)
    }

    fn try_commit_once<F, E>(&self, transaction: &mut F) -> Result<CommitStatus, E>
    where
        F: FnMut(&Arc<ShadowNode>) -> Result<Option<Arc<ShadowNode>>, E>,
    {
        let span = debug_span!(
            "fabrik.commit",
            surface_id = self.surface_id.get(),
            revision = field::Empty
        );
        let _enter = span.enter();
        let _lock = self.commit_lock.lock();

        let mut telemetry = TransactionTelemetry::default();
        telemetry.will_commit();

        let old_revision = self.current.load_full();
        let Some(new_root) = transaction(old_revision.root())? else {
            debug!("transaction aborted");
            return Ok(CommitStatus::Cancelled);
        };
        assert!(
            Arc::ptr_eq(new_root.family(), &self.root_family),
            "committed root {} does not belong to {}",
            new_root.tag(),
            self.surface_id
        );

        let Some(new_root) = self.run_commit_hooks(old_revision.root(), new_root) else {
            debug!("commit hook aborted");
            return Ok(CommitStatus::Cancelled);
        };

        // A hook may have committed on this thread while we were waiting.
        if !Arc::ptr_eq(&*self.current.load(), &old_revision) {
            return Ok(CommitStatus::Failed);
        }

        telemetry.did_commit();
        let number = old_revision.number().next();
        telemetry.revision_number = number.get();
        span.record("revision", number.get());

        let revision = Arc::new(ShadowTreeRevision::new(new_root, number, telemetry));
        self.current.store(Arc::clone(&revision));
        let hooks = self.hooks.read().clone();
        for hook in &hooks {
            hook.shadow_tree_did_commit(self, &revision);
        }
        self.coordinator.push(revision);

        if let Some(delegate) = &self.delegate {
            delegate.shadow_tree_did_finish_transaction(self, &self.coordinator);
        }
        Ok(CommitStatus::Succeeded)
    }

    fn run_commit_hooks(
        &self,
        old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        let hooks = self.hooks.read().clone();
        let mut root = new_root;
        for hook in &hooks {
            root = hook.shadow_tree_will_commit(self, old_root, root)?;
        }
        Some(root)
    }

    /// Commit a root without children so the host removes every view.
    pub fn commit_empty_tree(&self) -> CommitStatus {
        self.commit(|root| {
            Some(Arc::new(root.clone_with(
                ShadowNodeFragment::default().children(Vec::<Arc<ShadowNode>>::new()),
            )))
        })
    }
}

impl fmt::Debug for ShadowTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowTree")
            .field("surface_id", &self.surface_id)
            .field("revision", &self.current.load().number())
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}
