#![forbid(unsafe_code)]

//! Commit history and time travel for one surface.
//!
//! A [`Timeline`] is a [`CommitHook`] that records committed roots into an
//! append-only history. It has two externally visible states:
//!
//! | State  | Ordinary commit                                        |
//! |--------|--------------------------------------------------------|
//! | Live   | published, then recorded and made the current frame   |
//! | Paused | recorded, vetoed (the live tree stays put)             |
//!
//! Live commits are recorded from
//! [`shadow_tree_did_commit`](CommitHook::shadow_tree_did_commit), so an
//! attempt that a later hook vetoes or that loses a race to a nested commit
//! never becomes a frame.
//!
//! [`rewind`](Timeline::rewind) republishes a recorded root through a
//! synthetic commit. While it runs the timeline is *rewinding*: its own hook
//! lets that commit through without recording it, so history never grows or
//! shrinks because of time travel.
//!
//! # Locking
//!
//! The hook runs under the tree's commit lock and then takes the timeline
//! lock. Every other path that needs both (rewind, resume) takes them in the
//! same order. The timeline lock is re-entrant because the synthetic commit
//! re-enters the hook on the rewinding thread.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use fabrik_core::{ShadowNode, ShadowTreeRevision, SurfaceId};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::commit_hook::CommitHook;
use crate::shadow_tree::{CommitStatus, ShadowTree};

/// Copyable handle to one recorded commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimelineFrame {
    index: usize,
    elapsed: Duration,
}

impl TimelineFrame {
    /// Position in the history, starting at 0.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Time between the timeline's creation and the commit.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// A recorded root together with its frame.
#[derive(Debug, Clone)]
pub struct TimelineSnapshot {
    frame: TimelineFrame,
    root: Arc<ShadowNode>,
}

impl TimelineSnapshot {
    #[inline]
    pub fn frame(&self) -> TimelineFrame {
        self.frame
    }

    #[inline]
    pub fn root(&self) -> &Arc<ShadowNode> {
        &self.root
    }
}

#[derive(Debug, Default)]
struct TimelineState {
    snapshots: Vec<TimelineSnapshot>,
    current_index: Option<usize>,
    paused: bool,
    /// History length when the timeline was paused.
    paused_at: usize,
    rewinding: bool,
}

impl TimelineState {
    fn record(&mut self, elapsed: Duration, root: Arc<ShadowNode>) -> usize {
        let index = self.snapshots.len();
        self.snapshots.push(TimelineSnapshot {
            frame: TimelineFrame { index, elapsed },
            root,
        });
        index
    }
}

type StateGuard<'a> = ReentrantMutexGuard<'a, RefCell<TimelineState>>;

/// Clears the rewinding flag when the synthetic commit returns or unwinds.
struct RewindingScope<'g, 'a>(&'g StateGuard<'a>);

impl<'g, 'a> RewindingScope<'g, 'a> {
    fn enter(guard: &'g StateGuard<'a>) -> Self {
        guard.borrow_mut().rewinding = true;
        Self(guard)
    }
}

impl Drop for RewindingScope<'_, '_> {
    fn drop(&mut self) {
        self.0.borrow_mut().rewinding = false;
    }
}

/// History and time travel for one surface.
pub struct Timeline {
    surface_id: SurfaceId,
    tree: Weak<ShadowTree>,
    started: Instant,
    state: ReentrantMutex<RefCell<TimelineState>>,
}

impl Timeline {
    /// Create a timeline for `tree`. It records nothing until registered as
    /// a commit hook (see [`TimelineController`](crate::TimelineController)).
    pub fn new(tree: &Arc<ShadowTree>) -> Self {
        Self {
            surface_id: tree.surface_id(),
            tree: Arc::downgrade(tree),
            started: Instant::now(),
            state: ReentrantMutex::new(RefCell::new(TimelineState::default())),
        }
    }

    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// The tree this timeline records, if it is still alive.
    pub fn shadow_tree(&self) -> Option<Arc<ShadowTree>> {
        self.tree.upgrade()
    }

    /// Stop publishing ordinary commits. They keep being recorded.
    ///
    /// # Panics
    ///
    /// Panics if the timeline is already paused.
    pub fn pause(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        assert!(!state.paused, "{}: timeline is already paused", self.surface_id);
        state.paused = true;
        state.paused_at = state.snapshots.len();
        info!(
            surface_id = self.surface_id.get(),
            frame = ?state.current_index,
            "timeline paused"
        );
    }

    /// Go live again.
    ///
    /// If commits were recorded while paused, the most recent one is
    /// published through a rewind. Otherwise nothing is committed and the
    /// current frame stays where it is, including a frame reached by a
    /// rewind during the pause.
    ///
    /// # Panics
    ///
    /// Panics if the timeline is not paused.
    pub fn resume(&self) {
        let tree = self.tree.upgrade();
        let _commit_lock = tree.as_ref().map(|tree| tree.commit_lock());
        let guard = self.state.lock();

        let latest = {
            let state = guard.borrow();
            assert!(state.paused, "{}: timeline is not paused", self.surface_id);
            state
                .snapshots
                .last()
                .filter(|latest| {
                    latest.frame.index >= state.paused_at
                        && Some(latest.frame.index) != state.current_index
                })
                .map(|latest| latest.frame)
        };
        if let Some(latest) = latest {
            self.rewind(latest);
        }
        guard.borrow_mut().paused = false;
        info!(surface_id = self.surface_id.get(), "timeline resumed");
    }

    /// Make `frame`'s root the live tree again.
    ///
    /// The synthetic commit is delivered to the mounting coordinator like any
    /// other but is not recorded. If the tree is gone this logs and returns.
    ///
    /// # Panics
    ///
    /// Panics if `frame` was not recorded by this timeline.
    pub fn rewind(&self, frame: TimelineFrame) {
        let Some(tree) = self.tree.upgrade() else {
            warn!(
                surface_id = self.surface_id.get(),
                frame = frame.index,
                "rewind ignored: shadow tree is gone"
            );
            return;
        };
        let _commit_lock = tree.commit_lock();
        let guard = self.state.lock();

        let root = {
            let state = guard.borrow();
            assert!(
                frame.index < state.snapshots.len(),
                "{}: frame {} out of range ({} recorded)",
                self.surface_id,
                frame.index,
                state.snapshots.len()
            );
            Arc::clone(&state.snapshots[frame.index].root)
        };

        let status = {
            let _scope = RewindingScope::enter(&guard);
            tree.commit(|_| Some(Arc::clone(&root)))
        };

        if status == CommitStatus::Succeeded {
            guard.borrow_mut().current_index = Some(frame.index);
        }
        info!(
            surface_id = self.surface_id.get(),
            frame = frame.index,
            ?status,
            "timeline rewound"
        );
    }

    /// Every recorded frame, oldest first.
    pub fn frames(&self) -> Vec<TimelineFrame> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.snapshots.iter().map(|s| s.frame).collect()
    }

    /// The frame the live tree shows, if any commit was recorded live.
    pub fn current_frame(&self) -> Option<TimelineFrame> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.current_index.map(|index| state.snapshots[index].frame)
    }

    /// Recorded snapshot at `index`.
    pub fn snapshot(&self, index: usize) -> Option<TimelineSnapshot> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.snapshots.get(index).cloned()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().borrow().paused
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.state.lock().borrow().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommitHook for Timeline {
    fn commit_hook_was_registered(&self, tree: &ShadowTree) {
        debug_assert_eq!(tree.surface_id(), self.surface_id);
        debug!(surface_id = self.surface_id.get(), "timeline attached");
    }

    fn shadow_tree_will_commit(
        &self,
        _tree: &ShadowTree,
        _old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.rewinding || !state.paused {
            return Some(new_root);
        }

        let index = state.record(self.started.elapsed(), new_root);
        debug!(
            surface_id = self.surface_id.get(),
            frame = index,
            "commit recorded while paused"
        );
        None
    }

    fn shadow_tree_did_commit(&self, _tree: &ShadowTree, revision: &ShadowTreeRevision) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.rewinding {
            return;
        }
        let index = state.record(self.started.elapsed(), Arc::clone(revision.root()));
        state.current_index = Some(index);
    }

    fn commit_hook_was_unregistered(&self, _tree: &ShadowTree) {
        debug!(surface_id = self.surface_id.get(), "timeline detached");
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        let state = guard.borrow();
        f.debug_struct("Timeline")
            .field("surface_id", &self.surface_id)
            .field("frames", &state.snapshots.len())
            .field("current", &state.current_index)
            .field("paused", &state.paused)
            .finish()
    }
}
