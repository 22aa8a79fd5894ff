#![forbid(unsafe_code)]

//! Hand-off point between committers and the mounting thread.
//!
//! The coordinator keeps two revisions: `base`, whose views the host already
//! shows, and `pending`, the newest committed revision not yet delivered.
//! Pushing a newer revision replaces `pending`, so revisions committed faster
//! than the host pulls are coalesced into one transaction:
//!
//! ```text
//! push(r1) push(r2) push(r3)      pull_transaction()
//!   base=r0  pending=r3    ──▶    diff(r0, r3), base=r3, pending=∅
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fabrik_core::{ShadowTreeRevision, SurfaceId, TransactionTelemetry};
use fabrik_render::{
    DiffOptions, ShadowViewMutation, StubViewTree, calculate_shadow_view_mutations,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug_span, trace};

use crate::config::PipelineConfig;
use crate::telemetry_controller::{SurfaceTelemetry, TelemetryController};

/// An ordered batch of mutations for one surface.
#[derive(Debug, Clone)]
pub struct MountingTransaction {
    surface_id: SurfaceId,
    number: u64,
    mutations: Vec<ShadowViewMutation>,
    telemetry: TransactionTelemetry,
}

impl MountingTransaction {
    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// Per-coordinator sequence number, starting at 1.
    #[inline]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[inline]
    pub fn mutations(&self) -> &[ShadowViewMutation] {
        &self.mutations
    }

    #[inline]
    pub fn telemetry(&self) -> &TransactionTelemetry {
        &self.telemetry
    }

    #[inline]
    pub fn telemetry_mut(&mut self) -> &mut TransactionTelemetry {
        &mut self.telemetry
    }

    pub fn into_mutations(self) -> Vec<ShadowViewMutation> {
        self.mutations
    }
}

struct CoordinatorState {
    base: Arc<ShadowTreeRevision>,
    pending: Option<Arc<ShadowTreeRevision>>,
    transaction_number: u64,
    mirror: Option<StubViewTree>,
}

/// Per-surface delivery of committed revisions to a single consumer.
pub struct MountingCoordinator {
    surface_id: SurfaceId,
    diff_options: DiffOptions,
    state: Mutex<CoordinatorState>,
    signal: Condvar,
    telemetry: Mutex<SurfaceTelemetry>,
}

impl MountingCoordinator {
    /// Create a coordinator whose host already shows `base`.
    pub fn new(surface_id: SurfaceId, base: Arc<ShadowTreeRevision>, config: &PipelineConfig) -> Self {
        let mirror = config
            .mounting
            .verify_mirror
            .then(|| StubViewTree::from_root(base.root()));
        Self {
            surface_id,
            diff_options: config.diff.options(),
            state: Mutex::new(CoordinatorState {
                base,
                pending: None,
                transaction_number: 0,
                mirror,
            }),
            signal: Condvar::new(),
            telemetry: Mutex::new(SurfaceTelemetry::default()),
        }
    }

    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// Offer a newly committed revision.
    ///
    /// A revision not newer than the current pending one is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `revision` is not newer than the base revision.
    pub fn push(&self, revision: Arc<ShadowTreeRevision>) {
        {
            let mut state = self.state.lock();
            assert!(
                revision.number() > state.base.number(),
                "{}: pushed revision {} is not newer than base {}",
                self.surface_id,
                revision.number(),
                state.base.number()
            );
            if let Some(pending) = &state.pending {
                if revision.number() <= pending.number() {
                    trace!(
                        surface_id = self.surface_id.get(),
                        revision = revision.number().get(),
                        pending = pending.number().get(),
                        "stale revision ignored"
                    );
                    return;
                }
                trace!(
                    surface_id = self.surface_id.get(),
                    replaced = pending.number().get(),
                    revision = revision.number().get(),
                    "pending revision coalesced"
                );
            }
            state.pending = Some(revision);
        }
        self.signal.notify_all();
    }

    /// Drop the pending revision, if any. Nothing is delivered for it.
    pub fn revoke(&self) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.take() {
            trace!(
                surface_id = self.surface_id.get(),
                revision = pending.number().get(),
                "pending revision revoked"
            );
        }
    }

    /// Whether a pull would currently return a transaction.
    pub fn has_pending_transactions(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// The revision the host is known to show.
    pub fn base_revision(&self) -> Arc<ShadowTreeRevision> {
        Arc::clone(&self.state.lock().base)
    }

    /// Block until a revision is pending or `timeout` elapses.
    ///
    /// Returns whether a revision is pending.
    pub fn wait_for_transaction(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.pending.is_none() {
            if self.signal.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.pending.is_some()
    }

    /// Diff base against pending and advance base.
    ///
    /// Returns `None` when nothing is pending.
    ///
    /// # Panics
    ///
    /// With `mounting.verify_mirror` enabled, panics if the mutations do not
    /// transform the mirrored base into the pending revision.
    pub fn pull_transaction(&self) -> Option<MountingTransaction> {
        let mut state = self.state.lock();
        let pending = state.pending.take()?;

        state.transaction_number += 1;
        let number = state.transaction_number;
        let span = debug_span!(
            "fabrik.mount.pull",
            surface_id = self.surface_id.get(),
            transaction = number,
            revision = pending.number().get(),
            mutations = tracing::field::Empty
        );
        let _enter = span.enter();

        let mut telemetry = *pending.telemetry();
        telemetry.will_diff();
        let mutations =
            calculate_shadow_view_mutations(self.diff_options, state.base.root(), pending.root());
        telemetry.did_diff();
        span.record("mutations", mutations.len() as u64);

        if let Some(mirror) = state.mirror.as_mut() {
            if let Err(err) = mirror.apply(&mutations) {
                panic!(
                    "{}: transaction {number} rejected by the mounting mirror: {err}",
                    self.surface_id
                );
            }
            let expected = StubViewTree::from_root(pending.root());
            assert!(
                *mirror == expected,
                "{}: mounting mirror diverged after transaction {number}\nmirror:\n{mirror}\nexpected:\n{expected}",
                self.surface_id
            );
        }

        state.base = pending;
        Some(MountingTransaction {
            surface_id: self.surface_id,
            number,
            mutations,
            telemetry,
        })
    }

    /// Pull with mount timing and surface statistics.
    pub fn telemetry_controller(&self) -> TelemetryController<'_> {
        TelemetryController::new(self)
    }

    pub(crate) fn surface_telemetry(&self) -> &Mutex<SurfaceTelemetry> {
        &self.telemetry
    }
}

impl fmt::Debug for MountingCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MountingCoordinator")
            .field("surface_id", &self.surface_id)
            .field("base", &state.base.number())
            .field("pending", &state.pending.as_ref().map(|p| p.number()))
            .field("transactions", &state.transaction_number)
            .finish()
    }
}
