#![forbid(unsafe_code)]

//! Mount-side timing and per-surface statistics.

use std::time::Duration;

use fabrik_core::TransactionTelemetry;
use serde::Serialize;

use crate::mounting_coordinator::{MountingCoordinator, MountingTransaction};

/// Aggregated statistics over every transaction mounted for a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SurfaceTelemetry {
    pub transaction_count: u64,
    pub mutation_count: u64,
    pub last_revision_number: u64,
    pub last_mutation_count: usize,
    pub total_commit_time: Duration,
    pub total_diff_time: Duration,
    pub total_mount_time: Duration,
    pub last_commit_time: Duration,
    pub last_diff_time: Duration,
    pub last_mount_time: Duration,
}

impl SurfaceTelemetry {
    /// Fold one mounted transaction into the totals.
    pub fn incorporate(&mut self, telemetry: &TransactionTelemetry, mutation_count: usize) {
        self.transaction_count += 1;
        self.mutation_count += mutation_count as u64;
        self.last_mutation_count = mutation_count;
        self.last_revision_number = telemetry.revision_number;

        self.last_commit_time = telemetry.commit_duration().unwrap_or_default();
        self.last_diff_time = telemetry.diff_duration().unwrap_or_default();
        self.last_mount_time = telemetry.mount_duration().unwrap_or_default();
        self.total_commit_time += self.last_commit_time;
        self.total_diff_time += self.last_diff_time;
        self.total_mount_time += self.last_mount_time;
    }

    /// Mean mutations per transaction.
    pub fn average_mutations(&self) -> f64 {
        if self.transaction_count == 0 {
            return 0.0;
        }
        self.mutation_count as f64 / self.transaction_count as f64
    }
}

/// Wraps a pull with mount timing.
///
/// Obtained from [`MountingCoordinator::telemetry_controller`].
pub struct TelemetryController<'a> {
    coordinator: &'a MountingCoordinator,
}

impl<'a> TelemetryController<'a> {
    pub(crate) fn new(coordinator: &'a MountingCoordinator) -> Self {
        Self { coordinator }
    }

    /// Pull a transaction and mount it through the three callbacks.
    ///
    /// `do_mount` is timed as the mount stage. Returns `false` when nothing
    /// was pending.
    pub fn pull_transaction(
        &self,
        will_mount: impl FnOnce(&MountingTransaction, &SurfaceTelemetry),
        do_mount: impl FnOnce(&MountingTransaction, &SurfaceTelemetry),
        did_mount: impl FnOnce(&MountingTransaction, &SurfaceTelemetry),
    ) -> bool {
        let Some(mut transaction) = self.coordinator.pull_transaction() else {
            return false;
        };

        let snapshot = self.surface_telemetry();
        will_mount(&transaction, &snapshot);

        transaction.telemetry_mut().will_mount();
        do_mount(&transaction, &snapshot);
        transaction.telemetry_mut().did_mount();

        let updated = {
            let mut telemetry = self.coordinator.surface_telemetry().lock();
            telemetry.incorporate(transaction.telemetry(), transaction.mutations().len());
            *telemetry
        };
        did_mount(&transaction, &updated);
        true
    }

    /// Statistics so far.
    pub fn surface_telemetry(&self) -> SurfaceTelemetry {
        *self.coordinator.surface_telemetry().lock()
    }
}
