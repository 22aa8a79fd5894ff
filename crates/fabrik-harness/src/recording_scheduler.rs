#![forbid(unsafe_code)]

//! A scheduler that records every notification.

use std::sync::Arc;

use fabrik_core::SurfaceId;
use fabrik_runtime::{MountingCoordinator, Scheduler, SurfaceHandler};
use parking_lot::Mutex;

/// One notification received by a [`RecordingScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Registered {
        surface_id: SurfaceId,
        module_name: String,
    },
    Unregistered(SurfaceId),
    TransactionFinished(SurfaceId),
}

/// Records lifecycle events and queues coordinators with new work.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<SchedulerEvent>>,
    ready: Mutex<Vec<Arc<MountingCoordinator>>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().clone()
    }

    /// Number of finished transactions reported for `surface_id`.
    pub fn transaction_count(&self, surface_id: SurfaceId) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| **event == SchedulerEvent::TransactionFinished(surface_id))
            .count()
    }

    /// Coordinators notified since the last call, each once.
    pub fn take_ready(&self) -> Vec<Arc<MountingCoordinator>> {
        std::mem::take(&mut *self.ready.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.ready.lock().clear();
    }
}

impl Scheduler for RecordingScheduler {
    fn register_surface(&self, surface: &SurfaceHandler) {
        self.events.lock().push(SchedulerEvent::Registered {
            surface_id: surface.surface_id(),
            module_name: surface.module_name(),
        });
    }

    fn unregister_surface(&self, surface: &SurfaceHandler) {
        self.events
            .lock()
            .push(SchedulerEvent::Unregistered(surface.surface_id()));
    }

    fn did_finish_transaction(&self, surface_id: SurfaceId, coordinator: &Arc<MountingCoordinator>) {
        self.events
            .lock()
            .push(SchedulerEvent::TransactionFinished(surface_id));
        let mut ready = self.ready.lock();
        if !ready.iter().any(|queued| Arc::ptr_eq(queued, coordinator)) {
            ready.push(Arc::clone(coordinator));
        }
    }
}
