#![forbid(unsafe_code)]

//! Registry of running surfaces.
//!
//! ```text
//!  start_surface ──▶ [write] scheduler.register_surface ─▶ props, layout ─▶ start ─▶ insert handler
//!  stop_surface  ──▶ [write] stop ─▶ scheduler.unregister_surface ─▶ erase
//!  measure / constraint / find / visit ──▶ [read] lookup
//! ```
//!
//! The scheduler is notified from inside the registry's write lock, so its
//! callbacks must not call back into the same manager.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use fabrik_core::{LayoutConstraints, LayoutContext, Props, Size, SurfaceId};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::mounting_coordinator::MountingCoordinator;
use crate::scheduler::{Scheduler, SchedulerDelegate};
use crate::surface_handler::SurfaceHandler;
use crate::timeline::Timeline;
use crate::timeline_controller::TimelineController;

/// Errors returned by [`SurfaceManager`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("{0} is already running")]
    AlreadyRunning(SurfaceId),
}

/// Owns every running surface of one host.
pub struct SurfaceManager {
    surfaces: RwLock<AHashMap<SurfaceId, SurfaceHandler>>,
    scheduler: Arc<dyn Scheduler>,
    config: PipelineConfig,
    timelines: TimelineController,
}

impl SurfaceManager {
    pub fn new(scheduler: Arc<dyn Scheduler>, config: PipelineConfig) -> Self {
        Self {
            surfaces: RwLock::new(AHashMap::new()),
            scheduler,
            config,
            timelines: TimelineController::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Debug timelines of the surfaces this manager started.
    pub fn timelines(&self) -> &TimelineController {
        &self.timelines
    }

    /// Create, register and start a surface.
    pub fn start_surface(
        &self,
        surface_id: SurfaceId,
        module_name: &str,
        initial_props: impl Into<Props>,
        constraints: LayoutConstraints,
        context: LayoutContext,
    ) -> Result<(), SurfaceError> {
        let mut surfaces = self.surfaces.write();
        if surfaces.contains_key(&surface_id) {
            return Err(SurfaceError::AlreadyRunning(surface_id));
        }

        let handler = SurfaceHandler::new(surface_id, module_name, self.config.clone());
        self.scheduler.register_surface(&handler);
        handler.set_props(initial_props);
        handler.constraint_layout(constraints, context);
        handler.register(Some(Arc::new(SchedulerDelegate::new(Arc::clone(
            &self.scheduler,
        )))));
        handler.start();

        if self.config.timeline.enabled
            && let Some(tree) = handler.shadow_tree()
        {
            self.timelines.enable(&tree);
        }

        surfaces.insert(surface_id, handler);
        info!(
            surface_id = surface_id.get(),
            module = module_name,
            surfaces = surfaces.len(),
            "surface registered"
        );
        Ok(())
    }

    /// Stop and forget a surface. Returns `false` if it was not running.
    pub fn stop_surface(&self, surface_id: SurfaceId) -> bool {
        let mut surfaces = self.surfaces.write();
        let Some(handler) = surfaces.get(&surface_id) else {
            debug!(surface_id = surface_id.get(), "stop of unknown surface");
            return false;
        };

        self.timelines.disable(surface_id);
        handler.stop();
        self.scheduler.unregister_surface(handler);
        handler.unregister();
        surfaces.remove(&surface_id);
        info!(
            surface_id = surface_id.get(),
            surfaces = surfaces.len(),
            "surface unregistered"
        );
        true
    }

    /// Content size of a surface, or [`Size::ZERO`] if it is not running.
    pub fn measure_surface(
        &self,
        surface_id: SurfaceId,
        constraints: &LayoutConstraints,
        context: &LayoutContext,
    ) -> Size {
        self.visit(surface_id, |handler| handler.measure(constraints, context))
            .unwrap_or(Size::ZERO)
    }

    /// Apply new layout inputs to a surface; no-op if it is not running.
    pub fn constraint_surface_layout(
        &self,
        surface_id: SurfaceId,
        constraints: LayoutConstraints,
        context: LayoutContext,
    ) {
        self.visit(surface_id, |handler| {
            handler.constraint_layout(constraints, context)
        });
    }

    pub fn find_mounting_coordinator(
        &self,
        surface_id: SurfaceId,
    ) -> Option<Arc<MountingCoordinator>> {
        self.visit(surface_id, SurfaceHandler::mounting_coordinator)
            .flatten()
    }

    /// Run `f` on a surface under the registry's read lock.
    pub fn visit<R>(&self, surface_id: SurfaceId, f: impl FnOnce(&SurfaceHandler) -> R) -> Option<R> {
        let surfaces = self.surfaces.read();
        match surfaces.get(&surface_id) {
            Some(handler) => Some(f(handler)),
            None => {
                debug!(surface_id = surface_id.get(), "lookup of unknown surface");
                None
            }
        }
    }

    pub fn timeline(&self, surface_id: SurfaceId) -> Option<Arc<Timeline>> {
        self.timelines.timeline(surface_id)
    }

    /// Ids of every running surface, ascending.
    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<SurfaceId> = self.surfaces.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.surfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.read().is_empty()
    }
}

impl fmt::Debug for SurfaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceManager")
            .field("surfaces", &self.surface_ids())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface_handler::SurfaceStatus;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct CountingScheduler {
        events: Mutex<Vec<String>>,
        props_at_register: Mutex<Vec<serde_json::Value>>,
    }

    impl Scheduler for CountingScheduler {
        fn register_surface(&self, surface: &SurfaceHandler) {
            assert_eq!(surface.status(), SurfaceStatus::Unregistered);
            self.props_at_register
                .lock()
                .push(surface.props().value().clone());
            self.events
                .lock()
                .push(format!("register {}", surface.surface_id().get()));
        }

        fn unregister_surface(&self, surface: &SurfaceHandler) {
            assert_eq!(surface.status(), SurfaceStatus::Registered);
            self.events
                .lock()
                .push(format!("unregister {}", surface.surface_id().get()));
        }

        fn did_finish_transaction(
            &self,
            surface_id: SurfaceId,
            _coordinator: &Arc<MountingCoordinator>,
        ) {
            self.events
                .lock()
                .push(format!("commit {}", surface_id.get()));
        }
    }

    fn manager() -> (Arc<CountingScheduler>, SurfaceManager) {
        let scheduler = Arc::new(CountingScheduler::default());
        let manager = SurfaceManager::new(scheduler.clone(), PipelineConfig::default());
        (scheduler, manager)
    }

    fn start(manager: &SurfaceManager, id: i32) -> Result<(), SurfaceError> {
        manager.start_surface(
            SurfaceId(id),
            "App",
            json!({"id": id}),
            LayoutConstraints::exact(Size::new(100.0, 200.0)),
            LayoutContext::default(),
        )
    }

    #[test]
    fn start_and_stop_surface() {
        let (scheduler, manager) = manager();
        start(&manager, 11).unwrap();
        assert_eq!(manager.len(), 1);
        assert!(manager.find_mounting_coordinator(SurfaceId(11)).is_some());
        assert_eq!(
            manager.visit(SurfaceId(11), |handler| handler.props().value().clone()),
            Some(json!({"id": 11}))
        );

        assert!(manager.stop_surface(SurfaceId(11)));
        assert!(manager.is_empty());
        assert!(manager.find_mounting_coordinator(SurfaceId(11)).is_none());

        let events = scheduler.events.lock().clone();
        assert_eq!(events.first().map(String::as_str), Some("register 11"));
        assert_eq!(events.last().map(String::as_str), Some("unregister 11"));
        assert_eq!(events.iter().filter(|e| *e == "commit 11").count(), 2);
    }

    #[test]
    fn scheduler_sees_surface_before_props_are_applied() {
        let (scheduler, manager) = manager();
        start(&manager, 3).unwrap();
        assert_eq!(*scheduler.props_at_register.lock(), vec![serde_json::Value::Null]);
        assert_eq!(
            manager.visit(SurfaceId(3), |handler| handler.props().value().clone()),
            Some(json!({"id": 3}))
        );
    }

    #[test]
    fn duplicate_start_is_rejected() {
        let (_, manager) = manager();
        start(&manager, 11).unwrap();
        assert_eq!(
            start(&manager, 11),
            Err(SurfaceError::AlreadyRunning(SurfaceId(11)))
        );
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn absent_surface_is_neutral() {
        let (_, manager) = manager();
        assert!(!manager.stop_surface(SurfaceId(5)));
        assert_eq!(
            manager.measure_surface(
                SurfaceId(5),
                &LayoutConstraints::default(),
                &LayoutContext::default()
            ),
            Size::ZERO
        );
        manager.constraint_surface_layout(
            SurfaceId(5),
            LayoutConstraints::default(),
            LayoutContext::default(),
        );
        assert!(manager.visit(SurfaceId(5), |_| ()).is_none());
        assert!(manager.timeline(SurfaceId(5)).is_none());
    }

    #[test]
    fn initial_root_uses_constraints() {
        let (_, manager) = manager();
        start(&manager, 1).unwrap();
        let frame = manager
            .visit(SurfaceId(1), |handler| {
                handler
                    .shadow_tree()
                    .map(|tree| tree.current_revision().root().layout_metrics().frame)
            })
            .flatten()
            .unwrap();
        assert_eq!(frame.size, Size::new(100.0, 200.0));
    }

    #[test]
    fn surface_ids_are_sorted() {
        let (_, manager) = manager();
        for id in [31, 1, 21] {
            start(&manager, id).unwrap();
        }
        assert_eq!(
            manager.surface_ids(),
            vec![SurfaceId(1), SurfaceId(21), SurfaceId(31)]
        );
    }

    #[test]
    fn timeline_follows_config() {
        let scheduler = Arc::new(CountingScheduler::default());
        let mut config = PipelineConfig::default();
        config.timeline.enabled = true;
        let manager = SurfaceManager::new(scheduler, config);
        start(&manager, 1).unwrap();
        assert!(manager.timeline(SurfaceId(1)).is_some());
        manager.stop_surface(SurfaceId(1));
        assert!(manager.timeline(SurfaceId(1)).is_none());
    }
}
