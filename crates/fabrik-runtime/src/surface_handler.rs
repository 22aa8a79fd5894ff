#![forbid(unsafe_code)]

//! One surface: its parameters, status and shadow tree.
//!
//! ```text
//!  Unregistered ──register──▶ Registered ──start──▶ Running
//!       ▲                        │  ▲                 │
//!       └──────unregister────────┘  └───────stop──────┘
//! ```

use std::fmt;
use std::sync::Arc;

use fabrik_core::{
    LayoutConstraints, LayoutContext, LayoutMetrics, Props, Rect, ShadowNode, ShadowNodeFragment,
    Size, SurfaceId,
};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::commit_hook::ShadowTreeDelegate;
use crate::config::PipelineConfig;
use crate::mounting_coordinator::MountingCoordinator;
use crate::shadow_tree::{CommitStatus, ShadowTree};

/// Lifecycle state of a [`SurfaceHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceStatus {
    Unregistered,
    Registered,
    Running,
}

#[derive(Debug, Clone)]
struct Parameters {
    module_name: String,
    props: Props,
    layout_constraints: LayoutConstraints,
    layout_context: LayoutContext,
}

struct Link {
    status: SurfaceStatus,
    tree: Option<Arc<ShadowTree>>,
    delegate: Option<Arc<dyn ShadowTreeDelegate>>,
}

/// Owner of one surface's tree and parameters.
///
/// Every method takes `&self`; the handler is shared by the surface manager
/// under its read lock.
pub struct SurfaceHandler {
    surface_id: SurfaceId,
    config: PipelineConfig,
    parameters: RwLock<Parameters>,
    link: RwLock<Link>,
}

/// Round `size` up to the device pixel grid.
fn snap_to_pixels(size: Size, context: &LayoutContext) -> Size {
    let scale = context.point_scale_factor;
    if scale <= 0.0 {
        return size;
    }
    Size::new(
        (size.width * scale).ceil() / scale,
        (size.height * scale).ceil() / scale,
    )
}

/// Size the content of `root` asks for under the given constraints.
fn content_size(root: &ShadowNode, constraints: &LayoutConstraints, context: &LayoutContext) -> Size {
    let bounds = root.content_bounds();
    let extent = Size::new(bounds.right().max(0.0), bounds.bottom().max(0.0));
    constraints.clamp(snap_to_pixels(extent, context))
}

impl SurfaceHandler {
    pub fn new(surface_id: SurfaceId, module_name: impl Into<String>, config: PipelineConfig) -> Self {
        Self {
            surface_id,
            config,
            parameters: RwLock::new(Parameters {
                module_name: module_name.into(),
                props: Props::null(),
                layout_constraints: LayoutConstraints::default(),
                layout_context: LayoutContext::default(),
            }),
            link: RwLock::new(Link {
                status: SurfaceStatus::Unregistered,
                tree: None,
                delegate: None,
            }),
        }
    }

    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn module_name(&self) -> String {
        self.parameters.read().module_name.clone()
    }

    pub fn status(&self) -> SurfaceStatus {
        self.link.read().status
    }

    pub fn props(&self) -> Props {
        self.parameters.read().props.clone()
    }

    pub fn layout_constraints(&self) -> LayoutConstraints {
        self.parameters.read().layout_constraints
    }

    pub fn layout_context(&self) -> LayoutContext {
        self.parameters.read().layout_context
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The surface's tree while it is running.
    pub fn shadow_tree(&self) -> Option<Arc<ShadowTree>> {
        self.link.read().tree.clone()
    }

    /// The surface's coordinator while it is running.
    pub fn mounting_coordinator(&self) -> Option<Arc<MountingCoordinator>> {
        self.link
            .read()
            .tree
            .as_ref()
            .map(|tree| Arc::clone(tree.mounting_coordinator()))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Attach the delegate that will observe this surface's commits.
    ///
    /// # Panics
    ///
    /// Panics unless the surface is `Unregistered`.
    pub fn register(&self, delegate: Option<Arc<dyn ShadowTreeDelegate>>) {
        let mut link = self.link.write();
        assert_eq!(
            link.status,
            SurfaceStatus::Unregistered,
            "{}: register requires an unregistered surface",
            self.surface_id
        );
        link.delegate = delegate;
        link.status = SurfaceStatus::Registered;
    }

    /// Detach the delegate.
    ///
    /// # Panics
    ///
    /// Panics unless the surface is `Registered`.
    pub fn unregister(&self) {
        let mut link = self.link.write();
        assert_eq!(
            link.status,
            SurfaceStatus::Registered,
            "{}: unregister requires a registered, stopped surface",
            self.surface_id
        );
        link.delegate = None;
        link.status = SurfaceStatus::Unregistered;
    }

    /// Create the tree and commit the initial root.
    ///
    /// # Panics
    ///
    /// Panics unless the surface is `Registered`.
    pub fn start(&self) {
        let tree = {
            let mut link = self.link.write();
            assert_eq!(
                link.status,
                SurfaceStatus::Registered,
                "{}: start requires a registered surface",
                self.surface_id
            );
            let tree = Arc::new(ShadowTree::new(
                self.surface_id,
                &self.config,
                link.delegate.clone(),
            ));
            link.tree = Some(Arc::clone(&tree));
            link.status = SurfaceStatus::Running;
            tree
        };
        self.commit_root(&tree);
        info!(
            surface_id = self.surface_id.get(),
            module = %self.parameters.read().module_name,
            "surface started"
        );
    }

    /// Commit an empty tree and release the tree.
    ///
    /// Consumers still holding the coordinator can pull the teardown
    /// transaction.
    ///
    /// # Panics
    ///
    /// Panics unless the surface is `Running`.
    pub fn stop(&self) {
        let tree = {
            let mut link = self.link.write();
            assert_eq!(
                link.status,
                SurfaceStatus::Running,
                "{}: stop requires a running surface",
                self.surface_id
            );
            link.status = SurfaceStatus::Registered;
            link.tree.take()
        };
        if let Some(tree) = tree {
            tree.commit_empty_tree();
        }
        info!(surface_id = self.surface_id.get(), "surface stopped");
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    /// Replace the root props, committing them if running.
    pub fn set_props(&self, props: impl Into<Props>) {
        self.parameters.write().props = props.into();
        if let Some(tree) = self.shadow_tree() {
            self.commit_root(&tree);
        }
    }

    /// Replace layout inputs, re-laying out the root if running.
    pub fn constraint_layout(&self, constraints: LayoutConstraints, context: LayoutContext) {
        {
            let mut parameters = self.parameters.write();
            parameters.layout_constraints = constraints;
            parameters.layout_context = context;
        }
        if let Some(tree) = self.shadow_tree() {
            self.commit_root(&tree);
        }
    }

    /// Size the current content would take under `constraints`.
    ///
    /// Returns [`Size::ZERO`] when the surface is not running.
    pub fn measure(&self, constraints: &LayoutConstraints, context: &LayoutContext) -> Size {
        match self.shadow_tree() {
            Some(tree) => content_size(tree.current_revision().root(), constraints, context),
            None => Size::ZERO,
        }
    }

    fn commit_root(&self, tree: &ShadowTree) -> CommitStatus {
        let parameters = self.parameters.read().clone();
        tree.commit(|root| {
            let size = content_size(
                root,
                &parameters.layout_constraints,
                &parameters.layout_context,
            );
            let metrics = LayoutMetrics {
                frame: Rect::from_size(size),
                layout_direction: parameters.layout_constraints.layout_direction,
                point_scale_factor: parameters.layout_context.point_scale_factor,
                ..LayoutMetrics::EMPTY
            };
            Some(Arc::new(root.clone_with(
                ShadowNodeFragment::default()
                    .props(parameters.props.clone())
                    .layout_metrics(metrics),
            )))
        })
    }
}

impl fmt::Debug for SurfaceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceHandler")
            .field("surface_id", &self.surface_id)
            .field("module_name", &self.parameters.read().module_name)
            .field("status", &self.status())
            .finish()
    }
}
