#![forbid(unsafe_code)]

//! Self-contained view projections of shadow nodes.

use std::sync::Arc;

use fabrik_core::{LayoutMetrics, NodeTraits, Point, Props, ShadowNode, State, SurfaceId, Tag};
use serde::Serialize;

/// Everything a host needs to create or update one view.
///
/// A `ShadowView` does not reference the tree it came from, so a mutation can
/// be applied after the revision that produced it is gone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowView {
    pub component_name: Arc<str>,
    pub tag: Tag,
    pub surface_id: SurfaceId,
    pub props: Props,
    pub state: State,
    pub layout_metrics: LayoutMetrics,
}

impl ShadowView {
    /// Project a node into a view.
    pub fn new(node: &ShadowNode) -> Self {
        Self {
            component_name: Arc::clone(node.component_name()),
            tag: node.tag(),
            surface_id: node.surface_id(),
            props: node.props().clone(),
            state: node.state().clone(),
            layout_metrics: *node.layout_metrics(),
        }
    }
}

/// A view together with the node it was projected from.
#[derive(Debug, Clone)]
pub struct ShadowViewNodePair<'a> {
    pub shadow_view: ShadowView,
    pub shadow_node: &'a ShadowNode,
}

impl ShadowViewNodePair<'_> {
    /// Same view and same node revision.
    pub fn is_identical(&self, other: &ShadowViewNodePair<'_>) -> bool {
        std::ptr::eq(self.shadow_node, other.shadow_node) && self.shadow_view == other.shadow_view
    }
}

/// The host-level children of `node`.
///
/// Nodes without [`NodeTraits::FORMS_VIEW`] are flattened: their view-forming
/// descendants are hoisted into this list with the flattened ancestors' frame
/// origins added. A node that forms a view without forming a stacking context
/// owns no host children (they are hoisted to its parent instead), so its list
/// is empty.
///
/// Siblings are stably reordered by `order_index` when any of them is non-zero.
pub fn slice_child_shadow_node_view_pairs(node: &ShadowNode) -> Vec<ShadowViewNodePair<'_>> {
    let mut pairs = Vec::new();
    let traits = node.traits();
    if traits.contains(NodeTraits::FORMS_VIEW) && !traits.contains(NodeTraits::FORMS_STACKING_CONTEXT) {
        return pairs;
    }
    slice_recursively(&mut pairs, Point::ZERO, node);
    reorder_in_place_if_needed(&mut pairs);
    pairs
}

fn slice_recursively<'a>(pairs: &mut Vec<ShadowViewNodePair<'a>>, offset: Point, node: &'a ShadowNode) {
    for child in node.children().iter() {
        let child: &'a ShadowNode = child;
        let mut view = ShadowView::new(child);
        if view.layout_metrics != LayoutMetrics::EMPTY {
            view.layout_metrics.frame.origin += offset;
        }
        let origin = view.layout_metrics.frame.origin;
        let traits = child.traits();

        if traits.contains(NodeTraits::FORMS_STACKING_CONTEXT) {
            pairs.push(ShadowViewNodePair {
                shadow_view: view,
                shadow_node: child,
            });
        } else {
            if traits.contains(NodeTraits::FORMS_VIEW) {
                pairs.push(ShadowViewNodePair {
                    shadow_view: view,
                    shadow_node: child,
                });
            }
            slice_recursively(pairs, origin, child);
        }
    }
}

fn reorder_in_place_if_needed(pairs: &mut [ShadowViewNodePair<'_>]) {
    if pairs.len() < 2 {
        return;
    }
    if pairs.iter().all(|pair| pair.shadow_node.order_index() == 0) {
        return;
    }
    pairs.sort_by_key(|pair| pair.shadow_node.order_index());
}
