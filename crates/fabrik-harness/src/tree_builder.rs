#![forbid(unsafe_code)]

//! Hand-assembled trees.
//!
//! [`TreeBuilder`] hands out fresh families from one [`TagAllocator`], so
//! every node it builds has a unique tag on its surface. The free functions
//! produce edited copies that keep the node's family.

use std::sync::Arc;

use fabrik_core::{
    LayoutMetrics, NodeTraits, Props, Rect, ShadowNode, ShadowNodeFamily, ShadowNodeFragment,
    SurfaceId, TagAllocator,
};

/// Builds trees for one surface.
#[derive(Debug)]
pub struct TreeBuilder {
    tags: TagAllocator,
    root_family: Arc<ShadowNodeFamily>,
}

impl TreeBuilder {
    pub fn new(surface_id: SurfaceId) -> Self {
        Self {
            tags: TagAllocator::new(surface_id),
            root_family: ShadowNodeFamily::root(surface_id),
        }
    }

    /// Use an existing root family, e.g. the one a `ShadowTree` created.
    pub fn with_root_family(root_family: Arc<ShadowNodeFamily>) -> Self {
        Self {
            tags: TagAllocator::new(root_family.surface_id()),
            root_family,
        }
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.tags.surface_id()
    }

    pub fn root_family(&self) -> &Arc<ShadowNodeFamily> {
        &self.root_family
    }

    /// A family with a never-used tag.
    pub fn family(&self, component_name: &str, traits: NodeTraits) -> Arc<ShadowNodeFamily> {
        ShadowNodeFamily::new(
            self.tags.allocate(),
            self.surface_id(),
            component_name,
            traits,
        )
    }

    pub fn node(
        &self,
        component_name: &str,
        traits: NodeTraits,
        fragment: ShadowNodeFragment,
    ) -> Arc<ShadowNode> {
        Arc::new(ShadowNode::new(
            self.family(component_name, traits),
            fragment,
        ))
    }

    /// A view-forming node with `children`.
    pub fn view(&self, component_name: &str, children: Vec<Arc<ShadowNode>>) -> Arc<ShadowNode> {
        self.node(
            component_name,
            NodeTraits::default(),
            ShadowNodeFragment::default().children(children),
        )
    }

    pub fn leaf(&self, component_name: &str) -> Arc<ShadowNode> {
        self.view(component_name, Vec::new())
    }

    /// A layout-only node; the differentiator hoists its children.
    pub fn layout_only(&self, component_name: &str, children: Vec<Arc<ShadowNode>>) -> Arc<ShadowNode> {
        self.node(
            component_name,
            NodeTraits::LAYOUT_ONLY,
            ShadowNodeFragment::default().children(children),
        )
    }

    /// A root node of this builder's surface.
    pub fn root(&self, children: Vec<Arc<ShadowNode>>) -> Arc<ShadowNode> {
        Arc::new(ShadowNode::new(
            Arc::clone(&self.root_family),
            ShadowNodeFragment::default().children(children),
        ))
    }
}

/// Copy of `node` with new children.
pub fn with_children(node: &ShadowNode, children: Vec<Arc<ShadowNode>>) -> Arc<ShadowNode> {
    Arc::new(node.clone_with(ShadowNodeFragment::default().children(children)))
}

/// Copy of `node` with new props.
pub fn with_props(node: &ShadowNode, props: impl Into<Props>) -> Arc<ShadowNode> {
    Arc::new(node.clone_with(ShadowNodeFragment::default().props(props)))
}

/// Copy of `node` with a new frame.
pub fn with_frame(node: &ShadowNode, frame: Rect) -> Arc<ShadowNode> {
    let metrics = LayoutMetrics {
        frame,
        ..*node.layout_metrics()
    };
    Arc::new(node.clone_with(ShadowNodeFragment::default().layout_metrics(metrics)))
}

/// Copy of `node` with a new paint order.
pub fn with_order_index(node: &ShadowNode, order_index: i32) -> Arc<ShadowNode> {
    Arc::new(node.clone_with(ShadowNodeFragment::default().order_index(order_index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_are_unique() {
        let builder = TreeBuilder::new(SurfaceId(1));
        let a = builder.leaf("A");
        let b = builder.leaf("B");
        assert_ne!(a.tag(), b.tag());
        assert_ne!(a.tag(), SurfaceId(1).root_tag());
    }

    #[test]
    fn root_uses_root_family() {
        let builder = TreeBuilder::new(SurfaceId(3));
        let root = builder.root(vec![builder.leaf("A")]);
        assert!(Arc::ptr_eq(root.family(), builder.root_family()));
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn edits_keep_family() {
        let builder = TreeBuilder::new(SurfaceId(1));
        let a = builder.leaf("A");
        let edited = with_order_index(&with_props(&a, json!({"x": 1})), 4);
        assert!(edited.same_family(&a));
        assert_eq!(edited.order_index(), 4);
        assert_eq!(edited.props().value(), &json!({"x": 1}));
    }

    #[test]
    fn with_frame_keeps_other_metrics() {
        let builder = TreeBuilder::new(SurfaceId(1));
        let a = builder.leaf("A");
        let moved = with_frame(&a, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(moved.layout_metrics().frame, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(
            moved.layout_metrics().display_type,
            a.layout_metrics().display_type
        );
    }
}
