#![forbid(unsafe_code)]

//! Immutable, structurally shared tree nodes.
//!
//! A [`ShadowNode`] is never mutated once built. Edits produce new nodes that
//! share every untouched child through [`Arc`], so a new revision of a large
//! tree costs one allocation per node on the path from the root to the edit.
//!
//! ```text
//!   revision 1          revision 2 (edit C)
//!
//!      R1                   R2
//!     /  \                 /  \
//!    A    B1    ───▶      A    B2      A is shared by pointer,
//!        /  \                 /  \     B and R are path-copied.
//!       C1   D               C2   D
//! ```
//!
//! Identity lives in [`ShadowNodeFamily`]: every revision of one logical node
//! points at the same family `Arc`, and two nodes are "the same node" exactly
//! when their families are pointer-equal.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::geometry::{LayoutMetrics, Rect};
use crate::ids::{SurfaceId, Tag};

bitflags! {
    /// Static characteristics of a node family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeTraits: u8 {
        /// The node is materialised as a host view. Nodes without it are
        /// flattened away and their view-forming descendants are hoisted.
        const FORMS_VIEW = 1 << 0;
        /// The node's view owns the views of its descendants.
        const FORMS_STACKING_CONTEXT = 1 << 1;
    }
}

impl Default for NodeTraits {
    fn default() -> Self {
        Self::FORMS_VIEW | Self::FORMS_STACKING_CONTEXT
    }
}

impl NodeTraits {
    /// A layout-only node that never produces a host view.
    pub const LAYOUT_ONLY: NodeTraits = NodeTraits::empty();
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Opaque, shared props or state payload.
///
/// Equality checks pointer identity first and falls back to value equality,
/// so reusing the same payload across revisions is a cheap comparison.
#[derive(Clone, Default)]
pub struct Payload(Arc<Value>);

impl Payload {
    /// Wrap a JSON value.
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// The null payload.
    pub fn null() -> Self {
        Self::default()
    }

    /// Borrow the underlying value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Whether two payloads share storage.
    #[inline]
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Props payload handed to a node by the application.
pub type Props = Payload;
/// State payload owned by a node's component.
pub type State = Payload;

// ---------------------------------------------------------------------------
// Family
// ---------------------------------------------------------------------------

/// Identity shared by every revision of one logical node.
#[derive(Debug)]
pub struct ShadowNodeFamily {
    tag: Tag,
    surface_id: SurfaceId,
    component_name: Arc<str>,
    traits: NodeTraits,
}

impl ShadowNodeFamily {
    /// Create a new family.
    pub fn new(
        tag: Tag,
        surface_id: SurfaceId,
        component_name: impl Into<Arc<str>>,
        traits: NodeTraits,
    ) -> Arc<Self> {
        Arc::new(Self {
            tag,
            surface_id,
            component_name: component_name.into(),
            traits,
        })
    }

    /// The root family of a surface (`tag == surface id`).
    pub fn root(surface_id: SurfaceId) -> Arc<Self> {
        Self::new(
            surface_id.root_tag(),
            surface_id,
            "RootView",
            NodeTraits::default(),
        )
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    #[inline]
    pub fn component_name(&self) -> &Arc<str> {
        &self.component_name
    }

    #[inline]
    pub fn traits(&self) -> NodeTraits {
        self.traits
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Ordered, shared list of child nodes.
pub type SharedChildren = Arc<[Arc<ShadowNode>]>;

/// Optional replacements applied when building or cloning a node.
#[derive(Debug, Clone, Default)]
pub struct ShadowNodeFragment {
    pub props: Option<Props>,
    pub state: Option<State>,
    pub children: Option<SharedChildren>,
    pub layout_metrics: Option<LayoutMetrics>,
    pub order_index: Option<i32>,
}

impl ShadowNodeFragment {
    pub fn props(mut self, props: impl Into<Props>) -> Self {
        self.props = Some(props.into());
        self
    }

    pub fn state(mut self, state: impl Into<State>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn children(mut self, children: impl Into<SharedChildren>) -> Self {
        self.children = Some(children.into());
        self
    }

    pub fn layout_metrics(mut self, metrics: LayoutMetrics) -> Self {
        self.layout_metrics = Some(metrics);
        self
    }

    pub fn order_index(mut self, order_index: i32) -> Self {
        self.order_index = Some(order_index);
        self
    }
}

/// One immutable revision of a logical UI node.
#[derive(Clone)]
pub struct ShadowNode {
    family: Arc<ShadowNodeFamily>,
    props: Props,
    state: State,
    layout_metrics: LayoutMetrics,
    order_index: i32,
    children: SharedChildren,
}

impl ShadowNode {
    /// Build a node of `family`, taking unset fragment fields from defaults.
    pub fn new(family: Arc<ShadowNodeFamily>, fragment: ShadowNodeFragment) -> Self {
        Self {
            family,
            props: fragment.props.unwrap_or_default(),
            state: fragment.state.unwrap_or_default(),
            layout_metrics: fragment.layout_metrics.unwrap_or_default(),
            order_index: fragment.order_index.unwrap_or(0),
            children: fragment.children.unwrap_or_else(|| Arc::from(Vec::new())),
        }
    }

    /// Copy of this node with the fragment's fields replaced.
    ///
    /// Unset fields are shared with `self`.
    pub fn clone_with(&self, fragment: ShadowNodeFragment) -> Self {
        Self {
            family: Arc::clone(&self.family),
            props: fragment.props.unwrap_or_else(|| self.props.clone()),
            state: fragment.state.unwrap_or_else(|| self.state.clone()),
            layout_metrics: fragment.layout_metrics.unwrap_or(self.layout_metrics),
            order_index: fragment.order_index.unwrap_or(self.order_index),
            children: fragment
                .children
                .unwrap_or_else(|| Arc::clone(&self.children)),
        }
    }

    #[inline]
    pub fn family(&self) -> &Arc<ShadowNodeFamily> {
        &self.family
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        self.family.tag
    }

    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.family.surface_id
    }

    #[inline]
    pub fn component_name(&self) -> &Arc<str> {
        &self.family.component_name
    }

    #[inline]
    pub fn traits(&self) -> NodeTraits {
        self.family.traits
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    #[inline]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[inline]
    pub fn layout_metrics(&self) -> &LayoutMetrics {
        &self.layout_metrics
    }

    #[inline]
    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    #[inline]
    pub fn children(&self) -> &SharedChildren {
        &self.children
    }

    /// Whether both nodes are revisions of the same logical node.
    #[inline]
    pub fn same_family(&self, other: &ShadowNode) -> bool {
        Arc::ptr_eq(&self.family, &other.family)
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Union of the children's frames, in this node's coordinate space.
    pub fn content_bounds(&self) -> Rect {
        self.children
            .iter()
            .fold(Rect::ZERO, |acc, child| acc.union(&child.layout_metrics.frame))
    }

    /// Find a node by tag in this subtree, including `self`.
    pub fn find(self: &Arc<Self>, tag: Tag) -> Option<Arc<ShadowNode>> {
        if self.tag() == tag {
            return Some(Arc::clone(self));
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    /// Path-copy this subtree, replacing the node of `target` with the result
    /// of `f`.
    ///
    /// Only the ancestors of the target are rebuilt; every other node is
    /// shared with `self`. Returns `None` when `target` is not in the subtree.
    pub fn clone_tree(
        self: &Arc<Self>,
        target: &Arc<ShadowNodeFamily>,
        f: impl FnOnce(&ShadowNode) -> ShadowNode,
    ) -> Option<Arc<ShadowNode>> {
        let mut path = Vec::new();
        if !self.collect_path(target, &mut path) {
            return None;
        }

        // `path` holds child indices from the root down to the target.
        let mut chain: Vec<&Arc<ShadowNode>> = Vec::with_capacity(path.len() + 1);
        chain.push(self);
        for &index in &path {
            let parent = chain[chain.len() - 1];
            chain.push(&parent.children[index]);
        }

        let mut replacement = Arc::new(f(&**chain[chain.len() - 1]));
        for depth in (0..path.len()).rev() {
            let parent = chain[depth];
            let mut children: Vec<Arc<ShadowNode>> = parent.children.to_vec();
            children[path[depth]] = replacement;
            replacement = Arc::new(
                parent.clone_with(ShadowNodeFragment::default().children(children)),
            );
        }
        Some(replacement)
    }

    fn collect_path(&self, target: &Arc<ShadowNodeFamily>, path: &mut Vec<usize>) -> bool {
        if Arc::ptr_eq(&self.family, target) {
            return true;
        }
        for (index, child) in self.children.iter().enumerate() {
            path.push(index);
            if child.collect_path(target, path) {
                return true;
            }
            path.pop();
        }
        false
    }
}

impl fmt::Debug for ShadowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowNode")
            .field("tag", &self.tag().0)
            .field("component", &&*self.family.component_name)
            .field("props", &self.props)
            .field("order_index", &self.order_index)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn family(tag: i32) -> Arc<ShadowNodeFamily> {
        ShadowNodeFamily::new(Tag(tag), SurfaceId(1), "View", NodeTraits::default())
    }

    fn leaf(tag: i32) -> Arc<ShadowNode> {
        Arc::new(ShadowNode::new(family(tag), ShadowNodeFragment::default()))
    }

    fn parent(tag: i32, children: Vec<Arc<ShadowNode>>) -> Arc<ShadowNode> {
        Arc::new(ShadowNode::new(
            family(tag),
            ShadowNodeFragment::default().children(children),
        ))
    }

    #[test]
    fn clone_with_shares_unset_fields() {
        let node = parent(2, vec![leaf(3)]);
        let edited = node.clone_with(ShadowNodeFragment::default().props(json!({"a": 1})));
        assert!(edited.same_family(&node));
        assert!(Arc::ptr_eq(edited.children(), node.children()));
        assert_eq!(edited.props().value(), &json!({"a": 1}));
    }

    #[test]
    fn payload_equality_falls_back_to_value() {
        let a = Payload::new(json!({"x": 1}));
        let b = Payload::new(json!({"x": 1}));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, Payload::null());
    }

    #[test]
    fn same_family_is_pointer_identity() {
        let a = leaf(5);
        let b = leaf(5);
        assert!(!a.same_family(&b));
        let a2 = a.clone_with(ShadowNodeFragment::default().order_index(3));
        assert!(a.same_family(&a2));
    }

    #[test]
    fn clone_tree_path_copies_only_ancestors() {
        let untouched = parent(3, vec![leaf(4)]);
        let target = leaf(6);
        let branch = parent(5, vec![Arc::clone(&target)]);
        let root = parent(1, vec![Arc::clone(&untouched), Arc::clone(&branch)]);

        let new_root = root
            .clone_tree(target.family(), |node| {
                node.clone_with(ShadowNodeFragment::default().props(json!("edited")))
            })
            .expect("target present");

        assert!(new_root.same_family(&root));
        assert!(Arc::ptr_eq(&new_root.children()[0], &untouched));
        assert!(!Arc::ptr_eq(&new_root.children()[1], &branch));
        let new_target = new_root.find(Tag(6)).unwrap();
        assert_eq!(new_target.props().value(), &json!("edited"));
        // Original tree is untouched.
        assert_eq!(root.find(Tag(6)).unwrap().props(), &Payload::null());
    }

    #[test]
    fn clone_tree_missing_target() {
        let root = parent(1, vec![leaf(2)]);
        let stranger = family(9);
        assert!(root.clone_tree(&stranger, |n| n.clone()).is_none());
    }

    #[test]
    fn descendant_count_and_bounds() {
        let a = Arc::new(ShadowNode::new(
            family(2),
            ShadowNodeFragment::default()
                .layout_metrics(LayoutMetrics::with_frame(Rect::new(0.0, 0.0, 10.0, 10.0))),
        ));
        let b = Arc::new(ShadowNode::new(
            family(3),
            ShadowNodeFragment::default()
                .layout_metrics(LayoutMetrics::with_frame(Rect::new(20.0, 0.0, 5.0, 30.0)))
                .children(vec![leaf(4)]),
        ));
        let root = parent(1, vec![a, b]);
        assert_eq!(root.descendant_count(), 3);
        assert_eq!(root.content_bounds(), Rect::new(0.0, 0.0, 25.0, 30.0));
    }

    #[test]
    fn traits_default_forms_view() {
        let t = NodeTraits::default();
        assert!(t.contains(NodeTraits::FORMS_VIEW));
        assert!(t.contains(NodeTraits::FORMS_STACKING_CONTEXT));
        assert!(NodeTraits::LAYOUT_ONLY.is_empty());
    }
}
