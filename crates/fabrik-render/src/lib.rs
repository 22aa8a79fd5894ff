#![forbid(unsafe_code)]

//! Render: shadow views, mutations, and the tree differentiator.
//!
//! # Role in Fabrik
//! `fabrik-render` turns two revisions of the shadow tree into the ordered
//! list of host view edits that takes one to the other. It is pure: no locks,
//! no threads, no I/O.
//!
//! # Primary responsibilities
//! - **ShadowView**: self-contained projection of a node for the host.
//! - **ShadowViewMutation**: create/delete/insert/remove/update edits.
//! - **Differentiator**: classic and move-optimized child list diffing with
//!   view flattening and `order_index` reordering.
//! - **StubViewTree**: a host mirror used to verify diffs round-trip.

pub mod differentiator;
pub mod mutation;
pub mod shadow_view;
pub mod stub_view_tree;

pub use differentiator::{DiffOptions, DifferentiatorMode, calculate_shadow_view_mutations};
pub use mutation::{MutationKind, ShadowViewMutation, format_mutations};
pub use shadow_view::{ShadowView, ShadowViewNodePair, slice_child_shadow_node_view_pairs};
pub use stub_view_tree::{StubView, StubViewTree, StubViewTreeError};
