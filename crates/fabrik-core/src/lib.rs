#![forbid(unsafe_code)]

//! Core: identifiers, geometry, and the immutable shadow tree.
//!
//! # Role in Fabrik
//! `fabrik-core` is the data model. It owns the persistent node type that
//! every other crate reads, the numbered revisions a surface commits, and the
//! geometry the layout pass attaches to nodes.
//!
//! # Primary responsibilities
//! - **ShadowNode**: immutable, `Arc`-shared nodes with family identity.
//! - **ShadowTreeRevision**: a root plus a strictly increasing number.
//! - **TagAllocator**: never-reused node tags per surface.
//! - **Geometry**: frames, sizes, and layout constraints.
//!
//! # How it fits in the system
//! The differentiator (`fabrik-render`) compares two revisions of this tree;
//! the runtime (`fabrik-runtime`) commits, records and delivers them.

pub mod geometry;
pub mod ids;
pub mod revision;
pub mod shadow_node;
pub mod telemetry;

pub use geometry::{
    DisplayType, LayoutConstraints, LayoutContext, LayoutDirection, LayoutMetrics, Point, Rect,
    Size,
};
pub use ids::{SurfaceId, Tag, TagAllocator};
pub use revision::{RevisionNumber, ShadowTreeRevision};
pub use shadow_node::{
    NodeTraits, Payload, Props, ShadowNode, ShadowNodeFamily, ShadowNodeFragment, SharedChildren,
    State,
};
pub use telemetry::TransactionTelemetry;
