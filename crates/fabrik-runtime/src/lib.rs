#![forbid(unsafe_code)]

//! Fabrik Runtime
//!
//! This crate owns the moving parts of the pipeline: committing revisions,
//! handing them to the mounting consumer, recording them for debugging, and
//! managing the surfaces they belong to.
//!
//! # Key Components
//!
//! - [`ShadowTree`] - Serialized commits with hooks, retries and a delegate
//! - [`MountingCoordinator`] - Coalesces revisions into mounting transactions
//! - [`Timeline`] - Records commits and rewinds a surface to an earlier frame
//! - [`SurfaceHandler`] - Lifecycle and layout inputs of one surface
//! - [`SurfaceManager`] - Registry of running surfaces
//! - [`PipelineConfig`] - Diff, mounting, commit and timeline settings
//!
//! # Role in Fabrik
//! `fabrik-runtime` sits between the upstream compute pass, which produces
//! new roots, and the host, which pulls mutations. Diffing itself lives in
//! `fabrik-render`; the data model lives in `fabrik-core`.
//!
//! # How it fits in the system
//! ```text
//!  compute ──commit──▶ ShadowTree ──push──▶ MountingCoordinator ◀──pull── host
//!                         │ hooks                  │ diff
//!                         ▼                        ▼
//!                      Timeline              fabrik-render
//! ```

pub mod commit_hook;
pub mod config;
pub mod mounting_coordinator;
pub mod scheduler;
pub mod shadow_tree;
pub mod surface_handler;
pub mod surface_manager;
pub mod telemetry_controller;
pub mod timeline;
pub mod timeline_controller;

pub use commit_hook::{CommitHook, ShadowTreeDelegate};
pub use config::{
    CommitConfig, ConfigError, DiffConfig, MountingConfig, PipelineConfig, TimelineConfig,
};
pub use mounting_coordinator::{MountingCoordinator, MountingTransaction};
pub use scheduler::Scheduler;
pub use shadow_tree::{CommitStatus, ShadowTree};
pub use surface_handler::{SurfaceHandler, SurfaceStatus};
pub use surface_manager::{SurfaceError, SurfaceManager};
pub use telemetry_controller::{SurfaceTelemetry, TelemetryController};
pub use timeline::{Timeline, TimelineFrame, TimelineSnapshot};
pub use timeline_controller::TimelineController;
