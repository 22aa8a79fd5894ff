#![forbid(unsafe_code)]

//! Test harness for Fabrik.
//!
//! Fixtures shared by the integration tests, benches and fuzz targets of the
//! other crates:
//!
//! - [`TreeBuilder`] - allocates families and assembles trees by hand
//! - [`TreeStorm`] - seeded random edits that keep family identity intact
//! - [`MountConsumer`] - a host stand-in that applies pulled transactions
//! - [`RecordingScheduler`] - a scheduler that records what it is told
//! - [`DeterminismFixture`] - environment-driven seeds for reproducible runs
//! - [`logging`] - test subscribers and a span capture layer
//! - [`strategies`] - proptest strategies over storms and diff options

pub mod determinism;
pub mod logging;
pub mod mount_consumer;
pub mod recording_scheduler;
pub mod strategies;
pub mod tree_builder;
pub mod tree_storm;

pub use determinism::{DeterminismFixture, deterministic_mode, fixture_seed};
pub use mount_consumer::MountConsumer;
pub use recording_scheduler::{RecordingScheduler, SchedulerEvent};
pub use tree_builder::{TreeBuilder, with_children, with_frame, with_order_index, with_props};
pub use tree_storm::{StormConfig, StormEdit, TreeStorm};
