#![forbid(unsafe_code)]

//! Fabrik public facade crate.
//!
//! This crate re-exports the types an embedder needs from the internal
//! crates and offers a small prelude:
//!
//! ```text
//! use fabrik::prelude::*;
//!
//! let manager = SurfaceManager::new(scheduler, fabrik::load_config("fabrik.toml")?);
//! manager.start_surface(SurfaceId(1), "App", props, constraints, context)?;
//! ```

pub mod error;

pub use error::{Error, Recovery, Result};

// --- Core re-exports -------------------------------------------------------

pub use fabrik_core::{
    LayoutConstraints, LayoutContext, LayoutMetrics, NodeTraits, Payload, Props, Rect,
    RevisionNumber, ShadowNode, ShadowNodeFamily, ShadowNodeFragment, ShadowTreeRevision, Size,
    State, SurfaceId, Tag, TagAllocator,
};

// --- Render re-exports -----------------------------------------------------

pub use fabrik_render::{
    DiffOptions, DifferentiatorMode, MutationKind, ShadowView, ShadowViewMutation, StubViewTree,
    StubViewTreeError, calculate_shadow_view_mutations,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use fabrik_runtime::{
    CommitHook, CommitStatus, ConfigError, MountingCoordinator, MountingTransaction,
    PipelineConfig, Scheduler, ShadowTree, ShadowTreeDelegate, SurfaceError, SurfaceHandler,
    SurfaceManager, SurfaceStatus, Timeline, TimelineController, TimelineFrame,
};

/// Load and validate a pipeline config, picking the format from the
/// extension (`.json` or TOML otherwise).
#[cfg(feature = "runtime")]
pub fn load_config(path: impl AsRef<std::path::Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => PipelineConfig::from_json_file(path)?,
        _ => PipelineConfig::from_toml_file(path)?,
    };
    Ok(config.validated()?)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, LayoutConstraints, LayoutContext, Props, Result, ShadowNode, ShadowNodeFragment,
        Size, SurfaceId, Tag,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        CommitHook, CommitStatus, MountingCoordinator, PipelineConfig, Scheduler, ShadowTree,
        SurfaceManager,
    };

    pub use crate::{core, render};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use fabrik_core as core;
pub use fabrik_render as render;
#[cfg(feature = "runtime")]
pub use fabrik_runtime as runtime;

#[cfg(all(test, feature = "runtime"))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_toml_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[diff]\nmode = \"classic\"\n[commit]\nmax_attempts = 8").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.diff.mode, DifferentiatorMode::Classic);
        assert_eq!(config.commit.max_attempts, 8);
    }

    #[test]
    fn load_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", serde_json::json!({"timeline": {"enabled": true}})).unwrap();
        let config = load_config(file.path()).unwrap();
        assert!(config.timeline.enabled);
    }

    #[test]
    fn invalid_config_is_a_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[commit]\nmax_attempts = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert_eq!(err.error_type(), "config");
        assert_eq!(err.recovery(), Recovery::KeepDefaults);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config("/nonexistent/fabrik.toml").unwrap_err();
        assert_eq!(err.error_type(), "config");
    }
}
