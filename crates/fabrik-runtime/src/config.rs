#![forbid(unsafe_code)]

//! Pipeline configuration.
//!
//! Every tunable of the commit/diff/mount pipeline lives in a single
//! [`PipelineConfig`] that can be loaded from TOML or JSON.
//!
//! ```toml
//! # fabrik.toml
//! [diff]
//! mode = "classic"
//! collapse_deleted_subtrees = true
//!
//! [mounting]
//! verify_mirror = false
//!
//! [commit]
//! max_attempts = 64
//!
//! [timeline]
//! enabled = true
//! ```
//!
//! ```rust,ignore
//! let config = PipelineConfig::from_toml_file("fabrik.toml")?;
//! let config = PipelineConfig::from_json_str(json)?.validated()?;
//! ```
//!
//! # Defaults
//!
//! `PipelineConfig::default()` selects the move-optimized differentiator,
//! verifies every transaction against a host mirror in debug builds only,
//! and allows 1024 commit attempts before giving up.

use std::path::Path;

use fabrik_render::{DiffOptions, DifferentiatorMode};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level PipelineConfig
// ---------------------------------------------------------------------------

/// Configuration for every surface started by a surface manager.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Differentiator parameters.
    pub diff: DiffConfig,
    /// Mounting coordinator parameters.
    pub mounting: MountingConfig,
    /// Commit protocol parameters.
    pub commit: CommitConfig,
    /// Time-travel debugging.
    pub timeline: TimelineConfig,
}

/// Differentiator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub mode: DifferentiatorMode,
    /// Emit one `DeleteRecursive` per removed subtree.
    pub collapse_deleted_subtrees: bool,
}

impl DiffConfig {
    pub fn options(&self) -> DiffOptions {
        DiffOptions::new(self.mode).collapse_deleted_subtrees(self.collapse_deleted_subtrees)
    }
}

/// Mounting coordinator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountingConfig {
    /// Apply every transaction to a host mirror and panic on divergence.
    pub verify_mirror: bool,
}

impl Default for MountingConfig {
    fn default() -> Self {
        Self {
            verify_mirror: cfg!(debug_assertions),
        }
    }
}

/// Commit protocol parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Attempts before a commit that keeps racing nested commits reports
    /// failure.
    pub max_attempts: u32,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self { max_attempts: 1024 }
    }
}

/// Time-travel debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Attach a timeline to every surface when it starts.
    pub enabled: bool,
}

impl PipelineConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(ConfigError::TomlSer)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.commit.max_attempts == 0 {
            errors.push("commit.max_attempts must be > 0".into());
        }
        errors
    }

    /// `self` if valid, otherwise the validation errors.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error loading a [`PipelineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// TOML serialization error.
    TomlSer(toml::ser::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::TomlSer(e) => write!(f, "TOML serialization error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::TomlSer(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.diff.mode, DifferentiatorMode::OptimizedMoves);
        assert_eq!(config.commit.max_attempts, 1024);
        assert_eq!(config.mounting.verify_mirror, cfg!(debug_assertions));
        assert!(!config.timeline.enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [diff]
            mode = "classic"
            "#,
        )
        .unwrap();
        assert_eq!(config.diff.mode, DifferentiatorMode::Classic);
        assert!(!config.diff.collapse_deleted_subtrees);
        assert_eq!(config.commit, CommitConfig::default());
    }

    #[test]
    fn full_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [diff]
            mode = "optimized_moves"
            collapse_deleted_subtrees = true

            [mounting]
            verify_mirror = true

            [commit]
            max_attempts = 8

            [timeline]
            enabled = true
            "#,
        )
        .unwrap();
        assert!(config.diff.collapse_deleted_subtrees);
        assert!(config.mounting.verify_mirror);
        assert_eq!(config.commit.max_attempts, 8);
        assert!(config.timeline.enabled);
        assert!(config.diff.options().collapse_deleted_subtrees);
    }

    #[test]
    fn json_round_trip() {
        let mut config = PipelineConfig::default();
        config.diff.mode = DifferentiatorMode::Classic;
        config.timeline.enabled = true;
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = PipelineConfig::default();
        config.commit.max_attempts = 3;
        let toml = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&toml).unwrap(), config);
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        let err = PipelineConfig::from_toml_str("[diff]\nmode = \"quantum\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
        assert!(err.to_string().starts_with("TOML parse error"));
    }

    #[test]
    fn zero_attempts_fails_validation() {
        let mut config = PipelineConfig::default();
        config.commit.max_attempts = 0;
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("commit.max_attempts")));
        let err = config.validated().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabrik.json");
        std::fs::write(&path, r#"{"commit":{"max_attempts":5}}"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.commit.max_attempts, 5);
    }
}
