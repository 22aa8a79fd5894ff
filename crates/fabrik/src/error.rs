#![forbid(unsafe_code)]

//! Unified error type for the facade.
//!
//! Each internal crate keeps its own error enum; [`Error`] wraps them so an
//! embedder can use a single `?` chain and still decide what to do next:
//!
//! ```text
//!   ConfigError ──────┐
//!   SurfaceError ─────┼──► Error ──► recovery() ──► Recovery
//!   StubViewTreeError ┤
//!   io::Error ────────┘
//! ```

use std::fmt;

use fabrik_render::StubViewTreeError;
#[cfg(feature = "runtime")]
use fabrik_runtime::{ConfigError, SurfaceError};

/// Convenience alias used throughout the facade.
pub type Result<T> = std::result::Result<T, Error>;

/// What the host should do after an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// Keep running with the default configuration.
    KeepDefaults,
    /// The request was redundant; nothing changed.
    Ignore,
    /// The host mirror diverged; rebuild it from the coordinator's base
    /// revision before pulling again.
    Resync,
    /// Nothing sensible can continue.
    Shutdown,
}

/// Any error surfaced by the fabrik facade.
#[derive(Debug)]
pub enum Error {
    /// Loading or validating a pipeline config failed.
    #[cfg(feature = "runtime")]
    Config(ConfigError),
    /// A surface lifecycle request was rejected.
    #[cfg(feature = "runtime")]
    Surface(SurfaceError),
    /// Applying mutations to a host mirror failed.
    Mount(StubViewTreeError),
    /// I/O outside of config loading.
    Io(std::io::Error),
}

impl Error {
    /// Short stable label, suitable for log fields and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "runtime")]
            Self::Config(_) => "config",
            #[cfg(feature = "runtime")]
            Self::Surface(_) => "surface",
            Self::Mount(_) => "mount",
            Self::Io(_) => "io",
        }
    }

    /// Suggested recovery for this error.
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        match self {
            #[cfg(feature = "runtime")]
            Self::Config(_) => Recovery::KeepDefaults,
            #[cfg(feature = "runtime")]
            Self::Surface(SurfaceError::AlreadyRunning(_)) => Recovery::Ignore,
            Self::Mount(_) => Recovery::Resync,
            Self::Io(_) => Recovery::Shutdown,
        }
    }

    /// Whether the process can keep going after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.recovery() != Recovery::Shutdown
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "runtime")]
            Self::Config(e) => write!(f, "config error: {e}"),
            #[cfg(feature = "runtime")]
            Self::Surface(e) => write!(f, "surface error: {e}"),
            Self::Mount(e) => write!(f, "mount error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "runtime")]
            Self::Config(e) => Some(e),
            #[cfg(feature = "runtime")]
            Self::Surface(e) => Some(e),
            Self::Mount(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(feature = "runtime")]
impl From<SurfaceError> for Error {
    fn from(e: SurfaceError) -> Self {
        Self::Surface(e)
    }
}

impl From<StubViewTreeError> for Error {
    fn from(e: StubViewTreeError) -> Self {
        Self::Mount(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
