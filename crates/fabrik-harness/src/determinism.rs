#![forbid(unsafe_code)]

//! Deterministic fixtures for tests and stress runs.
//!
//! Seeds come from the environment when set so a failing storm can be
//! replayed exactly:
//!
//! ```text
//! FABRIK_TEST_SEED=42 cargo test -p fabrik-runtime --test e2e_mounting_pipeline
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{Span, info_span};

/// Shared deterministic fixture for a test run.
#[derive(Debug)]
pub struct DeterminismFixture {
    seed: u64,
    deterministic: bool,
    run_id: String,
    case_counter: AtomicU64,
}

impl DeterminismFixture {
    /// Create a fixture, honoring seed overrides from the environment.
    pub fn new(prefix: &str, default_seed: u64) -> Self {
        Self::new_with(prefix, fixture_seed(default_seed), deterministic_mode())
    }

    /// Create a fixture with explicit configuration.
    pub fn new_with(prefix: &str, seed: u64, deterministic: bool) -> Self {
        let run_id = if deterministic {
            format!("{prefix}_seed{seed}")
        } else {
            format!("{prefix}_{}_seed{seed}", std::process::id())
        };
        Self {
            seed,
            deterministic,
            run_id,
            case_counter: AtomicU64::new(0),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Seed for the next case of this run.
    ///
    /// Derived from the run seed, so the sequence is the same on every run
    /// with the same seed.
    pub fn next_case_seed(&self) -> u64 {
        let case = self.case_counter.fetch_add(1, Ordering::Relaxed);
        splitmix64(self.seed ^ case.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Span tagging everything logged during the run.
    pub fn span(&self) -> Span {
        info_span!("fabrik.fixture", run_id = %self.run_id, seed = self.seed)
    }
}

/// True when deterministic mode is requested by the environment.
pub fn deterministic_mode() -> bool {
    env_flag("FABRIK_TEST_DETERMINISTIC") || env_flag("FABRIK_DETERMINISTIC")
}

/// Choose a seed from environment or use the provided default.
pub fn fixture_seed(default_seed: u64) -> u64 {
    env_u64("FABRIK_TEST_SEED")
        .or_else(|| env_u64("FABRIK_SEED"))
        .unwrap_or(default_seed)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
