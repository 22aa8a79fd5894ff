#![forbid(unsafe_code)]

//! Numbered, immutable tree revisions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shadow_node::ShadowNode;
use crate::telemetry::TransactionTelemetry;

/// Position of a revision in a surface's commit sequence.
///
/// The initial (empty) revision is number 0; every commit gets a strictly
/// larger number than all previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionNumber(pub u64);

impl RevisionNumber {
    pub const INITIAL: RevisionNumber = RevisionNumber(0);

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The number that follows this one.
    #[inline]
    pub const fn next(self) -> RevisionNumber {
        RevisionNumber(self.0 + 1)
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// An immutable snapshot of a surface's tree at one commit.
///
/// Revisions are shared (`Arc<ShadowTreeRevision>`) between the tree's current
/// slot, the mounting coordinator and the timeline history.
#[derive(Debug, Clone)]
pub struct ShadowTreeRevision {
    root: Arc<ShadowNode>,
    number: RevisionNumber,
    telemetry: TransactionTelemetry,
}

impl ShadowTreeRevision {
    pub fn new(root: Arc<ShadowNode>, number: RevisionNumber, telemetry: TransactionTelemetry) -> Self {
        Self {
            root,
            number,
            telemetry,
        }
    }

    #[inline]
    pub fn root(&self) -> &Arc<ShadowNode> {
        &self.root
    }

    #[inline]
    pub fn number(&self) -> RevisionNumber {
        self.number
    }

    #[inline]
    pub fn telemetry(&self) -> &TransactionTelemetry {
        &self.telemetry
    }
}
