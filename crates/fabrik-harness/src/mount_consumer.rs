#![forbid(unsafe_code)]

//! A stand-in for the platform mounting layer.

use std::sync::Arc;

use fabrik_core::ShadowNode;
use fabrik_render::{StubViewTree, StubViewTreeError};
use fabrik_runtime::MountingCoordinator;

/// Pulls transactions from one coordinator and applies them to a mirror.
#[derive(Debug)]
pub struct MountConsumer {
    coordinator: Arc<MountingCoordinator>,
    mirror: StubViewTree,
    transactions: Vec<u64>,
    mutations_applied: usize,
}

impl MountConsumer {
    /// Start from the coordinator's current base revision.
    pub fn new(coordinator: Arc<MountingCoordinator>) -> Self {
        let mirror = StubViewTree::from_root(coordinator.base_revision().root());
        Self {
            coordinator,
            mirror,
            transactions: Vec::new(),
            mutations_applied: 0,
        }
    }

    pub fn coordinator(&self) -> &Arc<MountingCoordinator> {
        &self.coordinator
    }

    /// Pull and apply one transaction. Returns its number, or `None` when
    /// nothing was pending.
    pub fn pull(&mut self) -> Result<Option<u64>, StubViewTreeError> {
        let Some(transaction) = self.coordinator.pull_transaction() else {
            return Ok(None);
        };
        self.mirror.apply(transaction.mutations())?;
        self.mutations_applied += transaction.mutations().len();
        self.transactions.push(transaction.number());
        Ok(Some(transaction.number()))
    }

    /// Pull until nothing is pending. Returns the number of transactions.
    pub fn drain(&mut self) -> Result<usize, StubViewTreeError> {
        let mut pulled = 0;
        while self.pull()?.is_some() {
            pulled += 1;
        }
        Ok(pulled)
    }

    pub fn mirror(&self) -> &StubViewTree {
        &self.mirror
    }

    /// Numbers of every transaction applied so far, in order.
    pub fn transactions(&self) -> &[u64] {
        &self.transactions
    }

    pub fn mutations_applied(&self) -> usize {
        self.mutations_applied
    }

    /// True when the mirror is what mounting `root` from scratch would give.
    pub fn matches(&self, root: &ShadowNode) -> bool {
        self.mirror == StubViewTree::from_root(root)
    }
}
