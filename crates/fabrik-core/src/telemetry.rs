#![forbid(unsafe_code)]

//! Per-transaction timing.
//!
//! Timestamps are recorded as the transaction moves through commit, diff and
//! mount. They are instrumentation only and never influence behaviour.

use std::time::Duration;

use web_time::Instant;

/// Timestamps for one commit-to-mount transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionTelemetry {
    pub revision_number: u64,
    pub commit_start: Option<Instant>,
    pub commit_end: Option<Instant>,
    pub layout_start: Option<Instant>,
    pub layout_end: Option<Instant>,
    pub diff_start: Option<Instant>,
    pub diff_end: Option<Instant>,
    pub mount_start: Option<Instant>,
    pub mount_end: Option<Instant>,
}

fn span(start: Option<Instant>, end: Option<Instant>) -> Option<Duration> {
    match (start, end) {
        (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
        _ => None,
    }
}

impl TransactionTelemetry {
    pub fn will_commit(&mut self) {
        self.commit_start = Some(Instant::now());
    }

    pub fn did_commit(&mut self) {
        self.commit_end = Some(Instant::now());
    }

    pub fn will_layout(&mut self) {
        self.layout_start = Some(Instant::now());
    }

    pub fn did_layout(&mut self) {
        self.layout_end = Some(Instant::now());
    }

    pub fn will_diff(&mut self) {
        self.diff_start = Some(Instant::now());
    }

    pub fn did_diff(&mut self) {
        self.diff_end = Some(Instant::now());
    }

    pub fn will_mount(&mut self) {
        self.mount_start = Some(Instant::now());
    }

    pub fn did_mount(&mut self) {
        self.mount_end = Some(Instant::now());
    }

    pub fn commit_duration(&self) -> Option<Duration> {
        span(self.commit_start, self.commit_end)
    }

    pub fn layout_duration(&self) -> Option<Duration> {
        span(self.layout_start, self.layout_end)
    }

    pub fn diff_duration(&self) -> Option<Duration> {
        span(self.diff_start, self.diff_end)
    }

    pub fn mount_duration(&self) -> Option<Duration> {
        span(self.mount_start, self.mount_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_need_both_ends() {
        let mut t = TransactionTelemetry::default();
        assert_eq!(t.commit_duration(), None);
        t.will_commit();
        assert_eq!(t.commit_duration(), None);
        t.did_commit();
        assert!(t.commit_duration().is_some());
    }

    #[test]
    fn stages_are_independent() {
        let mut t = TransactionTelemetry::default();
        t.will_diff();
        t.did_diff();
        assert!(t.diff_duration().is_some());
        assert!(t.mount_duration().is_none());
        assert!(t.layout_duration().is_none());
    }
}
