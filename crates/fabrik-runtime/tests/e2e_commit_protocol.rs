#![forbid(unsafe_code)]

//! E2E test: commit protocol of `ShadowTree`.
//!
//! Covers:
//! (1) revision numbers increase by one per successful commit
//! (2) transactions returning `None` cancel without publishing
//! (3) hooks run in registration order and can veto or substitute
//! (4) a nested commit from a hook makes the outer attempt retry
//! (5) `try_commit` propagates the transaction's error untouched
//! (6) the delegate hears about every published revision
//! (7) the commit span carries the published revision number
//! (8) hooks hear about published revisions only, once each
//!
//! Run:
//!   cargo test -p fabrik-runtime --test e2e_commit_protocol

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use fabrik_core::{ShadowNode, ShadowTreeRevision, SurfaceId};
use fabrik_harness::logging::with_capture;
use fabrik_harness::{TreeBuilder, with_children, with_props};
use fabrik_runtime::{
    CommitHook, CommitStatus, MountingCoordinator, PipelineConfig, ShadowTree, ShadowTreeDelegate,
};
use parking_lot::Mutex;
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

fn tree() -> (Arc<ShadowTree>, TreeBuilder) {
    let tree = Arc::new(ShadowTree::new(SurfaceId(1), &PipelineConfig::default(), None));
    let builder = TreeBuilder::with_root_family(Arc::clone(tree.root_family()));
    (tree, builder)
}

fn append_leaf(builder: &TreeBuilder) -> impl FnMut(&Arc<ShadowNode>) -> Option<Arc<ShadowNode>> + '_ {
    move |root| {
        let mut children = root.children().to_vec();
        children.push(builder.leaf("View"));
        Some(with_children(root, children))
    }
}

/// Appends its name to a shared log, then lets the commit through.
struct OrderHook {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl CommitHook for OrderHook {
    fn shadow_tree_will_commit(
        &self,
        _tree: &ShadowTree,
        _old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        self.log.lock().push(self.name);
        Some(new_root)
    }
}

struct VetoHook;

impl CommitHook for VetoHook {
    fn shadow_tree_will_commit(
        &self,
        _tree: &ShadowTree,
        _old_root: &Arc<ShadowNode>,
        _new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        None
    }
}

/// Stamps the candidate root's props.
struct StampHook;

impl CommitHook for StampHook {
    fn shadow_tree_will_commit(
        &self,
        _tree: &ShadowTree,
        _old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        Some(with_props(&new_root, json!({"stamped": true})))
    }
}

/// Issues one nested commit the first time it runs.
struct NestedCommitHook {
    fired: AtomicBool,
    calls: AtomicUsize,
}

impl CommitHook for NestedCommitHook {
    fn shadow_tree_will_commit(
        &self,
        tree: &ShadowTree,
        _old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.fired.swap(true, Ordering::SeqCst) {
            let status = tree.commit(|root| Some(with_props(root, json!({"nested": true}))));
            assert_eq!(status, CommitStatus::Succeeded);
        }
        Some(new_root)
    }
}

/// Records every published revision a hook is told about.
#[derive(Default)]
struct PublishedHook {
    published: Mutex<Vec<(u64, usize)>>,
}

impl CommitHook for PublishedHook {
    fn shadow_tree_will_commit(
        &self,
        _tree: &ShadowTree,
        _old_root: &Arc<ShadowNode>,
        new_root: Arc<ShadowNode>,
    ) -> Option<Arc<ShadowNode>> {
        Some(new_root)
    }

    fn shadow_tree_did_commit(&self, tree: &ShadowTree, revision: &ShadowTreeRevision) {
        assert_eq!(tree.current_revision().number(), revision.number());
        self.published
            .lock()
            .push((revision.number().get(), revision.root().children().len()));
    }
}

#[derive(Default)]
struct CountingDelegate {
    revisions: Mutex<Vec<u64>>,
}

impl ShadowTreeDelegate for CountingDelegate {
    fn shadow_tree_did_finish_transaction(
        &self,
        tree: &ShadowTree,
        _coordinator: &Arc<MountingCoordinator>,
    ) {
        self.revisions
            .lock()
            .push(tree.current_revision().number().get());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn revisions_increase_by_one() {
    let (tree, builder) = tree();
    assert_eq!(tree.current_revision().number().get(), 0);
    for expected in 1..=5 {
        assert_eq!(tree.commit(append_leaf(&builder)), CommitStatus::Succeeded);
        assert_eq!(tree.current_revision().number().get(), expected);
    }
    assert_eq!(tree.current_revision().root().children().len(), 5);
}

#[test]
fn aborted_transaction_is_cancelled() {
    let (tree, _) = tree();
    let before = tree.current_revision();
    assert_eq!(tree.commit(|_| None), CommitStatus::Cancelled);
    assert!(Arc::ptr_eq(&before, &tree.current_revision()));
    assert!(!tree.mounting_coordinator().has_pending_transactions());
}

#[test]
fn hooks_run_in_registration_order() {
    let (tree, builder) = tree();
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        tree.register_commit_hook(Arc::new(OrderHook {
            name,
            log: Arc::clone(&log),
        }));
    }
    tree.commit(append_leaf(&builder));
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn veto_hook_cancels_and_later_hooks_do_not_run() {
    let (tree, builder) = tree();
    let log = Arc::new(Mutex::new(Vec::new()));
    tree.register_commit_hook(Arc::new(VetoHook));
    tree.register_commit_hook(Arc::new(OrderHook {
        name: "after",
        log: Arc::clone(&log),
    }));
    assert_eq!(tree.commit(append_leaf(&builder)), CommitStatus::Cancelled);
    assert!(log.lock().is_empty());
    assert_eq!(tree.current_revision().number().get(), 0);
}

#[test]
fn hook_can_substitute_the_root() {
    let (tree, builder) = tree();
    tree.register_commit_hook(Arc::new(StampHook));
    tree.commit(append_leaf(&builder));
    let revision = tree.current_revision();
    assert_eq!(revision.root().props().value(), &json!({"stamped": true}));
    assert_eq!(revision.root().children().len(), 1);
}

#[test]
fn unregistered_hook_stops_running() {
    let (tree, builder) = tree();
    let veto: Arc<dyn CommitHook> = Arc::new(VetoHook);
    tree.register_commit_hook(Arc::clone(&veto));
    assert_eq!(tree.commit_hook_count(), 1);
    assert!(tree.unregister_commit_hook(&veto));
    assert!(!tree.unregister_commit_hook(&veto));
    assert_eq!(tree.commit(append_leaf(&builder)), CommitStatus::Succeeded);
}

#[test]
fn nested_commit_forces_a_retry() {
    let (tree, builder) = tree();
    let hook = Arc::new(NestedCommitHook {
        fired: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });
    tree.register_commit_hook(hook.clone());

    let mut attempts = 0;
    let status = tree.commit(|root| {
        attempts += 1;
        append_leaf(&builder)(root)
    });

    assert_eq!(status, CommitStatus::Succeeded);
    assert_eq!(attempts, 2);
    // outer attempt, nested commit, retried outer attempt
    assert_eq!(hook.calls.load(Ordering::SeqCst), 3);
    let revision = tree.current_revision();
    assert_eq!(revision.number().get(), 2);
    assert_eq!(revision.root().props().value(), &json!({"nested": true}));
    assert_eq!(revision.root().children().len(), 1);
}

#[test]
fn did_commit_sees_published_revisions_only() {
    let (tree, builder) = tree();
    let published = Arc::new(PublishedHook::default());
    tree.register_commit_hook(published.clone());
    tree.register_commit_hook(Arc::new(NestedCommitHook {
        fired: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    }));

    assert_eq!(tree.commit(append_leaf(&builder)), CommitStatus::Succeeded);
    // nested commit first, then the retried outer attempt
    assert_eq!(*published.published.lock(), vec![(1, 0), (2, 1)]);

    tree.register_commit_hook(Arc::new(VetoHook));
    assert_eq!(tree.commit(append_leaf(&builder)), CommitStatus::Cancelled);
    assert_eq!(published.published.lock().len(), 2);
}

#[test]
fn retries_are_bounded() {
    let mut config = PipelineConfig::default();
    config.commit.max_attempts = 3;
    let tree = Arc::new(ShadowTree::new(SurfaceId(1), &config, None));

    struct AlwaysNested;
    impl CommitHook for AlwaysNested {
        fn shadow_tree_will_commit(
            &self,
            tree: &ShadowTree,
            old_root: &Arc<ShadowNode>,
            new_root: Arc<ShadowNode>,
        ) -> Option<Arc<ShadowNode>> {
            // Only the outer commit (which changes props) nests.
            if new_root.props().value() != old_root.props().value() {
                tree.commit(|root| Some(with_children(root, Vec::new())));
            }
            Some(new_root)
        }
    }

    tree.register_commit_hook(Arc::new(AlwaysNested));
    let mut counter = 0;
    let status = tree.commit(|root| {
        counter += 1;
        Some(with_props(root, json!({ "attempt": counter })))
    });
    assert_eq!(status, CommitStatus::Failed);
    assert_eq!(counter, 3);
    assert_eq!(tree.current_revision().number().get(), 3);
}

#[test]
fn try_commit_propagates_errors() {
    let (tree, _) = tree();
    let result: Result<CommitStatus, String> = tree.try_commit(|_| Err("layout failed".to_string()));
    assert_eq!(result, Err("layout failed".to_string()));
    assert_eq!(tree.current_revision().number().get(), 0);

    let ok: Result<CommitStatus, String> =
        tree.try_commit(|root| Ok(Some(with_props(root, json!(1)))));
    assert_eq!(ok, Ok(CommitStatus::Succeeded));
}

#[test]
fn delegate_sees_every_published_revision() {
    let delegate = Arc::new(CountingDelegate::default());
    let tree = Arc::new(ShadowTree::new(
        SurfaceId(1),
        &PipelineConfig::default(),
        Some(delegate.clone()),
    ));
    let builder = TreeBuilder::with_root_family(Arc::clone(tree.root_family()));
    tree.commit(append_leaf(&builder));
    tree.commit(|_| None);
    tree.commit(append_leaf(&builder));
    assert_eq!(*delegate.revisions.lock(), vec![1, 2]);
}

#[test]
#[should_panic(expected = "does not belong to")]
fn foreign_root_panics() {
    let (tree, _) = tree();
    let other = TreeBuilder::new(SurfaceId(2));
    let foreign = other.root(Vec::new());
    tree.commit(move |_| Some(Arc::clone(&foreign)));
}

#[test]
fn commit_span_records_revision() {
    let (tree, builder) = tree();
    let (status, capture) = with_capture(|| tree.commit(append_leaf(&builder)));
    assert_eq!(status, CommitStatus::Succeeded);
    let spans = capture.spans_named("fabrik.commit");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].field("surface_id"), Some("1"));
    assert_eq!(spans[0].field("revision"), Some("1"));
}

#[test]
fn empty_tree_commit_drops_children() {
    let (tree, builder) = tree();
    tree.commit(append_leaf(&builder));
    tree.commit(append_leaf(&builder));
    assert_eq!(tree.commit_empty_tree(), CommitStatus::Succeeded);
    assert!(tree.current_revision().root().children().is_empty());
}
