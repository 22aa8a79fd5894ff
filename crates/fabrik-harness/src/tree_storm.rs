#![forbid(unsafe_code)]

//! Seeded random tree edits for stress and round-trip testing.
//!
//! A storm produces a chain of roots, each a small random edit away from the
//! previous one. Edits follow the identity rules the differentiator relies
//! on: new nodes get fresh families, existing families keep their parent,
//! and untouched subtrees are shared by pointer.
//!
//! | Edit | Effect |
//! |------|--------|
//! | [`StormEdit::Append`] | insert a new random subtree under any node |
//! | [`StormEdit::Remove`] | drop a non-root node and its subtree |
//! | [`StormEdit::Reorder`] | rotate or reverse a child list |
//! | [`StormEdit::Props`] | replace a node's props |
//! | [`StormEdit::OrderIndex`] | change a node's paint order |
//! | [`StormEdit::Frame`] | move or resize a node |

use std::sync::Arc;

use fabrik_core::{
    LayoutMetrics, NodeTraits, Rect, ShadowNode, ShadowNodeFamily, ShadowNodeFragment,
};
use serde_json::json;

use crate::tree_builder::TreeBuilder;

const COMPONENTS: [&str; 4] = ["View", "Text", "Image", "ScrollView"];

// ============================================================================
// Configuration
// ============================================================================

/// Kind of edit applied to a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StormEdit {
    Append,
    Remove,
    Reorder,
    Props,
    OrderIndex,
    Frame,
}

impl StormEdit {
    pub const ALL: [StormEdit; 6] = [
        Self::Append,
        Self::Remove,
        Self::Reorder,
        Self::Props,
        Self::OrderIndex,
        Self::Frame,
    ];

    /// Name for logging.
    pub fn name(self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Remove => "remove",
            Self::Reorder => "reorder",
            Self::Props => "props",
            Self::OrderIndex => "order_index",
            Self::Frame => "frame",
        }
    }
}

/// Shape of a storm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StormConfig {
    pub seed: u64,
    /// Edits between consecutive roots.
    pub edits_per_revision: usize,
    /// Depth of freshly appended subtrees.
    pub max_subtree_depth: usize,
    /// Children per freshly created node.
    pub max_fanout: usize,
    /// Share of new nodes that are layout-only, in percent.
    pub layout_only_percent: u8,
}

impl StormConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            edits_per_revision: 3,
            max_subtree_depth: 2,
            max_fanout: 3,
            layout_only_percent: 25,
        }
    }

    #[must_use]
    pub fn edits_per_revision(mut self, edits: usize) -> Self {
        self.edits_per_revision = edits;
        self
    }

    #[must_use]
    pub fn max_subtree_depth(mut self, depth: usize) -> Self {
        self.max_subtree_depth = depth;
        self
    }

    #[must_use]
    pub fn max_fanout(mut self, fanout: usize) -> Self {
        self.max_fanout = fanout;
        self
    }

    #[must_use]
    pub fn layout_only_percent(mut self, percent: u8) -> Self {
        self.layout_only_percent = percent.min(100);
        self
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Simple deterministic PRNG (xorshift64) for reproducible storms.
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next() % bound as u64) as usize
    }

    fn chance(&mut self, percent: u8) -> bool {
        self.below(100) < percent as usize
    }
}

/// A node of the current tree and the family of its parent.
struct Located {
    node: Arc<ShadowNode>,
    parent: Option<Arc<ShadowNodeFamily>>,
}

fn locate_all(root: &Arc<ShadowNode>) -> Vec<Located> {
    fn walk(node: &Arc<ShadowNode>, parent: Option<&Arc<ShadowNodeFamily>>, out: &mut Vec<Located>) {
        out.push(Located {
            node: Arc::clone(node),
            parent: parent.cloned(),
        });
        for child in node.children().iter() {
            walk(child, Some(node.family()), out);
        }
    }
    let mut out = Vec::new();
    walk(root, None, &mut out);
    out
}

/// Seeded generator of edited roots.
pub struct TreeStorm {
    rng: Rng,
    builder: TreeBuilder,
    config: StormConfig,
}

impl TreeStorm {
    pub fn new(builder: TreeBuilder, config: StormConfig) -> Self {
        Self {
            rng: Rng::new(config.seed),
            builder,
            config,
        }
    }

    pub fn builder(&self) -> &TreeBuilder {
        &self.builder
    }

    pub fn config(&self) -> &StormConfig {
        &self.config
    }

    /// A root holding a few random subtrees.
    pub fn initial_root(&mut self) -> Arc<ShadowNode> {
        let count = 1 + self.rng.below(self.config.max_fanout.max(1));
        let children = (0..count)
            .map(|_| self.subtree(self.config.max_subtree_depth))
            .collect();
        self.builder.root(children)
    }

    /// `count` roots, starting from [`initial_root`](Self::initial_root).
    pub fn revisions(&mut self, count: usize) -> Vec<Arc<ShadowNode>> {
        let mut roots = Vec::with_capacity(count);
        if count == 0 {
            return roots;
        }
        let mut root = self.initial_root();
        roots.push(Arc::clone(&root));
        for _ in 1..count {
            root = self.next_root(&root);
            roots.push(Arc::clone(&root));
        }
        roots
    }

    /// Apply the configured number of random edits to `root`.
    pub fn next_root(&mut self, root: &Arc<ShadowNode>) -> Arc<ShadowNode> {
        let mut current = Arc::clone(root);
        for _ in 0..self.config.edits_per_revision.max(1) {
            let edit = StormEdit::ALL[self.rng.below(StormEdit::ALL.len())];
            current = self.apply(&current, edit);
        }
        current
    }

    /// Apply one edit. Edits without a valid target fall back to `Append`.
    pub fn apply(&mut self, root: &Arc<ShadowNode>, edit: StormEdit) -> Arc<ShadowNode> {
        let located = locate_all(root);
        let edited = match edit {
            StormEdit::Append => None,
            StormEdit::Remove => self.remove(root, &located),
            StormEdit::Reorder => self.reorder(root, &located),
            StormEdit::Props => {
                let target = &located[self.rng.below(located.len())].node;
                let props = json!({ "value": self.rng.next() % 1000 });
                root.clone_tree(target.family(), |node| {
                    node.clone_with(ShadowNodeFragment::default().props(props))
                })
            }
            StormEdit::OrderIndex => self.pick_non_root(&located).and_then(|target| {
                let order_index = self.rng.below(5) as i32 - 2;
                root.clone_tree(target.family(), |node| {
                    node.clone_with(ShadowNodeFragment::default().order_index(order_index))
                })
            }),
            StormEdit::Frame => self.pick_non_root(&located).and_then(|target| {
                let frame = self.random_frame();
                root.clone_tree(target.family(), |node| {
                    let metrics = LayoutMetrics {
                        frame,
                        ..*node.layout_metrics()
                    };
                    node.clone_with(ShadowNodeFragment::default().layout_metrics(metrics))
                })
            }),
        };
        match edited {
            Some(root) => root,
            None => self.append(root, &located),
        }
    }

    fn pick_non_root(&mut self, located: &[Located]) -> Option<Arc<ShadowNode>> {
        if located.len() < 2 {
            return None;
        }
        Some(Arc::clone(&located[1 + self.rng.below(located.len() - 1)].node))
    }

    fn append(&mut self, root: &Arc<ShadowNode>, located: &[Located]) -> Arc<ShadowNode> {
        let target = Arc::clone(&located[self.rng.below(located.len())].node);
        let subtree = self.subtree(self.config.max_subtree_depth);
        let position = self.rng.below(target.children().len() + 1);
        root.clone_tree(target.family(), |node| {
            let mut children = node.children().to_vec();
            children.insert(position, subtree);
            node.clone_with(ShadowNodeFragment::default().children(children))
        })
        .unwrap_or_else(|| Arc::clone(root))
    }

    fn remove(&mut self, root: &Arc<ShadowNode>, located: &[Located]) -> Option<Arc<ShadowNode>> {
        if located.len() < 2 {
            return None;
        }
        let victim = &located[1 + self.rng.below(located.len() - 1)];
        let parent = victim.parent.as_ref()?;
        root.clone_tree(parent, |node| {
            let children: Vec<_> = node
                .children()
                .iter()
                .filter(|child| !child.same_family(&victim.node))
                .cloned()
                .collect();
            node.clone_with(ShadowNodeFragment::default().children(children))
        })
    }

    fn reorder(&mut self, root: &Arc<ShadowNode>, located: &[Located]) -> Option<Arc<ShadowNode>> {
        let parents: Vec<&Arc<ShadowNode>> = located
            .iter()
            .map(|entry| &entry.node)
            .filter(|node| node.children().len() >= 2)
            .collect();
        if parents.is_empty() {
            return None;
        }
        let target = parents[self.rng.below(parents.len())];
        let len = target.children().len();
        let rotate_by = 1 + self.rng.below(len - 1);
        let reverse = self.rng.chance(50);
        root.clone_tree(target.family(), |node| {
            let mut children = node.children().to_vec();
            if reverse {
                children.reverse();
            } else {
                children.rotate_left(rotate_by);
            }
            node.clone_with(ShadowNodeFragment::default().children(children))
        })
    }

    fn subtree(&mut self, depth: usize) -> Arc<ShadowNode> {
        let traits = if self.rng.chance(self.config.layout_only_percent) {
            NodeTraits::LAYOUT_ONLY
        } else {
            NodeTraits::default()
        };
        let name = COMPONENTS[self.rng.below(COMPONENTS.len())];
        let child_count = if depth == 0 {
            0
        } else {
            self.rng.below(self.config.max_fanout + 1)
        };
        let children: Vec<Arc<ShadowNode>> =
            (0..child_count).map(|_| self.subtree(depth - 1)).collect();
        let frame = self.random_frame();
        let props = json!({ "value": self.rng.next() % 1000 });
        self.builder.node(
            name,
            traits,
            ShadowNodeFragment::default()
                .props(props)
                .children(children)
                .layout_metrics(LayoutMetrics::with_frame(frame)),
        )
    }

    fn random_frame(&mut self) -> Rect {
        Rect::new(
            self.rng.below(8) as f32 * 10.0,
            self.rng.below(8) as f32 * 10.0,
            10.0 + self.rng.below(4) as f32 * 10.0,
            10.0 + self.rng.below(4) as f32 * 10.0,
        )
    }
}
