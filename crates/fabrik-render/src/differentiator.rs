#![forbid(unsafe_code)]

//! Tree differentiator.
//!
//! Computes the ordered list of [`ShadowViewMutation`]s that turns the host
//! view hierarchy of one revision into that of another.
//!
//! # Matching
//!
//! Children are compared level by level as view pairs (see
//! [`slice_child_shadow_node_view_pairs`]). Two pairs denote the same view
//! when their tags are equal *and* their nodes share a family; a tag reused by
//! a different family is treated as a removal plus an insertion.
//!
//! # Output order per level
//!
//! ```text
//! destructive downward → updates → removes (highest index first)
//!   → deletes → creates → downward → inserts
//! ```
//!
//! Descendants of removed views are torn down before their parents are
//! deleted, a view is created before anything is inserted under it, and
//! removes are applied back to front so every index stays valid.
//!
//! # Modes
//!
//! - [`DifferentiatorMode::Classic`]: common prefix, then everything else is
//!   removed and (re)inserted. Simple, produces more mutations for moves.
//! - [`DifferentiatorMode::OptimizedMoves`]: common prefix, fast paths for
//!   pure appends and pure truncations, then a two-pointer walk that keeps
//!   views that stay in relative order in place.
//!
//! Nodes that are the same `Arc` in both revisions are not descended into.

use ahash::AHashMap;
use fabrik_core::{ShadowNode, Tag};
use serde::{Deserialize, Serialize};

use crate::mutation::ShadowViewMutation;
use crate::shadow_view::{ShadowView, ShadowViewNodePair, slice_child_shadow_node_view_pairs};

/// Algorithm used to compare child lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferentiatorMode {
    Classic,
    #[default]
    OptimizedMoves,
}

/// Differentiator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffOptions {
    pub mode: DifferentiatorMode,
    /// Emit a single `DeleteRecursive` for a removed subtree instead of a
    /// `Remove`/`Delete` pair for every view in it.
    pub collapse_deleted_subtrees: bool,
}

impl DiffOptions {
    pub fn new(mode: DifferentiatorMode) -> Self {
        Self {
            mode,
            collapse_deleted_subtrees: false,
        }
    }

    #[must_use]
    pub fn collapse_deleted_subtrees(mut self, collapse: bool) -> Self {
        self.collapse_deleted_subtrees = collapse;
        self
    }
}

/// Compute the mutations that transform `old_root`'s views into `new_root`'s.
///
/// # Panics
///
/// Panics if the roots do not belong to the same family.
pub fn calculate_shadow_view_mutations(
    options: DiffOptions,
    old_root: &ShadowNode,
    new_root: &ShadowNode,
) -> Vec<ShadowViewMutation> {
    assert!(
        old_root.same_family(new_root),
        "roots must belong to the same family (old {}, new {})",
        old_root.tag(),
        new_root.tag()
    );

    #[cfg(feature = "tracing")]
    let _span = tracing::trace_span!(
        "fabrik.differentiator",
        mode = ?options.mode,
        root = old_root.tag().get()
    )
    .entered();

    let mut mutations = Vec::new();
    if std::ptr::eq(old_root, new_root) {
        return mutations;
    }

    let old_view = ShadowView::new(old_root);
    let new_view = ShadowView::new(new_root);
    if old_view != new_view {
        mutations.push(ShadowViewMutation::update(old_view, new_view));
    }

    let differ = Differ { options };
    differ.diff_children(
        &mut mutations,
        old_root.tag(),
        slice_child_shadow_node_view_pairs(old_root),
        slice_child_shadow_node_view_pairs(new_root),
    );

    #[cfg(feature = "tracing")]
    tracing::trace!(mutations = mutations.len(), "diff complete");

    mutations
}

// ---------------------------------------------------------------------------
// Bookkeeping
// ---------------------------------------------------------------------------

/// Insertion-ordered map from tag to an index in the new child list.
#[derive(Default)]
struct InsertedPairs {
    slots: Vec<Option<usize>>,
    by_tag: AHashMap<Tag, usize>,
}

impl InsertedPairs {
    fn insert(&mut self, tag: Tag, new_index: usize) {
        self.by_tag.insert(tag, self.slots.len());
        self.slots.push(Some(new_index));
    }

    fn get(&self, tag: Tag) -> Option<usize> {
        self.by_tag.get(&tag).and_then(|&slot| self.slots[slot])
    }

    fn erase(&mut self, tag: Tag) {
        if let Some(slot) = self.by_tag.remove(&tag) {
            self.slots[slot] = None;
        }
    }

    fn remaining(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().flatten().copied()
    }
}

/// Mutations collected for one level before they are concatenated.
#[derive(Default)]
struct LevelMutations {
    destructive_downward: Vec<ShadowViewMutation>,
    updates: Vec<ShadowViewMutation>,
    removes: Vec<ShadowViewMutation>,
    deletes: Vec<ShadowViewMutation>,
    creates: Vec<ShadowViewMutation>,
    downward: Vec<ShadowViewMutation>,
    inserts: Vec<ShadowViewMutation>,
}

impl LevelMutations {
    fn flush_into(self, out: &mut Vec<ShadowViewMutation>) {
        out.extend(self.destructive_downward);
        out.extend(self.updates);
        out.extend(self.removes.into_iter().rev());
        out.extend(self.deletes);
        out.extend(self.creates);
        out.extend(self.downward);
        out.extend(self.inserts);
    }
}

fn same_view(old: &ShadowViewNodePair<'_>, new: &ShadowViewNodePair<'_>) -> bool {
    old.shadow_view.tag == new.shadow_view.tag && old.shadow_node.same_family(new.shadow_node)
}

// ---------------------------------------------------------------------------
// Differ
// ---------------------------------------------------------------------------

struct Differ {
    options: DiffOptions,
}

impl Differ {
    fn diff_children(
        &self,
        out: &mut Vec<ShadowViewMutation>,
        parent_tag: Tag,
        old: Vec<ShadowViewNodePair<'_>>,
        new: Vec<ShadowViewNodePair<'_>>,
    ) {
        if old.is_empty() && new.is_empty() {
            return;
        }
        let mut level = LevelMutations::default();
        match self.options.mode {
            DifferentiatorMode::Classic => self.classic(&mut level, parent_tag, &old, &new),
            DifferentiatorMode::OptimizedMoves => {
                self.optimized_moves(&mut level, parent_tag, &old, &new)
            }
        }
        level.flush_into(out);
    }

    /// Update and descend into a pair that survives in the new revision.
    fn diff_matched(
        &self,
        level: &mut LevelMutations,
        old: &ShadowViewNodePair<'_>,
        new: &ShadowViewNodePair<'_>,
    ) {
        if old.shadow_view != new.shadow_view {
            level.updates.push(ShadowViewMutation::update(
                old.shadow_view.clone(),
                new.shadow_view.clone(),
            ));
        }
        if std::ptr::eq(old.shadow_node, new.shadow_node) {
            return;
        }
        let old_grandchildren = slice_child_shadow_node_view_pairs(old.shadow_node);
        let new_grandchildren = slice_child_shadow_node_view_pairs(new.shadow_node);
        let target = if new_grandchildren.is_empty() {
            &mut level.destructive_downward
        } else {
            &mut level.downward
        };
        self.diff_children(
            target,
            new.shadow_view.tag,
            old_grandchildren,
            new_grandchildren,
        );
    }

    /// Detach an old view that has no counterpart and tear down its subtree.
    fn remove_and_delete(
        &self,
        level: &mut LevelMutations,
        parent_tag: Tag,
        old: &ShadowViewNodePair<'_>,
        index: usize,
    ) {
        level.removes.push(ShadowViewMutation::remove(
            parent_tag,
            old.shadow_view.clone(),
            index,
        ));
        if self.options.collapse_deleted_subtrees {
            level
                .deletes
                .push(ShadowViewMutation::delete_recursive(old.shadow_view.clone()));
            return;
        }
        level
            .deletes
            .push(ShadowViewMutation::delete(old.shadow_view.clone()));
        self.diff_children(
            &mut level.destructive_downward,
            old.shadow_view.tag,
            slice_child_shadow_node_view_pairs(old.shadow_node),
            Vec::new(),
        );
    }

    /// Create a brand new view and build its subtree.
    fn create(&self, level: &mut LevelMutations, new: &ShadowViewNodePair<'_>) {
        level
            .creates
            .push(ShadowViewMutation::create(new.shadow_view.clone()));
        self.diff_children(
            &mut level.downward,
            new.shadow_view.tag,
            Vec::new(),
            slice_child_shadow_node_view_pairs(new.shadow_node),
        );
    }

    /// Length of the common prefix, emitting updates for it.
    fn common_prefix(
        &self,
        level: &mut LevelMutations,
        old: &[ShadowViewNodePair<'_>],
        new: &[ShadowViewNodePair<'_>],
    ) -> usize {
        let mut index = 0;
        while index < old.len() && index < new.len() {
            if !same_view(&old[index], &new[index]) {
                break;
            }
            self.diff_matched(level, &old[index], &new[index]);
            index += 1;
        }
        index
    }

    fn classic(
        &self,
        level: &mut LevelMutations,
        parent_tag: Tag,
        old: &[ShadowViewNodePair<'_>],
        new: &[ShadowViewNodePair<'_>],
    ) {
        let first = self.common_prefix(level, old, new);

        let mut inserted = InsertedPairs::default();
        for (index, pair) in new.iter().enumerate().skip(first) {
            level.inserts.push(ShadowViewMutation::insert(
                parent_tag,
                pair.shadow_view.clone(),
                index,
            ));
            inserted.insert(pair.shadow_view.tag, index);
        }

        for (index, old_pair) in old.iter().enumerate().skip(first) {
            let reinserted = inserted
                .get(old_pair.shadow_view.tag)
                .filter(|&new_index| same_view(old_pair, &new[new_index]));
            match reinserted {
                None => self.remove_and_delete(level, parent_tag, old_pair, index),
                Some(new_index) => {
                    level.removes.push(ShadowViewMutation::remove(
                        parent_tag,
                        old_pair.shadow_view.clone(),
                        index,
                    ));
                    let new_pair = &new[new_index];
                    if !old_pair.is_identical(new_pair) {
                        self.diff_matched(level, old_pair, new_pair);
                    }
                    inserted.erase(old_pair.shadow_view.tag);
                }
            }
        }

        for new_index in inserted.remaining() {
            self.create(level, &new[new_index]);
        }
    }

    fn optimized_moves(
        &self,
        level: &mut LevelMutations,
        parent_tag: Tag,
        old: &[ShadowViewNodePair<'_>],
        new: &[ShadowViewNodePair<'_>],
    ) {
        let first = self.common_prefix(level, old, new);

        if first == new.len() {
            for (index, old_pair) in old.iter().enumerate().skip(first) {
                self.remove_and_delete(level, parent_tag, old_pair, index);
            }
            return;
        }

        if first == old.len() {
            for (index, new_pair) in new.iter().enumerate().skip(first) {
                level.inserts.push(ShadowViewMutation::insert(
                    parent_tag,
                    new_pair.shadow_view.clone(),
                    index,
                ));
                self.create(level, new_pair);
            }
            return;
        }

        let mut new_remaining: AHashMap<Tag, usize> = new
            .iter()
            .enumerate()
            .skip(first)
            .map(|(index, pair)| (pair.shadow_view.tag, index))
            .collect();
        let mut inserted = InsertedPairs::default();

        let (mut old_index, mut new_index) = (first, first);
        while new_index < new.len() || old_index < old.len() {
            let have_new = new_index < new.len();
            let have_old = old_index < old.len();

            if have_new && have_old && same_view(&old[old_index], &new[new_index]) {
                let tag = old[old_index].shadow_view.tag;
                new_remaining.remove(&tag);
                self.diff_matched(level, &old[old_index], &new[new_index]);
                old_index += 1;
                new_index += 1;
                continue;
            }

            if have_old {
                let old_pair = &old[old_index];
                let tag = old_pair.shadow_view.tag;

                // Already inserted further up: this is a move.
                let moved = inserted
                    .get(tag)
                    .filter(|&index| same_view(old_pair, &new[index]));
                if let Some(moved_index) = moved {
                    level.removes.push(ShadowViewMutation::remove(
                        parent_tag,
                        old_pair.shadow_view.clone(),
                        old_index,
                    ));
                    self.diff_matched(level, old_pair, &new[moved_index]);
                    inserted.erase(tag);
                    old_index += 1;
                    continue;
                }

                let still_present = new_remaining
                    .get(&tag)
                    .is_some_and(|&index| same_view(old_pair, &new[index]));
                if !still_present || !have_new {
                    self.remove_and_delete(level, parent_tag, old_pair, old_index);
                    old_index += 1;
                    continue;
                }
            }

            // The old view (if any) appears later in the new list; insert the
            // new view here and decide on create once the walk is done.
            let new_pair = &new[new_index];
            level.inserts.push(ShadowViewMutation::insert(
                parent_tag,
                new_pair.shadow_view.clone(),
                new_index,
            ));
            inserted.insert(new_pair.shadow_view.tag, new_index);
            new_index += 1;
        }

        for new_index in inserted.remaining() {
            self.create(level, &new[new_index]);
        }
    }
}
