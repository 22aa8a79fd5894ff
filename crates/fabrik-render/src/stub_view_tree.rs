#![forbid(unsafe_code)]

//! In-memory mirror of a host view hierarchy.
//!
//! [`StubViewTree`] applies mutation batches exactly as a faithful host would
//! and rejects anything a host could not do (creating a view twice, deleting
//! an attached view, removing from the wrong index, ...). It is used to check
//! that a diff really transforms one revision into another:
//!
//! ```text
//! StubViewTree::from_root(old) + diff(old, new)  ==  StubViewTree::from_root(new)
//! ```

use std::fmt;

use ahash::AHashMap;
use fabrik_core::{ShadowNode, Tag};

use crate::mutation::ShadowViewMutation;
use crate::shadow_view::{ShadowView, slice_child_shadow_node_view_pairs};

/// Error applying a mutation to a [`StubViewTree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StubViewTreeError {
    #[error("view {0} already exists")]
    AlreadyExists(Tag),
    #[error("view {0} does not exist")]
    UnknownView(Tag),
    #[error("view {child} is still attached to {parent}")]
    StillAttached { child: Tag, parent: Tag },
    #[error("view {child} is already attached to {parent}")]
    AlreadyAttached { child: Tag, parent: Tag },
    #[error("view {tag} still has {count} children")]
    HasChildren { tag: Tag, count: usize },
    #[error("index {index} out of bounds for {parent} with {len} children")]
    IndexOutOfBounds { parent: Tag, index: usize, len: usize },
    #[error("expected {expected} at {parent}[{index}], found {found:?}")]
    IndexMismatch {
        parent: Tag,
        index: usize,
        expected: Tag,
        found: Option<Tag>,
    },
    #[error("update of {0} does not match the mirrored view")]
    StaleUpdate(Tag),
}

/// One mirrored view.
#[derive(Debug, Clone, PartialEq)]
pub struct StubView {
    pub view: ShadowView,
    pub parent: Option<Tag>,
    pub children: Vec<Tag>,
}

impl StubView {
    fn detached(view: ShadowView) -> Self {
        Self {
            view,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Mirror of the views a host holds for one surface.
#[derive(Debug, Clone)]
pub struct StubViewTree {
    root_tag: Tag,
    views: AHashMap<Tag, StubView>,
}

impl StubViewTree {
    /// A mirror containing only the root view.
    pub fn new(root: ShadowView) -> Self {
        let root_tag = root.tag;
        let mut views = AHashMap::new();
        views.insert(root_tag, StubView::detached(root));
        Self { root_tag, views }
    }

    /// The mirror a host would hold after mounting `root` from scratch.
    pub fn from_root(root: &ShadowNode) -> Self {
        let mut tree = Self::new(ShadowView::new(root));
        tree.build_children(root.tag(), root);
        tree
    }

    fn build_children(&mut self, parent_tag: Tag, node: &ShadowNode) {
        for pair in slice_child_shadow_node_view_pairs(node) {
            let tag = pair.shadow_view.tag;
            let mut stub = StubView::detached(pair.shadow_view);
            stub.parent = Some(parent_tag);
            self.views.insert(tag, stub);
            if let Some(parent) = self.views.get_mut(&parent_tag) {
                parent.children.push(tag);
            }
            self.build_children(tag, pair.shadow_node);
        }
    }

    #[inline]
    pub fn root_tag(&self) -> Tag {
        self.root_tag
    }

    /// Number of live views, attached or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn view(&self, tag: Tag) -> Option<&StubView> {
        self.views.get(&tag)
    }

    /// Child tags of `tag`, empty when unknown.
    pub fn children_of(&self, tag: Tag) -> &[Tag] {
        self.views
            .get(&tag)
            .map(|view| view.children.as_slice())
            .unwrap_or(&[])
    }

    /// Apply a batch in order, stopping at the first invalid mutation.
    pub fn apply(&mut self, mutations: &[ShadowViewMutation]) -> Result<(), StubViewTreeError> {
        mutations.iter().try_for_each(|mutation| self.apply_one(mutation))
    }

    /// Apply a single mutation.
    pub fn apply_one(&mut self, mutation: &ShadowViewMutation) -> Result<(), StubViewTreeError> {
        match mutation {
            ShadowViewMutation::Create { new_child } => {
                if self.views.contains_key(&new_child.tag) {
                    return Err(StubViewTreeError::AlreadyExists(new_child.tag));
                }
                self.views
                    .insert(new_child.tag, StubView::detached(new_child.clone()));
                Ok(())
            }
            ShadowViewMutation::Delete { old_child } => {
                let stub = self.detached_view(old_child.tag)?;
                if !stub.children.is_empty() {
                    return Err(StubViewTreeError::HasChildren {
                        tag: old_child.tag,
                        count: stub.children.len(),
                    });
                }
                self.views.remove(&old_child.tag);
                Ok(())
            }
            ShadowViewMutation::DeleteRecursive { old_child } => {
                self.detached_view(old_child.tag)?;
                self.delete_subtree(old_child.tag);
                Ok(())
            }
            ShadowViewMutation::Insert {
                parent_tag,
                new_child,
                index,
            } => {
                let child_tag = new_child.tag;
                let child = self
                    .views
                    .get(&child_tag)
                    .ok_or(StubViewTreeError::UnknownView(child_tag))?;
                if let Some(parent) = child.parent {
                    return Err(StubViewTreeError::AlreadyAttached {
                        child: child_tag,
                        parent,
                    });
                }
                let parent = self
                    .views
                    .get_mut(parent_tag)
                    .ok_or(StubViewTreeError::UnknownView(*parent_tag))?;
                if *index > parent.children.len() {
                    return Err(StubViewTreeError::IndexOutOfBounds {
                        parent: *parent_tag,
                        index: *index,
                        len: parent.children.len(),
                    });
                }
                parent.children.insert(*index, child_tag);
                if let Some(child) = self.views.get_mut(&child_tag) {
                    child.parent = Some(*parent_tag);
                }
                Ok(())
            }
            ShadowViewMutation::Remove {
                parent_tag,
                old_child,
                index,
            } => {
                let child_tag = old_child.tag;
                if !self.views.contains_key(&child_tag) {
                    return Err(StubViewTreeError::UnknownView(child_tag));
                }
                let parent = self
                    .views
                    .get_mut(parent_tag)
                    .ok_or(StubViewTreeError::UnknownView(*parent_tag))?;
                let found = parent.children.get(*index).copied();
                if found != Some(child_tag) {
                    return Err(StubViewTreeError::IndexMismatch {
                        parent: *parent_tag,
                        index: *index,
                        expected: child_tag,
                        found,
                    });
                }
                parent.children.remove(*index);
                if let Some(child) = self.views.get_mut(&child_tag) {
                    child.parent = None;
                }
                Ok(())
            }
            ShadowViewMutation::Update {
                old_child,
                new_child,
            } => {
                let stub = self
                    .views
                    .get_mut(&new_child.tag)
                    .ok_or(StubViewTreeError::UnknownView(new_child.tag))?;
                if old_child.tag != new_child.tag || stub.view != *old_child {
                    return Err(StubViewTreeError::StaleUpdate(new_child.tag));
                }
                stub.view = new_child.clone();
                Ok(())
            }
        }
    }

    fn detached_view(&self, tag: Tag) -> Result<&StubView, StubViewTreeError> {
        let stub = self
            .views
            .get(&tag)
            .ok_or(StubViewTreeError::UnknownView(tag))?;
        match stub.parent {
            Some(parent) => Err(StubViewTreeError::StillAttached { child: tag, parent }),
            None => Ok(stub),
        }
    }

    fn delete_subtree(&mut self, tag: Tag) {
        if let Some(stub) = self.views.remove(&tag) {
            for child in stub.children {
                self.delete_subtree(child);
            }
        }
    }

    fn subtree_eq(&self, other: &StubViewTree, tag: Tag) -> bool {
        match (self.views.get(&tag), other.views.get(&tag)) {
            (Some(a), Some(b)) => {
                a.view == b.view
                    && a.children == b.children
                    && a.children.iter().all(|child| self.subtree_eq(other, *child))
            }
            _ => false,
        }
    }

    fn write_subtree(&self, f: &mut fmt::Formatter<'_>, tag: Tag, depth: usize) -> fmt::Result {
        let Some(stub) = self.views.get(&tag) else {
            return writeln!(f, "{:indent$}<missing {tag}>", "", indent = depth * 2);
        };
        writeln!(
            f,
            "{:indent$}{} [{}] {}",
            "",
            stub.view.component_name,
            tag.get(),
            stub.view.props.value(),
            indent = depth * 2
        )?;
        for child in &stub.children {
            self.write_subtree(f, *child, depth + 1)?;
        }
        Ok(())
    }
}

impl PartialEq for StubViewTree {
    fn eq(&self, other: &Self) -> bool {
        self.root_tag == other.root_tag
            && self.views.len() == other.views.len()
            && self.subtree_eq(other, self.root_tag)
    }
}

impl fmt::Display for StubViewTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_subtree(f, self.root_tag, 0)
    }
}
