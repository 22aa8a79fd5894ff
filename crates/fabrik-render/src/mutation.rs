#![forbid(unsafe_code)]

//! Structural edits produced by the differentiator.

use std::fmt;

use fabrik_core::Tag;
use serde::Serialize;

use crate::shadow_view::ShadowView;

/// One atomic edit to the host view hierarchy.
///
/// Every variant carries full [`ShadowView`]s, so a mutation can be applied
/// without access to the tree that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShadowViewMutation {
    /// Create a detached view.
    Create { new_child: ShadowView },
    /// Destroy a detached view that has no children.
    Delete { old_child: ShadowView },
    /// Attach `new_child` under `parent_tag` at `index`.
    Insert {
        parent_tag: Tag,
        new_child: ShadowView,
        index: usize,
    },
    /// Detach `old_child` from `parent_tag` at `index`. The view stays alive.
    Remove {
        parent_tag: Tag,
        old_child: ShadowView,
        index: usize,
    },
    /// Replace the payload of an existing view.
    Update {
        old_child: ShadowView,
        new_child: ShadowView,
    },
    /// Destroy a detached view together with every view below it.
    DeleteRecursive { old_child: ShadowView },
}

/// Discriminant of a [`ShadowViewMutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Delete,
    Insert,
    Remove,
    Update,
    DeleteRecursive,
}

impl ShadowViewMutation {
    pub fn create(new_child: ShadowView) -> Self {
        Self::Create { new_child }
    }

    pub fn delete(old_child: ShadowView) -> Self {
        Self::Delete { old_child }
    }

    pub fn insert(parent_tag: Tag, new_child: ShadowView, index: usize) -> Self {
        Self::Insert {
            parent_tag,
            new_child,
            index,
        }
    }

    pub fn remove(parent_tag: Tag, old_child: ShadowView, index: usize) -> Self {
        Self::Remove {
            parent_tag,
            old_child,
            index,
        }
    }

    pub fn update(old_child: ShadowView, new_child: ShadowView) -> Self {
        Self::Update {
            old_child,
            new_child,
        }
    }

    pub fn delete_recursive(old_child: ShadowView) -> Self {
        Self::DeleteRecursive { old_child }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Create { .. } => MutationKind::Create,
            Self::Delete { .. } => MutationKind::Delete,
            Self::Insert { .. } => MutationKind::Insert,
            Self::Remove { .. } => MutationKind::Remove,
            Self::Update { .. } => MutationKind::Update,
            Self::DeleteRecursive { .. } => MutationKind::DeleteRecursive,
        }
    }

    /// Tag of the view this mutation addresses.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Create { new_child }
            | Self::Insert { new_child, .. }
            | Self::Update { new_child, .. } => new_child.tag,
            Self::Delete { old_child }
            | Self::Remove { old_child, .. }
            | Self::DeleteRecursive { old_child } => old_child.tag,
        }
    }

    /// Parent tag for `Insert`/`Remove`.
    pub fn parent_tag(&self) -> Option<Tag> {
        match self {
            Self::Insert { parent_tag, .. } | Self::Remove { parent_tag, .. } => Some(*parent_tag),
            _ => None,
        }
    }

    /// Child index for `Insert`/`Remove`.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Insert { index, .. } | Self::Remove { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for ShadowViewMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { new_child } => {
                write!(f, "Create [{}] {}", new_child.tag.get(), new_child.component_name)
            }
            Self::Delete { old_child } => write!(f, "Delete [{}]", old_child.tag.get()),
            Self::Insert {
                parent_tag,
                new_child,
                index,
            } => write!(
                f,
                "Insert [{}] -> [{}] @{}",
                new_child.tag.get(),
                parent_tag.get(),
                index
            ),
            Self::Remove {
                parent_tag,
                old_child,
                index,
            } => write!(
                f,
                "Remove [{}] <- [{}] @{}",
                old_child.tag.get(),
                parent_tag.get(),
                index
            ),
            Self::Update { new_child, .. } => write!(f, "Update [{}]", new_child.tag.get()),
            Self::DeleteRecursive { old_child } => {
                write!(f, "DeleteRecursive [{}]", old_child.tag.get())
            }
        }
    }
}

/// Render a mutation list one line per entry.
pub fn format_mutations(mutations: &[ShadowViewMutation]) -> String {
    let mut out = String::new();
    for mutation in mutations {
        out.push_str(&mutation.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_core::{NodeTraits, ShadowNode, ShadowNodeFamily, ShadowNodeFragment, SurfaceId};

    fn view(tag: i32) -> ShadowView {
        ShadowView::new(&ShadowNode::new(
            ShadowNodeFamily::new(Tag(tag), SurfaceId(1), "Text", NodeTraits::default()),
            ShadowNodeFragment::default(),
        ))
    }

    #[test]
    fn accessors() {
        let m = ShadowViewMutation::insert(Tag(1), view(7), 3);
        assert_eq!(m.kind(), MutationKind::Insert);
        assert_eq!(m.tag(), Tag(7));
        assert_eq!(m.parent_tag(), Some(Tag(1)));
        assert_eq!(m.index(), Some(3));

        let d = ShadowViewMutation::delete(view(7));
        assert_eq!(d.parent_tag(), None);
        assert_eq!(d.index(), None);
    }

    #[test]
    fn display_lines() {
        let list = vec![
            ShadowViewMutation::create(view(2)),
            ShadowViewMutation::insert(Tag(1), view(2), 0),
            ShadowViewMutation::remove(Tag(1), view(3), 1),
            ShadowViewMutation::delete(view(3)),
        ];
        assert_eq!(
            format_mutations(&list),
            "Create [2] Text\nInsert [2] -> [1] @0\nRemove [3] <- [1] @1\nDelete [3]\n"
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(ShadowViewMutation::delete(view(4))).unwrap();
        assert_eq!(json["type"], "delete");
        assert_eq!(json["old_child"]["tag"], 4);
    }
}
