//! Ancestor pointer derivation.
//!
//! Every reply stores the id of its thread's top-level comment, so a whole
//! thread can be read with one indexed scan instead of walking `parent_id`
//! chains.

use super::CommentRow;
use crate::model::comment::CommentId;

/// Computes the `ancestor_id` of a comment created under `parent`.
///
/// - No parent: the new comment is top-level and has no ancestor.
/// - Top-level parent: the parent itself is the ancestor.
/// - Reply parent: inherit the parent's ancestor.
pub fn resolve_ancestor(parent: Option<&CommentRow>) -> Option<CommentId> {
    let parent = parent?;
    match parent.ancestor_id {
        None => Some(parent.id),
        Some(ancestor_id) => Some(ancestor_id),
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_ancestor;
    use crate::store::CommentRow;

    fn row(id: i64, parent_id: Option<i64>, ancestor_id: Option<i64>) -> CommentRow {
        CommentRow {
            id,
            author_id: 1,
            biz: "article".to_string(),
            biz_id: 1,
            content: format!("comment {id}"),
            parent_id,
            ancestor_id,
            ctime: 0,
            utime: 0,
        }
    }

    #[test]
    fn no_parent_means_top_level() {
        assert_eq!(resolve_ancestor(None), None);
    }

    #[test]
    fn top_level_parent_becomes_ancestor() {
        let parent = row(10, None, None);
        assert_eq!(resolve_ancestor(Some(&parent)), Some(10));
    }

    #[test]
    fn reply_parent_passes_its_ancestor_down() {
        let parent = row(12, Some(11), Some(10));
        assert_eq!(resolve_ancestor(Some(&parent)), Some(10));
    }
}
