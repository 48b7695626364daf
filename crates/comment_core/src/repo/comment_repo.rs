//! Comment repository contracts and store-backed implementation.
//!
//! # Responsibility
//! - Map `CommentRow` to `Comment` and `NewComment` to `CommentInsert`.
//! - Fan out one preview query per ancestor on top-level pages.
//!
//! # Invariants
//! - Preview tasks all run to completion; the first failure in page order
//!   fails the whole page and no partial page is returned.
//! - Descendant listing is a straight mapping without fan-out.

use crate::context::CallContext;
use crate::model::comment::{Author, Comment, CommentId, NewComment, Target};
use crate::store::{CommentInsert, CommentRow, CommentStore, StoreError, StoreResult};
use log::warn;
use rayon::prelude::*;

/// Repository interface for threaded comment access.
pub trait CommentRepository: Send + Sync {
    fn create(&self, ctx: &CallContext, comment: &NewComment) -> StoreResult<CommentId>;
    fn find_by_id(&self, ctx: &CallContext, id: CommentId) -> StoreResult<Comment>;
    /// Top-level page (newest first) with up to `max_sub_cnt` oldest direct
    /// replies attached to each entry as `children`.
    fn find_ancestors(
        &self,
        ctx: &CallContext,
        target: &Target,
        min_id: CommentId,
        limit: u32,
        max_sub_cnt: u32,
    ) -> StoreResult<Vec<Comment>>;
    fn count_ancestors(&self, ctx: &CallContext, target: &Target) -> StoreResult<i64>;
    /// Flattened thread page (oldest first) under one top-level comment.
    fn find_descendants(
        &self,
        ctx: &CallContext,
        ancestor_id: CommentId,
        max_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<Comment>>;
    fn count_descendants(&self, ctx: &CallContext, ancestor_id: CommentId) -> StoreResult<i64>;
    fn delete(&self, ctx: &CallContext, id: CommentId) -> StoreResult<()>;
}

/// Repository backed by any [`CommentStore`].
pub struct StoreCommentRepository<S: CommentStore> {
    store: S,
}

impl<S: CommentStore> StoreCommentRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: CommentStore> CommentRepository for StoreCommentRepository<S> {
    fn create(&self, ctx: &CallContext, comment: &NewComment) -> StoreResult<CommentId> {
        self.store.create(ctx, &to_insert(comment))
    }

    fn find_by_id(&self, ctx: &CallContext, id: CommentId) -> StoreResult<Comment> {
        to_domain(self.store.find_by_id(ctx, id)?)
    }

    fn find_ancestors(
        &self,
        ctx: &CallContext,
        target: &Target,
        min_id: CommentId,
        limit: u32,
        max_sub_cnt: u32,
    ) -> StoreResult<Vec<Comment>> {
        let mut ancestors = to_domain_all(self.store.find_ancestors(ctx, target, min_id, limit)?)?;
        if max_sub_cnt == 0 || ancestors.is_empty() {
            return Ok(ancestors);
        }

        // One task per ancestor. Collected as `Vec<Result>` so no task is
        // skipped after a sibling fails.
        let previews: Vec<StoreResult<Vec<CommentRow>>> = ancestors
            .par_iter()
            .map(|ancestor| self.store.find_children(ctx, ancestor.id, max_sub_cnt))
            .collect();

        let failed = previews.iter().filter(|preview| preview.is_err()).count();
        if failed > 0 {
            warn!(
                "event=comment_preview_fanout module=repo status=error biz={} biz_id={} tasks={} failed={}",
                target.biz,
                target.biz_id,
                previews.len(),
                failed
            );
        }

        for (ancestor, preview) in ancestors.iter_mut().zip(previews) {
            ancestor.children = to_domain_all(preview?)?;
        }
        Ok(ancestors)
    }

    fn count_ancestors(&self, ctx: &CallContext, target: &Target) -> StoreResult<i64> {
        self.store.count_ancestors(ctx, target)
    }

    fn find_descendants(
        &self,
        ctx: &CallContext,
        ancestor_id: CommentId,
        max_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<Comment>> {
        to_domain_all(
            self.store
                .find_descendants(ctx, ancestor_id, max_id, limit)?,
        )
    }

    fn count_descendants(&self, ctx: &CallContext, ancestor_id: CommentId) -> StoreResult<i64> {
        self.store.count_descendants(ctx, ancestor_id)
    }

    fn delete(&self, ctx: &CallContext, id: CommentId) -> StoreResult<()> {
        self.store.delete(ctx, id)
    }
}

fn to_insert(comment: &NewComment) -> CommentInsert {
    CommentInsert {
        author_id: comment.author_id,
        biz: comment.target.biz.clone(),
        biz_id: comment.target.biz_id,
        content: comment.content.clone(),
        parent_id: comment.parent_id,
    }
}

fn to_domain(row: CommentRow) -> StoreResult<Comment> {
    if row.parent_id.is_some() != row.ancestor_id.is_some() {
        return Err(StoreError::InvalidData(format!(
            "comment {} has parent_id {:?} but ancestor_id {:?}",
            row.id, row.parent_id, row.ancestor_id
        )));
    }

    Ok(Comment {
        id: row.id,
        author: Author::from_id(row.author_id),
        target: Target::new(row.biz, row.biz_id),
        content: row.content,
        parent_id: row.parent_id,
        ancestor_id: row.ancestor_id,
        children: Vec::new(),
        ctime: row.ctime,
        utime: row.utime,
    })
}

fn to_domain_all(rows: Vec<CommentRow>) -> StoreResult<Vec<Comment>> {
    rows.into_iter().map(to_domain).collect()
}
