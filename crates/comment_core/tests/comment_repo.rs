use comment_core::{
    CallContext, CommentId, CommentInsert, CommentRepository, CommentRow, CommentStore,
    NewComment, SqliteCommentStore, StoreCommentRepository, StoreError, StoreResult, Target,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

fn ctx() -> CallContext {
    CallContext::background()
}

fn setup() -> StoreCommentRepository<SqliteCommentStore> {
    StoreCommentRepository::new(SqliteCommentStore::open_in_memory().unwrap())
}

fn article() -> Target {
    Target::new("article", 42)
}

#[test]
fn create_and_find_by_id_maps_domain_fields() {
    let repo = setup();
    let root = repo
        .create(&ctx(), &NewComment::top_level(7, article(), "root"))
        .unwrap();
    let reply = repo
        .create(&ctx(), &NewComment::reply(8, article(), root, "reply"))
        .unwrap();

    let loaded = repo.find_by_id(&ctx(), reply).unwrap();
    assert_eq!(loaded.author.id, 8);
    assert_eq!(loaded.target, article());
    assert_eq!(loaded.content, "reply");
    assert_eq!(loaded.parent_id, Some(root));
    assert_eq!(loaded.ancestor_id, Some(root));
    assert!(repo.find_by_id(&ctx(), root).unwrap().is_top_level());
}

#[test]
fn ancestor_page_attaches_bounded_previews() {
    let repo = setup();
    let busy = repo
        .create(&ctx(), &NewComment::top_level(1, article(), "busy"))
        .unwrap();
    let quiet = repo
        .create(&ctx(), &NewComment::top_level(1, article(), "quiet"))
        .unwrap();
    let mut replies = Vec::new();
    for n in 0..5 {
        replies.push(
            repo.create(
                &ctx(),
                &NewComment::reply(2, article(), busy, format!("reply {n}")),
            )
            .unwrap(),
        );
    }
    repo.create(&ctx(), &NewComment::reply(3, article(), replies[0], "nested"))
        .unwrap();

    let page = repo
        .find_ancestors(&ctx(), &article(), i64::MAX, 10, 3)
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, quiet);
    assert!(page[0].children.is_empty());

    assert_eq!(page[1].id, busy);
    let preview: Vec<CommentId> = page[1].children.iter().map(|c| c.id).collect();
    assert_eq!(preview, replies[..3].to_vec());
    assert!(page[1].children.iter().all(|c| c.children.is_empty()));
}

#[test]
fn zero_preview_count_skips_fan_out() {
    let repo = setup();
    let root = repo
        .create(&ctx(), &NewComment::top_level(1, article(), "root"))
        .unwrap();
    repo.create(&ctx(), &NewComment::reply(2, article(), root, "reply"))
        .unwrap();

    let page = repo
        .find_ancestors(&ctx(), &article(), i64::MAX, 10, 0)
        .unwrap();
    assert_eq!(page.len(), 1);
    assert!(page[0].children.is_empty());
}

#[test]
fn descendants_and_counts_pass_through() {
    let repo = setup();
    let root = repo
        .create(&ctx(), &NewComment::top_level(1, article(), "A"))
        .unwrap();
    let r1 = repo
        .create(&ctx(), &NewComment::reply(2, article(), root, "R1"))
        .unwrap();
    let r2 = repo
        .create(&ctx(), &NewComment::reply(3, article(), r1, "R2"))
        .unwrap();

    let thread = repo.find_descendants(&ctx(), root, 0, 10).unwrap();
    let ids: Vec<CommentId> = thread.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![r1, r2]);
    assert_eq!(thread[1].parent_id, Some(r1));
    assert_eq!(thread[1].ancestor_id, Some(root));

    assert_eq!(repo.count_ancestors(&ctx(), &article()).unwrap(), 1);
    assert_eq!(repo.count_descendants(&ctx(), root).unwrap(), 2);
}

/// Store wrapper whose `find_children` fails for selected parents.
struct FlakyChildrenStore {
    inner: SqliteCommentStore,
    failing_parents: HashSet<CommentId>,
    children_calls: AtomicUsize,
}

impl CommentStore for FlakyChildrenStore {
    fn create(&self, ctx: &CallContext, comment: &CommentInsert) -> StoreResult<CommentId> {
        self.inner.create(ctx, comment)
    }

    fn find_ancestors(
        &self,
        ctx: &CallContext,
        target: &Target,
        min_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>> {
        self.inner.find_ancestors(ctx, target, min_id, limit)
    }

    fn count_ancestors(&self, ctx: &CallContext, target: &Target) -> StoreResult<i64> {
        self.inner.count_ancestors(ctx, target)
    }

    fn find_children(
        &self,
        ctx: &CallContext,
        parent_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>> {
        self.children_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_parents.contains(&parent_id) {
            return Err(StoreError::InvalidData(format!("broken preview {parent_id}")));
        }
        self.inner.find_children(ctx, parent_id, limit)
    }

    fn find_descendants(
        &self,
        ctx: &CallContext,
        ancestor_id: CommentId,
        max_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>> {
        self.inner.find_descendants(ctx, ancestor_id, max_id, limit)
    }

    fn count_descendants(&self, ctx: &CallContext, ancestor_id: CommentId) -> StoreResult<i64> {
        self.inner.count_descendants(ctx, ancestor_id)
    }

    fn find_by_id(&self, ctx: &CallContext, id: CommentId) -> StoreResult<CommentRow> {
        self.inner.find_by_id(ctx, id)
    }

    fn delete(&self, ctx: &CallContext, id: CommentId) -> StoreResult<()> {
        self.inner.delete(ctx, id)
    }
}

#[test]
fn one_failed_preview_fails_the_page_after_all_tasks_ran() {
    let inner = SqliteCommentStore::open_in_memory().unwrap();
    let seed = StoreCommentRepository::new(inner.clone());
    let ids: Vec<CommentId> = (0..4)
        .map(|n| {
            seed.create(&ctx(), &NewComment::top_level(1, article(), format!("c{n}")))
                .unwrap()
        })
        .collect();

    let repo = StoreCommentRepository::new(FlakyChildrenStore {
        inner,
        failing_parents: HashSet::from([ids[1]]),
        children_calls: AtomicUsize::new(0),
    });

    let err = repo
        .find_ancestors(&ctx(), &article(), i64::MAX, 10, 3)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(message) if message.contains("broken preview")));
    assert_eq!(repo.store().children_calls.load(Ordering::SeqCst), 4);
}
