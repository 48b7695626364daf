//! SQLite-backed comment store.
//!
//! # Responsibility
//! - Run every primitive comment query against a pooled connection.
//! - Keep SQL text and row parsing inside the store boundary.
//!
//! # Invariants
//! - `create` reads the parent and inserts the child in one `IMMEDIATE`
//!   transaction, so a concurrently deleted parent cannot leave a dangling
//!   `ancestor_id`.
//! - Deletes never rely on SQL cascades: a top-level delete removes the
//!   thread by `ancestor_id` in one statement, a reply delete walks its
//!   subtree in memory. Neither depends on reply depth.
//! - Pooled connections are verified against the migrated schema on open.

use super::pool::ConnectionPool;
use super::{resolve_ancestor, CommentInsert, CommentRow, CommentStore, StoreError, StoreResult};
use crate::context::CallContext;
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, open_reader};
use crate::model::comment::{CommentId, Target};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const COMMENT_SELECT_SQL: &str = "SELECT
    id,
    author_id,
    biz,
    biz_id,
    content,
    parent_id,
    ancestor_id,
    ctime,
    utime
FROM comments";

const COMMENT_COLUMNS: [&str; 9] = [
    "id",
    "author_id",
    "biz",
    "biz_id",
    "content",
    "parent_id",
    "ancestor_id",
    "ctime",
    "utime",
];

/// Connection pool settings for file-backed stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Read-only connections opened next to the writer. `0` routes reads
    /// through the writer.
    pub read_connections: usize,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// SQLite-backed comment store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct SqliteCommentStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteCommentStore {
    /// Opens (and migrates) a database file with a pooled set of readers.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        let writer = open_db(path).map_err(|err| StoreError::from(err).in_op("open"))?;
        writer.busy_timeout(config.busy_timeout)?;

        let mut readers = Vec::with_capacity(config.read_connections);
        for _ in 0..config.read_connections {
            let reader = open_reader(path, config.busy_timeout)
                .map_err(|err| StoreError::from(err).in_op("open"))?;
            readers.push(reader);
        }

        let store = Self::from_pool(ConnectionPool::new(writer, readers))?;
        info!(
            "event=comment_store_open module=store status=ok mode=file readers={}",
            store.pool.reader_count()
        );
        Ok(store)
    }

    /// Opens a migrated in-memory database served by a single connection.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = open_db_in_memory().map_err(|err| StoreError::from(err).in_op("open"))?;
        Self::try_new(conn)
    }

    /// Wraps an already migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        Self::from_pool(ConnectionPool::new(conn, Vec::new()))
    }

    fn from_pool(pool: ConnectionPool) -> StoreResult<Self> {
        pool.for_each(ensure_comment_connection_ready)?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn with_connection<T>(
        &self,
        ctx: &CallContext,
        op: &'static str,
        access: Access,
        run: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        if ctx.is_expired() {
            debug!("event=comment_store module=store status=deadline op={op} stage=before_acquire");
            return Err(StoreError::DeadlineExceeded { op });
        }

        let started_at = Instant::now();
        let conn = match access {
            Access::Read => self.pool.reader(),
            Access::Write => self.pool.writer(),
        };
        if ctx.is_expired() {
            debug!("event=comment_store module=store status=deadline op={op} stage=after_acquire");
            return Err(StoreError::DeadlineExceeded { op });
        }

        let result = run(&*conn).map_err(|err| err.in_op(op));
        match &result {
            Ok(_) => debug!(
                "event=comment_store module=store status=ok op={} duration_ms={}",
                op,
                started_at.elapsed().as_millis()
            ),
            Err(err) if err.is_semantic() => debug!(
                "event=comment_store module=store status=rejected op={} duration_ms={} error={}",
                op,
                started_at.elapsed().as_millis(),
                err
            ),
            Err(err) => warn!(
                "event=comment_store module=store status=error op={} duration_ms={} error={}",
                op,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

impl CommentStore for SqliteCommentStore {
    fn create(&self, ctx: &CallContext, comment: &CommentInsert) -> StoreResult<CommentId> {
        let (id, ancestor_id) = self.with_connection(ctx, "create", Access::Write, |conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

            let parent = match comment.parent_id {
                Some(parent_id) => Some(
                    load_row(&tx, parent_id)?.ok_or(StoreError::InvalidParent(parent_id))?,
                ),
                None => None,
            };
            let ancestor_id = resolve_ancestor(parent.as_ref());

            tx.execute(
                "INSERT INTO comments (
                    author_id,
                    biz,
                    biz_id,
                    content,
                    parent_id,
                    ancestor_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    comment.author_id,
                    comment.biz.as_str(),
                    comment.biz_id,
                    comment.content.as_str(),
                    comment.parent_id,
                    ancestor_id,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok((id, ancestor_id))
        })?;

        info!(
            "event=comment_create module=store status=ok id={} biz={} biz_id={} parent_id={} ancestor_id={}",
            id,
            comment.biz,
            comment.biz_id,
            display_opt(comment.parent_id),
            display_opt(ancestor_id)
        );
        Ok(id)
    }

    fn find_ancestors(
        &self,
        ctx: &CallContext,
        target: &Target,
        min_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>> {
        self.with_connection(ctx, "find_ancestors", Access::Read, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{COMMENT_SELECT_SQL}
                 WHERE biz = ?1
                   AND biz_id = ?2
                   AND ancestor_id IS NULL
                   AND id < ?3
                 ORDER BY id DESC
                 LIMIT ?4;"
            ))?;
            let mut rows = stmt.query(params![
                target.biz.as_str(),
                target.biz_id,
                min_id,
                i64::from(limit)
            ])?;
            collect_rows(&mut rows)
        })
    }

    fn count_ancestors(&self, ctx: &CallContext, target: &Target) -> StoreResult<i64> {
        self.with_connection(ctx, "count_ancestors", Access::Read, |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*)
                 FROM comments
                 WHERE biz = ?1
                   AND biz_id = ?2
                   AND ancestor_id IS NULL;",
                params![target.biz.as_str(), target.biz_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    fn find_children(
        &self,
        ctx: &CallContext,
        parent_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>> {
        self.with_connection(ctx, "find_children", Access::Read, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{COMMENT_SELECT_SQL}
                 WHERE parent_id = ?1
                 ORDER BY id ASC
                 LIMIT ?2;"
            ))?;
            let mut rows = stmt.query(params![parent_id, i64::from(limit)])?;
            collect_rows(&mut rows)
        })
    }

    fn find_descendants(
        &self,
        ctx: &CallContext,
        ancestor_id: CommentId,
        max_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>> {
        self.with_connection(ctx, "find_descendants", Access::Read, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{COMMENT_SELECT_SQL}
                 WHERE ancestor_id = ?1
                   AND id > ?2
                 ORDER BY id ASC
                 LIMIT ?3;"
            ))?;
            let mut rows = stmt.query(params![ancestor_id, max_id, i64::from(limit)])?;
            collect_rows(&mut rows)
        })
    }

    fn count_descendants(&self, ctx: &CallContext, ancestor_id: CommentId) -> StoreResult<i64> {
        self.with_connection(ctx, "count_descendants", Access::Read, |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*)
                 FROM comments
                 WHERE ancestor_id = ?1;",
                [ancestor_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    fn find_by_id(&self, ctx: &CallContext, id: CommentId) -> StoreResult<CommentRow> {
        self.with_connection(ctx, "find_by_id", Access::Read, |conn| {
            load_row(conn, id)?.ok_or(StoreError::NotFound(id))
        })
    }

    fn delete(&self, ctx: &CallContext, id: CommentId) -> StoreResult<()> {
        let removed = self.with_connection(ctx, "delete", Access::Write, |conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            let row = load_row(&tx, id)?.ok_or(StoreError::NotFound(id))?;

            let removed = match row.ancestor_id {
                None => tx.execute(
                    "DELETE FROM comments
                     WHERE ancestor_id = ?1
                        OR id = ?1;",
                    [id],
                )?,
                Some(ancestor_id) => {
                    let subtree = collect_subtree(&tx, ancestor_id, id)?;
                    let mut stmt = tx.prepare_cached("DELETE FROM comments WHERE id = ?1;")?;
                    // Leaves first so no statement leaves a dangling parent_id.
                    for doomed in subtree.iter().rev() {
                        stmt.execute([*doomed])?;
                    }
                    subtree.len()
                }
            };
            tx.commit()?;
            Ok(removed)
        })?;

        info!("event=comment_delete module=store status=ok id={id} removed={removed}");
        Ok(())
    }
}

/// Ids of `root` and every reply beneath it, parents before children.
///
/// Walks the thread's `parent_id` links in memory; the whole thread is one
/// range scan on `ancestor_id`.
fn collect_subtree(
    conn: &Connection,
    ancestor_id: CommentId,
    root: CommentId,
) -> StoreResult<Vec<CommentId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, parent_id
         FROM comments
         WHERE ancestor_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
    let mut rows = stmt.query([ancestor_id])?;
    while let Some(row) = rows.next()? {
        let child: CommentId = row.get(0)?;
        let parent: CommentId = row.get(1)?;
        children.entry(parent).or_default().push(child);
    }

    let mut subtree = vec![root];
    let mut cursor = 0;
    while let Some(&current) = subtree.get(cursor) {
        if let Some(replies) = children.remove(&current) {
            subtree.extend(replies);
        }
        cursor += 1;
    }
    Ok(subtree)
}

fn load_row(conn: &Connection, id: CommentId) -> StoreResult<Option<CommentRow>> {
    let row = conn
        .query_row(
            &format!("{COMMENT_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_comment_row,
        )
        .optional()?;
    Ok(row)
}

fn collect_rows(rows: &mut rusqlite::Rows<'_>) -> StoreResult<Vec<CommentRow>> {
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_comment_row(row)?);
    }
    Ok(items)
}

fn parse_comment_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        biz: row.get("biz")?,
        biz_id: row.get("biz_id")?,
        content: row.get("content")?,
        parent_id: row.get("parent_id")?,
        ancestor_id: row.get("ancestor_id")?,
        ctime: row.get("ctime")?,
        utime: row.get("utime")?,
    })
}

fn display_opt(value: Option<CommentId>) -> String {
    value.map_or_else(|| "none".to_string(), |id| id.to_string())
}

fn ensure_comment_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for column in COMMENT_COLUMNS {
        if !table_has_column(conn, "comments", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "comments",
                column,
            });
        }
    }

    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
