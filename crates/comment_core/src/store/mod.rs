//! Comment storage layer.
//!
//! # Responsibility
//! - Own the single `comments` table and every primitive query over it.
//! - Derive each new comment's ancestor pointer inside the insert transaction.
//!
//! # Invariants
//! - Top-level listing is newest first (`id DESC`, cursor `id < min_id`).
//! - Child and descendant listing is oldest first (`id ASC`, cursor
//!   `id > max_id`).
//! - `InvalidParent` and `NotFound` stay distinguishable: the first is a
//!   client-input problem, the second a missing target.

use crate::context::CallContext;
use crate::db::DbError;
use crate::model::comment::{CommentId, Target, UserId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod ancestry;
mod pool;
pub mod sqlite;

pub use ancestry::resolve_ancestor;
pub use sqlite::{SqliteCommentStore, StoreConfig};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from comment store operations.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite failure, tagged with the store operation that issued it.
    Db { op: &'static str, source: DbError },
    /// `create` referenced a parent comment that does not exist.
    InvalidParent(CommentId),
    /// Point lookup or delete found no such comment.
    NotFound(CommentId),
    /// Persisted row violates a table invariant.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required column is missing from the expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Caller deadline passed before the operation could run.
    DeadlineExceeded { op: &'static str },
}

impl StoreError {
    /// Attaches the store operation name to a database failure.
    pub(crate) fn in_op(self, op: &'static str) -> Self {
        match self {
            Self::Db { source, .. } => Self::Db { op, source },
            other => other,
        }
    }

    /// Returns whether this error describes caller input or a missing row
    /// rather than a storage fault.
    pub fn is_semantic(&self) -> bool {
        matches!(self, Self::InvalidParent(_) | Self::NotFound(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db { op, source } => write!(f, "comment store {op} failed: {source}"),
            Self::InvalidParent(id) => write!(f, "parent comment not found: {id}"),
            Self::NotFound(id) => write!(f, "comment not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted comment data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "comment store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "comment store requires column `{column}` in table `{table}`"
            ),
            Self::DeadlineExceeded { op } => write!(f, "deadline exceeded before {op}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db {
            op: "db",
            source: value,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db {
            op: "sqlite",
            source: DbError::Sqlite(value),
        }
    }
}

/// One persisted `comments` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: CommentId,
    pub author_id: UserId,
    pub biz: String,
    pub biz_id: i64,
    pub content: String,
    pub parent_id: Option<CommentId>,
    pub ancestor_id: Option<CommentId>,
    pub ctime: i64,
    pub utime: i64,
}

/// Insert payload; `id`, `ancestor_id` and timestamps are store-assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentInsert {
    pub author_id: UserId,
    pub biz: String,
    pub biz_id: i64,
    pub content: String,
    pub parent_id: Option<CommentId>,
}

/// Primitive comment queries.
///
/// Every call blocks on I/O and honors the deadline in `ctx`.
pub trait CommentStore: Send + Sync {
    /// Inserts one comment, resolving its ancestor from the parent row in the
    /// same transaction.
    fn create(&self, ctx: &CallContext, comment: &CommentInsert) -> StoreResult<CommentId>;
    /// Top-level comments of `target` with `id < min_id`, newest first.
    fn find_ancestors(
        &self,
        ctx: &CallContext,
        target: &Target,
        min_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>>;
    /// Total top-level comments of `target`.
    fn count_ancestors(&self, ctx: &CallContext, target: &Target) -> StoreResult<i64>;
    /// Direct replies to `parent_id`, oldest first.
    fn find_children(
        &self,
        ctx: &CallContext,
        parent_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>>;
    /// Every comment of the thread rooted at `ancestor_id` with `id > max_id`,
    /// oldest first, all depths flattened.
    fn find_descendants(
        &self,
        ctx: &CallContext,
        ancestor_id: CommentId,
        max_id: CommentId,
        limit: u32,
    ) -> StoreResult<Vec<CommentRow>>;
    /// Total comments of the thread rooted at `ancestor_id`, excluding the root.
    fn count_descendants(&self, ctx: &CallContext, ancestor_id: CommentId) -> StoreResult<i64>;
    fn find_by_id(&self, ctx: &CallContext, id: CommentId) -> StoreResult<CommentRow>;
    /// Removes one comment and every reply beneath it, at any depth.
    fn delete(&self, ctx: &CallContext, id: CommentId) -> StoreResult<()>;
}
