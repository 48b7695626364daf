//! Comment domain model.
//!
//! # Responsibility
//! - Define the comment read model and the create-request shape.
//! - Provide input validation for create requests.
//!
//! # Invariants
//! - `id` is assigned by the store, monotonic, and never reused.
//! - `ancestor_id` points directly at a top-level comment, never at an
//!   intermediate reply.
//! - `(biz, biz_id)` partitions comment sets; queries never cross targets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static BIZ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,31}$").expect("valid biz regex"));

/// Store-assigned comment identifier; doubles as the pagination cursor.
pub type CommentId = i64;

/// Opaque user identifier resolved by the user directory.
pub type UserId = i64;

/// The commented-on resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Resource kind, e.g. `article` or `case`.
    pub biz: String,
    /// Resource id within `biz`.
    pub biz_id: i64,
}

impl Target {
    pub fn new(biz: impl Into<String>, biz_id: i64) -> Self {
        Self {
            biz: biz.into(),
            biz_id,
        }
    }
}

/// Author stub embedded in every comment.
///
/// Only `id` is persisted; `nickname` and `avatar` are filled in by author
/// enrichment and stay empty for users the directory does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub nickname: String,
    pub avatar: String,
}

impl Author {
    /// Creates an unresolved author stub.
    pub fn from_id(id: UserId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Comment read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: Author,
    pub target: Target,
    pub content: String,
    /// Replied-to comment. `None` for top-level comments.
    pub parent_id: Option<CommentId>,
    /// Top-level comment of this thread. `None` for top-level comments.
    pub ancestor_id: Option<CommentId>,
    /// Bounded reply preview; only populated on top-level listing pages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Comment>,
    /// Epoch ms creation timestamp.
    pub ctime: i64,
    /// Epoch ms update timestamp. Equal to `ctime` in practice.
    pub utime: i64,
}

impl Comment {
    /// Returns whether this comment starts a thread.
    pub fn is_top_level(&self) -> bool {
        self.ancestor_id.is_none()
    }
}

/// Create request for one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub author_id: UserId,
    pub target: Target,
    pub content: String,
    /// Comment being replied to. `None` creates a top-level comment.
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    /// Creates a top-level comment request.
    pub fn top_level(author_id: UserId, target: Target, content: impl Into<String>) -> Self {
        Self {
            author_id,
            target,
            content: content.into(),
            parent_id: None,
        }
    }

    /// Creates a reply request under `parent_id`.
    pub fn reply(
        author_id: UserId,
        target: Target,
        parent_id: CommentId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            target,
            content: content.into(),
            parent_id: Some(parent_id),
        }
    }

    /// Validates caller input.
    ///
    /// Does not check that `parent_id` exists; that happens inside the
    /// store's create transaction.
    pub fn validate(&self) -> Result<(), CommentValidationError> {
        if self.author_id <= 0 {
            return Err(CommentValidationError::InvalidAuthorId(self.author_id));
        }
        if !BIZ_RE.is_match(&self.target.biz) {
            return Err(CommentValidationError::InvalidBiz(self.target.biz.clone()));
        }
        if self.target.biz_id <= 0 {
            return Err(CommentValidationError::InvalidBizId(self.target.biz_id));
        }
        if self.content.trim().is_empty() {
            return Err(CommentValidationError::EmptyContent);
        }
        if let Some(parent_id) = self.parent_id {
            if parent_id <= 0 {
                return Err(CommentValidationError::InvalidParentId(parent_id));
            }
        }
        Ok(())
    }
}

/// Input validation failures for [`NewComment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentValidationError {
    EmptyContent,
    InvalidBiz(String),
    InvalidBizId(i64),
    InvalidAuthorId(UserId),
    InvalidParentId(CommentId),
}

impl Display for CommentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "comment content must not be blank"),
            Self::InvalidBiz(value) => write!(f, "invalid biz `{value}`"),
            Self::InvalidBizId(value) => write!(f, "biz_id must be positive, got {value}"),
            Self::InvalidAuthorId(value) => write!(f, "author_id must be positive, got {value}"),
            Self::InvalidParentId(value) => write!(f, "parent_id must be positive, got {value}"),
        }
    }
}

impl Error for CommentValidationError {}
