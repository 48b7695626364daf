//! Comment use-case service.
//!
//! # Responsibility
//! - Paginate top-level comments and full threads, fetching page and total
//!   count concurrently.
//! - Enrich every returned comment with author display data through one
//!   batched directory call.
//! - Gate deletes on exact author match.
//!
//! # Invariants
//! - A failure in either the page or the count task fails the request; no
//!   partial page is returned.
//! - Top-level cursor `min_id <= 0` means "start from the newest".
//! - Deleting a comment removes its whole reply subtree.

use crate::context::CallContext;
use crate::model::comment::{
    Comment, CommentId, CommentValidationError, NewComment, Target, UserId,
};
use crate::repo::comment_repo::CommentRepository;
use crate::service::user_directory::{DirectoryError, UserDirectory, UserProfile};
use crate::store::StoreError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_PREVIEW_REPLY_LIMIT: u32 = 3;
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Service error for comment use-cases.
#[derive(Debug)]
pub enum CommentServiceError {
    /// Create request failed input validation.
    Validation(CommentValidationError),
    /// Reply target does not exist.
    InvalidParent(CommentId),
    /// Target comment does not exist.
    NotFound(CommentId),
    /// Requester is not the comment's author.
    Unauthorized {
        comment_id: CommentId,
        requester_uid: UserId,
    },
    /// Caller deadline passed.
    DeadlineExceeded,
    /// Author enrichment failed.
    Directory(DirectoryError),
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for CommentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidParent(id) => write!(f, "parent comment not found: {id}"),
            Self::NotFound(id) => write!(f, "comment not found: {id}"),
            Self::Unauthorized {
                comment_id,
                requester_uid,
            } => write!(
                f,
                "user {requester_uid} is not the author of comment {comment_id}"
            ),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Directory(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Directory(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CommentServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InvalidParent(id) => Self::InvalidParent(id),
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::DeadlineExceeded { .. } => Self::DeadlineExceeded,
            other => Self::Store(other),
        }
    }
}

impl From<CommentValidationError> for CommentServiceError {
    fn from(value: CommentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DirectoryError> for CommentServiceError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

pub type CommentServiceResult<T> = Result<T, CommentServiceError>;

/// Tunables for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentServiceConfig {
    /// Direct replies attached to each top-level comment on list pages.
    pub preview_reply_limit: u32,
    /// Page size used when the caller passes `0`.
    pub default_page_limit: u32,
    /// Upper bound for caller-supplied page sizes.
    pub max_page_limit: u32,
}

impl Default for CommentServiceConfig {
    fn default() -> Self {
        Self {
            preview_reply_limit: DEFAULT_PREVIEW_REPLY_LIMIT,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }
}

/// One page of comments plus the total size of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPage {
    pub items: Vec<Comment>,
    /// Count of the whole listing, independent of the page window.
    pub total: i64,
}

impl CommentPage {
    /// Cursor for the next top-level page: the smallest id on this page.
    pub fn next_ancestor_cursor(&self) -> Option<CommentId> {
        self.items.iter().map(|comment| comment.id).min()
    }

    /// Cursor for the next thread page: the largest id on this page.
    pub fn next_descendant_cursor(&self) -> Option<CommentId> {
        self.items.iter().map(|comment| comment.id).max()
    }
}

/// Comment service facade.
pub struct CommentService<R: CommentRepository, U: UserDirectory> {
    repo: R,
    users: U,
    config: CommentServiceConfig,
}

impl<R: CommentRepository, U: UserDirectory> CommentService<R, U> {
    /// Creates a service with default listing configuration.
    pub fn new(repo: R, users: U) -> Self {
        Self::with_config(repo, users, CommentServiceConfig::default())
    }

    pub fn with_config(repo: R, users: U, config: CommentServiceConfig) -> Self {
        Self {
            repo,
            users,
            config,
        }
    }

    /// Creates a top-level comment or a reply and returns its id.
    ///
    /// # Errors
    /// - `Validation` for malformed input.
    /// - `InvalidParent` when `parent_id` names no existing comment.
    pub fn create(&self, ctx: &CallContext, comment: &NewComment) -> CommentServiceResult<CommentId> {
        comment.validate()?;
        let id = self.repo.create(ctx, comment)?;
        Ok(id)
    }

    /// Loads one comment with resolved author data.
    pub fn get(&self, ctx: &CallContext, id: CommentId) -> CommentServiceResult<Comment> {
        let mut comment = self.repo.find_by_id(ctx, id)?;
        self.enrich_authors(ctx, std::slice::from_mut(&mut comment))?;
        Ok(comment)
    }

    /// Lists top-level comments of `target`, newest first, each with a
    /// bounded preview of its oldest direct replies.
    ///
    /// `min_id` is the exclusive upper bound from the previous page; values
    /// `<= 0` start from the newest comment.
    pub fn list(
        &self,
        ctx: &CallContext,
        target: &Target,
        min_id: CommentId,
        limit: u32,
    ) -> CommentServiceResult<CommentPage> {
        let min_id = if min_id <= 0 { CommentId::MAX } else { min_id };
        let limit = self.normalize_limit(limit);

        let (items, total) = rayon::join(
            || {
                self.repo.find_ancestors(
                    ctx,
                    target,
                    min_id,
                    limit,
                    self.config.preview_reply_limit,
                )
            },
            || self.repo.count_ancestors(ctx, target),
        );
        let mut items = items?;
        let total = total?;

        self.enrich_authors(ctx, &mut items)?;
        Ok(CommentPage { items, total })
    }

    /// Lists the whole thread under `ancestor_id`, oldest first, all reply
    /// depths flattened.
    ///
    /// `min_id` is the exclusive lower bound from the previous page; `0`
    /// starts from the first reply.
    pub fn replies(
        &self,
        ctx: &CallContext,
        ancestor_id: CommentId,
        min_id: CommentId,
        limit: u32,
    ) -> CommentServiceResult<CommentPage> {
        let max_id = min_id.max(0);
        let limit = self.normalize_limit(limit);

        let (items, total) = rayon::join(
            || self.repo.find_descendants(ctx, ancestor_id, max_id, limit),
            || self.repo.count_descendants(ctx, ancestor_id),
        );
        let mut items = items?;
        let total = total?;

        self.enrich_authors(ctx, &mut items)?;
        Ok(CommentPage { items, total })
    }

    /// Deletes a comment owned by `requester_uid`, cascading to every reply
    /// beneath it.
    ///
    /// # Errors
    /// - `NotFound` when the comment does not exist.
    /// - `Unauthorized` when `requester_uid` is not the author.
    pub fn delete(
        &self,
        ctx: &CallContext,
        id: CommentId,
        requester_uid: UserId,
    ) -> CommentServiceResult<()> {
        let comment = self.repo.find_by_id(ctx, id)?;
        if comment.author.id != requester_uid {
            warn!(
                "event=comment_delete module=service status=rejected id={} requester_uid={} error_code=not_author",
                id, requester_uid
            );
            return Err(CommentServiceError::Unauthorized {
                comment_id: id,
                requester_uid,
            });
        }

        self.repo.delete(ctx, id)?;
        info!(
            "event=comment_delete module=service status=ok id={} top_level={}",
            id,
            comment.is_top_level()
        );
        Ok(())
    }

    fn normalize_limit(&self, limit: u32) -> u32 {
        match limit {
            0 => self.config.default_page_limit,
            value if value > self.config.max_page_limit => self.config.max_page_limit,
            value => value,
        }
    }

    fn enrich_authors(
        &self,
        ctx: &CallContext,
        comments: &mut [Comment],
    ) -> CommentServiceResult<()> {
        let mut ids = BTreeSet::new();
        collect_author_ids(comments, &mut ids);
        if ids.is_empty() {
            return Ok(());
        }
        if ctx.is_expired() {
            return Err(CommentServiceError::DeadlineExceeded);
        }

        let ids: Vec<UserId> = ids.into_iter().collect();
        let profiles: HashMap<UserId, UserProfile> = self
            .users
            .batch_profile(ctx, &ids)?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();
        debug!(
            "event=author_enrich module=service status=ok requested={} resolved={}",
            ids.len(),
            profiles.len()
        );

        apply_profiles(comments, &profiles);
        Ok(())
    }
}

fn collect_author_ids(comments: &[Comment], ids: &mut BTreeSet<UserId>) {
    for comment in comments {
        ids.insert(comment.author.id);
        collect_author_ids(&comment.children, ids);
    }
}

fn apply_profiles(comments: &mut [Comment], profiles: &HashMap<UserId, UserProfile>) {
    for comment in comments {
        if let Some(profile) = profiles.get(&comment.author.id) {
            comment.author.nickname = profile.nickname.clone();
            comment.author.avatar = profile.avatar.clone();
        }
        apply_profiles(&mut comment.children, profiles);
    }
}
