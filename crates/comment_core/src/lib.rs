//! Threaded comment core.
//!
//! A flat `comments` table represents arbitrarily deep reply trees: every
//! reply stores a direct pointer to its thread's top-level comment, so
//! whole threads are read without recursive traversal.
//!
//! Layers, leaves first: `store` (SQL and ancestry) → `repo` (row mapping,
//! preview fan-out) → `service` (pagination, authorization, author
//! enrichment).

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use context::CallContext;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::comment::{
    Author, Comment, CommentId, CommentValidationError, NewComment, Target, UserId,
};
pub use repo::comment_repo::{CommentRepository, StoreCommentRepository};
pub use service::comment_service::{
    CommentPage, CommentService, CommentServiceConfig, CommentServiceError,
    CommentServiceResult,
};
pub use service::user_directory::{
    DirectoryError, InMemoryUserDirectory, UserDirectory, UserProfile,
};
pub use store::{
    resolve_ancestor, CommentInsert, CommentRow, CommentStore, SqliteCommentStore, StoreConfig,
    StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
