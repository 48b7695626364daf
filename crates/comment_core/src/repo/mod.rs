//! Repository layer over the comment store.
//!
//! # Responsibility
//! - Translate between storage rows and domain comments.
//! - Assemble top-level pages with bounded reply previews.
//!
//! # Invariants
//! - Repositories hold no state beyond their store handle.
//! - Rows violating the top-level invariant are rejected, not masked.

pub mod comment_repo;
