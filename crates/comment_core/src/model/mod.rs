//! Domain model for threaded comments.
//!
//! # Responsibility
//! - Define the canonical comment shape shared by repository and service.
//! - Validate caller input before it reaches persistence.
//!
//! # Invariants
//! - A comment is top-level iff it has neither `parent_id` nor `ancestor_id`.
//! - Comments are never content-mutated after creation.

pub mod comment;
