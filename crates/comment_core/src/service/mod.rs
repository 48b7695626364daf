//! Comment use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into paginated, author-enriched results.
//! - Gate deletes on comment ownership.
//! - Keep outer layers decoupled from storage details.

pub mod comment_service;
pub mod user_directory;
