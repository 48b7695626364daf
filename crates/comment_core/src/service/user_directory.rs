//! User directory collaborator.
//!
//! The directory resolves author ids to display data. It is batched and
//! best-effort: unknown ids are simply absent from the result.

use crate::context::CallContext;
use crate::model::comment::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Display data for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub nickname: String,
    pub avatar: String,
}

/// Failure reported by a user directory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryError {
    message: String,
}

impl DirectoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "user directory failed: {}", self.message)
    }
}

impl Error for DirectoryError {}

/// Batched profile lookup.
pub trait UserDirectory: Send + Sync {
    /// Returns profiles for the known subset of `ids`, in any order.
    fn batch_profile(
        &self,
        ctx: &CallContext,
        ids: &[UserId],
    ) -> Result<Vec<UserProfile>, DirectoryError>;
}

impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    fn batch_profile(
        &self,
        ctx: &CallContext,
        ids: &[UserId],
    ) -> Result<Vec<UserProfile>, DirectoryError> {
        (**self).batch_profile(ctx, ids)
    }
}

/// Fixed in-process directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    profiles: HashMap<UserId, UserProfile>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(
        mut self,
        id: UserId,
        nickname: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Self {
        self.insert(UserProfile {
            id,
            nickname: nickname.into(),
            avatar: avatar.into(),
        });
        self
    }

    pub fn insert(&mut self, profile: UserProfile) {
        self.profiles.insert(profile.id, profile);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn batch_profile(
        &self,
        _ctx: &CallContext,
        ids: &[UserId],
    ) -> Result<Vec<UserProfile>, DirectoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.profiles.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryUserDirectory, UserDirectory};
    use crate::context::CallContext;

    #[test]
    fn batch_profile_skips_unknown_ids() {
        let directory = InMemoryUserDirectory::new()
            .with_profile(1, "ada", "ada.png")
            .with_profile(2, "linus", "linus.png");

        let profiles = directory
            .batch_profile(&CallContext::background(), &[2, 99])
            .unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, 2);
        assert_eq!(profiles[0].nickname, "linus");
    }
}
