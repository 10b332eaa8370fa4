//! Identity store contract — the user↔topic mapping plus the ban set.

use async_trait::async_trait;

use crate::error::StoreError;

/// Outcome of an atomic mapping creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMapping {
    /// The mapping was written by this call.
    Created,
    /// A mapping for this user already existed; nothing was written.
    AlreadyExists,
}

/// Backend-agnostic identity store.
///
/// All operations are atomic with respect to concurrent callers on the same
/// key. `create_mapping` is the one check-and-set the relay relies on: two
/// racing initiations for the same user resolve to exactly one `Created`.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Topic mapped to a user, if any.
    async fn topic_for_user(&self, user_id: i64) -> Result<Option<i64>, StoreError>;

    /// Atomically create the user→topic mapping.
    ///
    /// Returns `AlreadyExists` without overwriting when the user is already
    /// mapped — mappings are immutable once created.
    async fn create_mapping(
        &self,
        user_id: i64,
        topic_id: i64,
    ) -> Result<CreateMapping, StoreError>;

    /// Reverse lookup: the user a topic belongs to, if any.
    async fn user_for_topic(&self, topic_id: i64) -> Result<Option<i64>, StoreError>;

    /// Whether a user is banned.
    async fn is_banned(&self, user_id: i64) -> Result<bool, StoreError>;

    /// Add or remove a user from the ban set. Idempotent in both directions.
    /// A ban does not touch the user's mapping.
    async fn set_banned(&self, user_id: i64, banned: bool) -> Result<(), StoreError>;
}
