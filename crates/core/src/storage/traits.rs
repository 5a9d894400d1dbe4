use async_trait::async_trait;
use uuid::Uuid;

use crate::identity::{Provider, User};

use super::Result;

/// Repository for user operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Gets a user by their ID.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Gets the user for an exact `(email, provider)` pair.
    async fn find_by_email_and_provider(
        &self,
        email: &str,
        provider: Provider,
    ) -> Result<Option<User>>;

    /// Gets any user carrying this email, regardless of provider.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Atomically records a login on the `(email, provider)` natural key.
    ///
    /// Inserts the candidate row when the pair is absent; otherwise keeps the
    /// stored `id`, `provider_id` and `created_at` and takes the candidate's
    /// `last_login`, `name` and `profile_picture`. Returns the persisted row.
    ///
    /// A `provider_id` uniqueness violation is reported as
    /// `RepositoryError::AlreadyExists`.
    async fn upsert_login(&self, candidate: &User) -> Result<User>;
}
