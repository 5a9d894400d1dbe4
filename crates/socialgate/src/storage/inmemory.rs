//! In-memory user repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use socialgate_core::identity::{Provider, User};
use socialgate_core::storage::{RepositoryError, Result, UserRepository};

/// In-memory user repository for development and testing.
///
/// All writes go through one lock, which gives the login upsert the same
/// lost-update-free behavior the SQLite backend gets from its single
/// statement.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email_and_provider(
        &self,
        email: &str,
        provider: Provider,
    ) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email && u.provider == provider)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.email == email)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn upsert_login(&self, candidate: &User) -> Result<User> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.provider == candidate.provider && u.provider_id == candidate.provider_id && u.email != candidate.email)
        {
            return Err(RepositoryError::AlreadyExists {
                entity_type: "User",
                id: candidate.provider_id.clone(),
            });
        }

        if let Some(existing) = users
            .values_mut()
            .find(|u| u.email == candidate.email && u.provider == candidate.provider)
        {
            if existing.provider_id != candidate.provider_id {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: "User",
                    id: candidate.provider_id.clone(),
                });
            }
            existing.name = candidate.name.clone();
            existing.profile_picture = candidate.profile_picture.clone();
            existing.last_login = candidate.last_login;
            return Ok(existing.clone());
        }

        users.insert(candidate.id, candidate.clone());
        Ok(candidate.clone())
    }
}
