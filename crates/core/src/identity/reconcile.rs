use chrono::{DateTime, Utc};

use crate::storage::UserRepository;

use super::{IdentityError, Profile, User};

/// How a profile mapped onto the user collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First login for this email from any provider; a row was created.
    Created,
    /// Email already known under a different provider; a second row was
    /// created carrying the new provider's credential.
    Linked,
    /// Existing `(email, provider)` row; `last_login` and display metadata
    /// were refreshed.
    Refreshed,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Linked => write!(f, "linked"),
            Self::Refreshed => write!(f, "refreshed"),
        }
    }
}

/// Resolves a verified profile to a persisted user.
///
/// The lookups only classify the outcome for logging; persistence goes
/// through a single atomic upsert keyed on `(email, provider)`, so two
/// concurrent logins for the same fresh pair still produce one row.
///
/// # Errors
///
/// - `ProfileIncomplete` when the profile carries no email; nothing is
///   written.
/// - `Repository` when storage fails; the caller must deny the session.
pub async fn resolve(
    users: &dyn UserRepository,
    profile: &Profile,
    now: DateTime<Utc>,
) -> Result<(User, Resolution), IdentityError> {
    let email = profile
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or(IdentityError::ProfileIncomplete("email"))?;

    let resolution = match users
        .find_by_email_and_provider(email, profile.provider)
        .await?
    {
        Some(_) => Resolution::Refreshed,
        None => match users.find_by_email(email).await? {
            Some(_) => Resolution::Linked,
            None => Resolution::Created,
        },
    };

    let candidate = User::from_profile(profile, email, now);
    let user = users.upsert_login(&candidate).await?;

    Ok((user, resolution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Provider;
    use crate::storage::{RepositoryError, Result};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;
    use uuid::Uuid;

    /// Minimal in-memory repository for reconciliation tests.
    #[derive(Default)]
    struct TestRepository {
        users: RwLock<HashMap<Uuid, User>>,
        writes: AtomicUsize,
    }

    impl TestRepository {
        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        async fn row_count(&self) -> usize {
            self.users.read().await.len()
        }
    }

    #[async_trait]
    impl UserRepository for TestRepository {
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
                .find(|u| u.email == email)
                .cloned())
        }

        async fn upsert_login(&self, candidate: &User) -> Result<User> {
            let mut users = self.users.write().await;
            self.writes.fetch_add(1, Ordering::SeqCst);

            if let Some(existing) = users
                .values_mut()
                .find(|u| u.email == candidate.email && u.provider == candidate.provider)
            {
                existing.last_login = candidate.last_login;
                existing.name = candidate.name.clone();
                existing.profile_picture = candidate.profile_picture.clone();
                return Ok(existing.clone());
            }

            if users
                .values()
                .any(|u| u.provider_id == candidate.provider_id)
            {
                return Err(RepositoryError::AlreadyExists {
                    entity_type: "User",
                    id: candidate.provider_id.clone(),
                });
            }

            users.insert(candidate.id, candidate.clone());
            Ok(candidate.clone())
        }
    }

    fn google_profile(subject: &str, email: &str) -> Profile {
        Profile {
            subject: subject.to_string(),
            provider: Provider::Google,
            email: Some(email.to_string()),
            name: Some("Ana".to_string()),
            picture: Some("https://example.com/ana.png".to_string()),
        }
    }

    #[tokio::test]
    async fn fresh_profile_creates_exactly_one_user() {
        let repo = TestRepository::default();
        let now = Utc::now();

        let (user, resolution) = resolve(&repo, &google_profile("g1", "a@x.com"), now)
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Created);
        assert_eq!(user.provider, Provider::Google);
        assert_eq!(user.provider_id, "g1");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.created_at, now);
        assert_eq!(user.last_login, now);
        assert_eq!(repo.row_count().await, 1);
    }

    #[tokio::test]
    async fn repeated_login_refreshes_without_second_row() {
        let repo = TestRepository::default();
        let first = Utc::now();
        let second = first + Duration::minutes(5);

        let (created, _) = resolve(&repo, &google_profile("g1", "a@x.com"), first)
            .await
            .unwrap();
        let (refreshed, resolution) = resolve(&repo, &google_profile("g1", "a@x.com"), second)
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Refreshed);
        assert_eq!(refreshed.id, created.id);
        assert_eq!(refreshed.created_at, first);
        assert_eq!(refreshed.last_login, second);
        assert_eq!(repo.row_count().await, 1);
    }

    #[tokio::test]
    async fn last_login_advances_monotonically() {
        let repo = TestRepository::default();
        let mut now = Utc::now();
        let mut previous = None;

        for _ in 0..3 {
            let (user, _) = resolve(&repo, &google_profile("g1", "a@x.com"), now)
                .await
                .unwrap();
            if let Some(prev) = previous {
                assert!(user.last_login > prev);
            }
            previous = Some(user.last_login);
            now += Duration::minutes(1);
        }

        assert_eq!(repo.row_count().await, 1);
    }

    #[tokio::test]
    async fn same_email_new_provider_creates_distinct_row() {
        let repo = TestRepository::default();
        let now = Utc::now();

        let (google_user, _) = resolve(&repo, &google_profile("g1", "a@x.com"), now)
            .await
            .unwrap();

        let discord = Profile {
            subject: "d1".to_string(),
            provider: Provider::Discord,
            email: Some("a@x.com".to_string()),
            name: Some("Ana".to_string()),
            picture: None,
        };
        let (discord_user, resolution) = resolve(&repo, &discord, now).await.unwrap();

        assert_eq!(resolution, Resolution::Linked);
        assert_ne!(discord_user.id, google_user.id);
        assert_eq!(discord_user.email, google_user.email);
        assert_eq!(discord_user.provider, Provider::Discord);
        assert_eq!(discord_user.provider_id, "d1");
        assert_eq!(repo.row_count().await, 2);
    }

    #[tokio::test]
    async fn missing_email_fails_without_any_write() {
        let repo = TestRepository::default();
        let profile = Profile {
            subject: "g1".to_string(),
            provider: Provider::Google,
            email: None,
            name: Some("Ana".to_string()),
            picture: None,
        };

        let err = resolve(&repo, &profile, Utc::now()).await.unwrap_err();

        assert!(matches!(err, IdentityError::ProfileIncomplete("email")));
        assert_eq!(repo.write_count(), 0);
        assert_eq!(repo.row_count().await, 0);
    }

    #[tokio::test]
    async fn empty_email_is_treated_as_missing() {
        let repo = TestRepository::default();
        let profile = Profile {
            email: Some(String::new()),
            ..google_profile("g1", "a@x.com")
        };

        let err = resolve(&repo, &profile, Utc::now()).await.unwrap_err();

        assert!(matches!(err, IdentityError::ProfileIncomplete("email")));
        assert_eq!(repo.write_count(), 0);
    }

    #[tokio::test]
    async fn refresh_overwrites_display_metadata() {
        let repo = TestRepository::default();
        let now = Utc::now();

        resolve(&repo, &google_profile("g1", "a@x.com"), now)
            .await
            .unwrap();

        let renamed = Profile {
            name: Some("Ana Maria".to_string()),
            picture: Some("https://example.com/new.png".to_string()),
            ..google_profile("g1", "a@x.com")
        };
        let (user, _) = resolve(&repo, &renamed, now + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(user.name.as_deref(), Some("Ana Maria"));
        assert_eq!(
            user.profile_picture.as_deref(),
            Some("https://example.com/new.png")
        );
    }

    #[tokio::test]
    async fn duplicate_subject_surfaces_repository_error() {
        let repo = TestRepository::default();
        let now = Utc::now();

        resolve(&repo, &google_profile("g1", "a@x.com"), now)
            .await
            .unwrap();

        // Same provider subject under a different email trips the
        // provider_id uniqueness boundary.
        let err = resolve(&repo, &google_profile("g1", "b@x.com"), now)
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Repository(_)));
    }
}
