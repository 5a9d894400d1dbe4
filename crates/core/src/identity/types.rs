use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Discord,
    Facebook,
}

impl Provider {
    /// All providers, in display order.
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Discord, Provider::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Discord => "discord",
            Self::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "discord" => Ok(Self::Discord),
            "facebook" => Ok(Self::Facebook),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Provider-agnostic profile mapped from whatever claims a provider returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Provider's own subject identifier.
    pub subject: String,
    /// Which provider authenticated the user.
    pub provider: Provider,
    /// Email address, when the provider shares one.
    pub email: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub picture: Option<String>,
}

/// A locally persisted user record.
///
/// One row per `(email, provider)` pair; a person signing in through two
/// providers with the same email owns two rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Provider-assigned subject identifier, unique across the collection.
    pub provider_id: String,
    pub provider: Provider,
    pub email: String,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    /// Set once, at first persistence.
    pub created_at: DateTime<Utc>,
    /// Advanced on every successful login for this `(email, provider)` pair.
    pub last_login: DateTime<Utc>,
}

impl User {
    /// Builds a candidate record from a profile that already passed the
    /// completeness check. `created_at == last_login` on the create path;
    /// the upsert keeps the stored `created_at` on the refresh path.
    pub fn from_profile(profile: &Profile, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: profile.subject.clone(),
            provider: profile.provider,
            email: email.to_string(),
            name: profile.name.clone(),
            profile_picture: profile.picture.clone(),
            created_at: now,
            last_login: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
    }

    #[test]
    fn provider_rejects_unknown_name() {
        assert!("github".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Provider::Discord).unwrap(),
            "\"discord\""
        );
    }

    #[test]
    fn user_from_profile_sets_creation_and_login_together() {
        let now = Utc::now();
        let profile = Profile {
            subject: "g1".to_string(),
            provider: Provider::Google,
            email: Some("a@x.com".to_string()),
            name: Some("Ana".to_string()),
            picture: None,
        };

        let user = User::from_profile(&profile, "a@x.com", now);

        assert_eq!(user.provider_id, "g1");
        assert_eq!(user.provider, Provider::Google);
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.created_at, now);
        assert_eq!(user.last_login, now);
    }
}
