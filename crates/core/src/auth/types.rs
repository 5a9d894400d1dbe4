use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Provider;

use super::AuthError;

/// Length of generated session tokens.
pub(crate) const SESSION_ID_LEN: usize = 32;

/// Cryptographically random session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Parses an untrusted token from a cookie or header.
    ///
    /// Generated tokens are 32 alphanumeric characters; anything
    /// structurally different is rejected up front so a tampered or
    /// truncated token never reaches the store.
    pub fn parse(token: &str) -> Result<Self, AuthError> {
        if token.len() != SESSION_ID_LEN {
            return Err(AuthError::InvalidSession(format!(
                "unexpected token length {}",
                token.len()
            )));
        }
        if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AuthError::InvalidSession(
                "token contains non-alphanumeric characters".to_string(),
            ));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated user session.
///
/// Carries only the stable user id; the user record is re-read from storage
/// on every request instead of being cached in the session payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: Uuid,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// PKCE and state data stored during the consent round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFlowState {
    pub pkce_verifier: String,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    /// URL to redirect to after successful authentication.
    pub return_to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_generated_token() {
        let id = crate::auth::generate_session_id();
        let parsed = SessionId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_truncated_token() {
        let id = crate::auth::generate_session_id();
        let truncated = &id.as_str()[..SESSION_ID_LEN - 1];
        assert!(matches!(
            SessionId::parse(truncated),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn parse_rejects_tampered_token() {
        let tampered = format!("{}!", "a".repeat(SESSION_ID_LEN - 1));
        assert!(matches!(
            SessionId::parse(&tampered),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn parse_rejects_empty_token() {
        assert!(matches!(
            SessionId::parse(""),
            Err(AuthError::InvalidSession(_))
        ));
    }
}
