use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::identity::{Profile, Provider};

use super::{AuthError, AuthFlowState, Session, SessionId};

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Abstraction over identity providers.
///
/// One implementation per delegation style, not per provider; the `Provider`
/// tag selects endpoints and scopes inside the implementation.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Generate authorization URL for user redirect.
    async fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<Url>;

    /// Exchange an authorization code for a canonical profile.
    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<Profile>;

    /// Which provider this client represents.
    fn provider(&self) -> Provider;
}

/// Session storage abstraction.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session.
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Retrieve session by ID.
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Delete a specific session.
    async fn delete_session(&self, id: &SessionId) -> Result<()>;

    /// Delete all sessions for a user.
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<()>;

    /// Store PKCE/state for an auth flow (short TTL).
    async fn store_auth_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()>;

    /// Retrieve and delete auth flow state. Consume-once by contract.
    async fn take_auth_flow(&self, state: &str) -> Result<Option<AuthFlowState>>;
}
