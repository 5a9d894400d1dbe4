//! Application state for auth.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use socialgate_core::auth::{ProviderClient, SessionRepository};
use socialgate_core::identity::Provider;
use socialgate_core::storage::UserRepository;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::providers::{GoogleProvider, OAuth2Provider};

/// Shared state for auth handlers.
pub struct AuthState {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub config: AuthConfig,
    cookie_key: Key,
    google: Option<Arc<dyn ProviderClient>>,
    discord: Option<Arc<dyn ProviderClient>>,
    facebook: Option<Arc<dyn ProviderClient>>,
}

impl AuthState {
    /// Creates a new AuthState, initializing a client for every provider the
    /// configuration enables.
    ///
    /// # Errors
    ///
    /// Returns an error if provider initialization fails (e.g., Google OIDC
    /// discovery is unreachable).
    pub async fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let google: Option<Arc<dyn ProviderClient>> = if let Some(ref cfg) = config.google {
            Some(Arc::new(GoogleProvider::new(cfg).await?))
        } else {
            None
        };

        let discord: Option<Arc<dyn ProviderClient>> = if let Some(ref cfg) = config.discord {
            Some(Arc::new(OAuth2Provider::discord(cfg)?))
        } else {
            None
        };

        let facebook: Option<Arc<dyn ProviderClient>> = if let Some(ref cfg) = config.facebook {
            Some(Arc::new(OAuth2Provider::facebook(cfg)?))
        } else {
            None
        };

        Ok(Self {
            users,
            sessions,
            cookie_key: Key::derive_from(config.session_secret.as_bytes()),
            config,
            google,
            discord,
            facebook,
        })
    }

    /// Creates an AuthState with no provider clients. Providers are injected
    /// afterwards with [`with_provider`](Self::with_provider); tests use this
    /// to avoid network discovery.
    pub fn bare(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        config: AuthConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            cookie_key: Key::derive_from(config.session_secret.as_bytes()),
            config,
            google: None,
            discord: None,
            facebook: None,
        }
    }

    /// Registers a client for its provider slot, replacing any existing one.
    pub fn with_provider(mut self, client: Arc<dyn ProviderClient>) -> Self {
        match client.provider() {
            Provider::Google => self.google = Some(client),
            Provider::Discord => self.discord = Some(client),
            Provider::Facebook => self.facebook = Some(client),
        }
        self
    }

    /// Gets the client for the given provider.
    ///
    /// # Errors
    ///
    /// Returns `ProviderNotConfigured` if the provider is not enabled.
    pub fn get_provider(&self, provider: Provider) -> Result<&dyn ProviderClient, AuthError> {
        let slot = match provider {
            Provider::Google => &self.google,
            Provider::Discord => &self.discord,
            Provider::Facebook => &self.facebook,
        };

        slot.as_ref()
            .map(|p| p.as_ref())
            .ok_or_else(|| AuthError::ProviderNotConfigured(provider.to_string()))
    }
}

impl Clone for AuthState {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            config: self.config.clone(),
            cookie_key: self.cookie_key.clone(),
            google: self.google.clone(),
            discord: self.discord.clone(),
            facebook: self.facebook.clone(),
        }
    }
}

/// Allows AuthState to be extracted from a parent state.
impl<S> FromRef<S> for AuthState
where
    S: AsRef<AuthState>,
{
    fn from_ref(state: &S) -> Self {
        state.as_ref().clone()
    }
}

/// Lets `SignedCookieJar` find its signing key through the state.
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}
