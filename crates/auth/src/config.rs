use std::time::Duration;

use socialgate_core::identity::Provider;
use url::Url;

/// Configuration for a single identity provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
}

/// Complete auth configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub google: Option<ProviderConfig>,
    pub discord: Option<ProviderConfig>,
    pub facebook: Option<ProviderConfig>,
    pub session_ttl: Duration,
    pub base_url: Url,
    pub cookie_name: String,
    pub cookie_secure: bool,
    /// Secret keying the signed session cookie. At least 32 bytes.
    pub session_secret: String,
    /// Where a failed login attempt lands the user.
    pub failure_redirect: String,
}

/// Configuration errors reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("SESSION_SECRET must be at least 32 bytes")]
    WeakSessionSecret,
    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),
}

impl AuthConfig {
    /// Load from environment variables, failing fast on anything missing.
    ///
    /// # Environment Variables
    ///
    /// - `AUTH_BASE_URL`: Base URL for callback redirects (default: `http://localhost:3000`)
    /// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`: enables Google sign-in
    /// - `DISCORD_CLIENT_ID` / `DISCORD_CLIENT_SECRET`: enables Discord sign-in
    /// - `FACEBOOK_CLIENT_ID` / `FACEBOOK_CLIENT_SECRET`: enables Facebook sign-in
    /// - `SESSION_SECRET`: required, keys the signed session cookie (>= 32 bytes)
    /// - `SESSION_TTL_MINUTES`: session TTL in minutes (default: 30)
    /// - `COOKIE_SECURE`: whether to set the secure flag on cookies (default: true)
    /// - `AUTH_FAILURE_REDIRECT`: failure destination (default: `/login?error=auth`)
    ///
    /// # Errors
    ///
    /// Returns an error if a provider is partially configured (client id
    /// without secret), if the session secret is absent or too short, or if
    /// a URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url: Url = std::env::var("AUTH_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .parse()
            .map_err(|e: url::ParseError| ConfigError::InvalidUrl("AUTH_BASE_URL", e.to_string()))?;

        let session_secret =
            std::env::var("SESSION_SECRET").map_err(|_| ConfigError::MissingVar("SESSION_SECRET"))?;
        if session_secret.len() < 32 {
            return Err(ConfigError::WeakSessionSecret);
        }

        let session_ttl = std::env::var("SESSION_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|minutes| Duration::from_secs(minutes * 60))
            .unwrap_or(Duration::from_secs(30 * 60)); // 30 minutes default

        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let failure_redirect = std::env::var("AUTH_FAILURE_REDIRECT")
            .unwrap_or_else(|_| "/login?error=auth".to_string());

        Ok(Self {
            google: provider_from_env(
                &base_url,
                Provider::Google,
                "GOOGLE_CLIENT_ID",
                "GOOGLE_CLIENT_SECRET",
            )?,
            discord: provider_from_env(
                &base_url,
                Provider::Discord,
                "DISCORD_CLIENT_ID",
                "DISCORD_CLIENT_SECRET",
            )?,
            facebook: provider_from_env(
                &base_url,
                Provider::Facebook,
                "FACEBOOK_CLIENT_ID",
                "FACEBOOK_CLIENT_SECRET",
            )?,
            session_ttl,
            base_url,
            cookie_name: "session".to_string(),
            cookie_secure,
            session_secret,
            failure_redirect,
        })
    }

    /// Config for a specific provider, if enabled.
    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Discord => self.discord.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
        }
    }

    /// Providers that are configured, in display order.
    pub fn enabled_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.provider(*p).is_some())
            .collect()
    }
}

/// A provider is enabled when its client id is present; a present id with a
/// missing secret is a startup error rather than a silently disabled login.
fn provider_from_env(
    base_url: &Url,
    provider: Provider,
    id_var: &'static str,
    secret_var: &'static str,
) -> Result<Option<ProviderConfig>, ConfigError> {
    let client_id = match std::env::var(id_var) {
        Ok(id) => id,
        Err(_) => return Ok(None),
    };

    let client_secret =
        std::env::var(secret_var).map_err(|_| ConfigError::MissingVar(secret_var))?;

    let redirect_uri = base_url
        .join(&format!("/auth/{provider}/callback"))
        .map_err(|e| ConfigError::InvalidUrl("AUTH_BASE_URL", e.to_string()))?;

    Ok(Some(ProviderConfig {
        client_id,
        client_secret,
        redirect_uri,
    }))
}
