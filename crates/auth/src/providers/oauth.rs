//! Plain-OAuth2 provider adapter.
//!
//! Discord and Facebook do not ship usable OIDC discovery for this flow, so
//! both run through the classic authorization-code exchange followed by a
//! userinfo call. One adapter serves both; the `Provider` tag selects
//! endpoints, scopes and the claim mapping.

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use socialgate_core::auth::{AuthError, ProviderClient, Result};
use socialgate_core::identity::{Profile, Provider};
use url::Url;

use crate::config::ProviderConfig;

/// Endpoint set for one OAuth2 provider.
struct Endpoints {
    auth_url: &'static str,
    token_url: &'static str,
    userinfo_url: &'static str,
    scopes: &'static [&'static str],
}

fn endpoints(provider: Provider) -> Result<Endpoints> {
    match provider {
        Provider::Discord => Ok(Endpoints {
            auth_url: "https://discord.com/oauth2/authorize",
            token_url: "https://discord.com/api/oauth2/token",
            userinfo_url: "https://discord.com/api/users/@me",
            scopes: &["identify", "email"],
        }),
        Provider::Facebook => Ok(Endpoints {
            auth_url: "https://www.facebook.com/v19.0/dialog/oauth",
            token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
            userinfo_url: "https://graph.facebook.com/v19.0/me?fields=id,name,email,picture",
            scopes: &["email", "public_profile"],
        }),
        Provider::Google => Err(AuthError::Provider(
            "google is served by the OIDC client".to_string(),
        )),
    }
}

/// OAuth2 provider client for Discord and Facebook.
pub struct OAuth2Provider {
    provider: Provider,
    client: BasicClient,
    http_client: reqwest::Client,
    userinfo_url: &'static str,
    scopes: &'static [&'static str],
}

impl OAuth2Provider {
    /// Create a client for the given provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider has no OAuth2 endpoint set here or
    /// if an endpoint URL fails to parse.
    pub fn new(provider: Provider, config: &ProviderConfig) -> Result<Self> {
        let endpoints = endpoints(provider)?;

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(endpoints.auth_url.to_string())
                .map_err(|e| AuthError::Provider(e.to_string()))?,
            Some(
                TokenUrl::new(endpoints.token_url.to_string())
                    .map_err(|e| AuthError::Provider(e.to_string()))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.to_string())
                .map_err(|e| AuthError::Provider(e.to_string()))?,
        );

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            http_client,
            userinfo_url: endpoints.userinfo_url,
            scopes: endpoints.scopes,
        })
    }

    pub fn discord(config: &ProviderConfig) -> Result<Self> {
        Self::new(Provider::Discord, config)
    }

    pub fn facebook(config: &ProviderConfig) -> Result<Self> {
        Self::new(Provider::Facebook, config)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        let response = self
            .http_client
            .get(self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "userinfo request failed with status {}",
                response.status()
            )));
        }

        match self.provider {
            Provider::Discord => {
                let user: DiscordUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(e.to_string()))?;
                Ok(user.into_profile())
            }
            Provider::Facebook => {
                let user: FacebookUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(e.to_string()))?;
                Ok(user.into_profile())
            }
            Provider::Google => Err(AuthError::Provider(
                "google is served by the OIDC client".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ProviderClient for OAuth2Provider {
    async fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<Url> {
        let state_owned = state.to_string();

        // The PKCE challenge travels as extra params, same as the OIDC client.
        let mut request = self
            .client
            .authorize_url(move || CsrfToken::new(state_owned))
            .add_extra_param("code_challenge", pkce_challenge.to_string())
            .add_extra_param("code_challenge_method", "S256");

        for scope in self.scopes {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }

        let (auth_url, _csrf_token) = request.url();
        Ok(auth_url)
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<Profile> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::CodeExchange(e.to_string()))?;

        self.fetch_profile(token_response.access_token().secret())
            .await
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}

/// Subset of `GET /api/users/@me`.
#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    global_name: Option<String>,
    email: Option<String>,
    avatar: Option<String>,
}

impl DiscordUser {
    fn into_profile(self) -> Profile {
        let picture = self.avatar.as_ref().map(|hash| {
            format!(
                "https://cdn.discordapp.com/avatars/{}/{}.png",
                self.id, hash
            )
        });

        Profile {
            subject: self.id,
            provider: Provider::Discord,
            email: self.email,
            name: Some(self.global_name.unwrap_or(self.username)),
            picture,
        }
    }
}

/// Subset of the Graph API `GET /me` response.
#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: String,
}

impl FacebookUser {
    fn into_profile(self) -> Profile {
        Profile {
            subject: self.id,
            provider: Provider::Facebook,
            email: self.email,
            name: self.name,
            picture: self.picture.map(|p| p.data.url),
        }
    }
}
