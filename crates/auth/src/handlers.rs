//! HTTP handlers for auth routes.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::SignedCookieJar;
use chrono::{Duration, Utc};
use openidconnect::PkceCodeChallenge;
use serde::Deserialize;
use socialgate_core::auth::{
    calculate_expiry, generate_session_id, generate_state, validate_return_to, AuthFlowState,
    Session, SessionId,
};
use socialgate_core::identity::{resolve, Provider, User};

use crate::error::AuthError;
use crate::extractors::CurrentUser;
use crate::AuthState;

/// Query parameters for OAuth callbacks.
///
/// `code` and `state` are optional because providers report user denial and
/// their own failures through `error` instead of an authorization code.
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query parameters for login endpoints.
#[derive(Deserialize, Default)]
pub struct LoginQuery {
    /// URL to redirect to after successful authentication.
    pub return_to: Option<String>,
}

/// Creates the auth router with all authentication routes.
///
/// Routes:
/// - `GET /auth/{provider}` - Initiate the provider's login flow
/// - `GET /auth/{provider}/callback` - Handle the provider's callback
/// - `POST /auth/logout` - End current session
/// - `POST /auth/logout-all` - End all sessions for current user
/// - `GET /auth/me` - Get current authenticated user
pub fn auth_routes() -> Router<AuthState> {
    Router::new()
        .route("/auth/{provider}", get(login))
        .route("/auth/{provider}/callback", get(callback))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/auth/me", get(me))
}

async fn login(
    State(state): State<AuthState>,
    Path(provider): Path<Provider>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AuthError> {
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let csrf_state = generate_state();

    // Validate return_to URL to prevent open redirect attacks
    let validated_return_to = query
        .return_to
        .as_deref()
        .and_then(validate_return_to)
        .map(String::from);

    // Store PKCE verifier for callback
    let flow = AuthFlowState {
        pkce_verifier: pkce_verifier.secret().to_string(),
        provider,
        created_at: Utc::now(),
        return_to: validated_return_to,
    };
    state.sessions.store_auth_flow(&csrf_state, &flow).await?;

    let provider_client = state.get_provider(provider)?;
    let auth_url = provider_client
        .authorization_url(&csrf_state, pkce_challenge.as_str())
        .await?;

    Ok(Redirect::to(auth_url.as_str()))
}

/// Handles the provider callback.
///
/// Every failure class lands on the configured failure redirect with the
/// cause logged, so a broken provider round-trip never strands the user on a
/// bare error page.
async fn callback(
    State(state): State<AuthState>,
    Path(provider): Path<Provider>,
    Query(params): Query<CallbackQuery>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), Redirect> {
    let failure = || Redirect::to(&state.config.failure_redirect);

    if let Some(error) = &params.error {
        tracing::warn!(
            %provider,
            error,
            description = params.error_description.as_deref().unwrap_or(""),
            "provider returned an error on callback"
        );
        return Err(failure());
    }

    let (Some(code), Some(csrf_state)) = (&params.code, &params.state) else {
        tracing::warn!(%provider, "callback missing code or state");
        return Err(failure());
    };

    match complete_login(&state, provider, code, csrf_state, jar).await {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::warn!(%provider, error = %err, "login failed");
            Err(failure())
        }
    }
}

async fn complete_login(
    state: &AuthState,
    provider: Provider,
    code: &str,
    csrf_state: &str,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), AuthError> {
    // Retrieve and validate PKCE verifier. Consume-once, so a replayed state
    // value fails here.
    let flow = state
        .sessions
        .take_auth_flow(csrf_state)
        .await?
        .ok_or(AuthError::Core(
            socialgate_core::auth::AuthError::InvalidState,
        ))?;

    if flow.provider != provider {
        return Err(AuthError::Core(
            socialgate_core::auth::AuthError::InvalidState,
        ));
    }

    // Exchange code for a canonical profile
    let provider_client = state.get_provider(provider)?;
    let profile = provider_client
        .exchange_code(code, &flow.pkce_verifier)
        .await?;

    // Reconcile the profile against stored users
    let now = Utc::now();
    let (user, resolution) = resolve(state.users.as_ref(), &profile, now).await?;

    tracing::info!(user_id = %user.id, %provider, %resolution, "login succeeded");

    // Create session holding only the user id; the user record is re-read on
    // each request
    let session = Session {
        id: generate_session_id(),
        user_id: user.id,
        provider,
        created_at: now,
        expires_at: calculate_expiry(
            now,
            Duration::seconds(state.config.session_ttl.as_secs() as i64),
        ),
    };
    state.sessions.create_session(&session).await?;

    let cookie = Cookie::build((state.config.cookie_name.clone(), session.id.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.config.session_ttl.as_secs() as i64
        ))
        .build();

    let jar = jar.add(cookie);

    let redirect_url = flow.return_to.unwrap_or_else(|| "/dashboard".to_string());
    Ok((jar, Redirect::to(&redirect_url)))
}

async fn logout(
    State(state): State<AuthState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), AuthError> {
    if let Some(cookie) = jar.get(&state.config.cookie_name) {
        if let Ok(session_id) = SessionId::parse(cookie.value()) {
            state.sessions.delete_session(&session_id).await?;
        }
    }

    let jar = jar.remove(Cookie::from(state.config.cookie_name.clone()));
    Ok((jar, Redirect::to("/")))
}

async fn logout_all(
    State(state): State<AuthState>,
    CurrentUser(user): CurrentUser,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), AuthError> {
    state.sessions.delete_user_sessions(user.id).await?;

    let jar = jar.remove(Cookie::from(state.config.cookie_name.clone()));
    Ok((jar, Redirect::to("/")))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tokio::sync::RwLock;
    use tower::ServiceExt;
    use url::Url;
    use uuid::Uuid;

    use socialgate_core::auth::{ProviderClient, Result as AuthResult};
    use socialgate_core::identity::Profile;
    use socialgate_core::storage::{self, RepositoryError, UserRepository};

    use crate::config::{AuthConfig, ProviderConfig};
    use crate::sessions::InMemorySessionStore;

    /// Provider client that skips the network and returns a fixed profile.
    struct StaticProvider {
        provider: Provider,
        profile: Profile,
    }

    #[async_trait]
    impl ProviderClient for StaticProvider {
        async fn authorization_url(&self, state: &str, _pkce_challenge: &str) -> AuthResult<Url> {
            Ok(format!("https://idp.example/authorize?state={state}")
                .parse()
                .unwrap())
        }

        async fn exchange_code(&self, code: &str, _pkce_verifier: &str) -> AuthResult<Profile> {
            if code == "bad-code" {
                return Err(socialgate_core::auth::AuthError::CodeExchange(
                    "invalid code".to_string(),
                ));
            }
            Ok(self.profile.clone())
        }

        fn provider(&self) -> Provider {
            self.provider
        }
    }

    #[derive(Default)]
    struct MemoryUsers {
        users: RwLock<HashMap<Uuid, User>>,
    }

    #[async_trait]
    impl UserRepository for MemoryUsers {
        async fn get_user(&self, id: Uuid) -> storage::Result<Option<User>> {
            Ok(self.users.read().await.get(&id).cloned())
        }

        async fn find_by_email_and_provider(
            &self,
            email: &str,
            provider: Provider,
        ) -> storage::Result<Option<User>> {
            Ok(self
                .users
                .read()
                .await
                .values()
                .find(|u| u.email == email && u.provider == provider)
                .cloned())
        }

        async fn find_by_email(&self, email: &str) -> storage::Result<Option<User>> {
            Ok(self
                .users
                .read()
                .await
                .values()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn upsert_login(&self, candidate: &User) -> storage::Result<User> {
            let mut users = self.users.write().await;
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

    fn test_config() -> AuthConfig {
        let provider_config = ProviderConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/auth/google/callback"
                .parse()
                .unwrap(),
        };
        AuthConfig {
            google: Some(provider_config),
            discord: None,
            facebook: None,
            session_ttl: StdDuration::from_secs(30 * 60),
            base_url: "http://localhost:3000".parse().unwrap(),
            cookie_name: "session".to_string(),
            cookie_secure: false,
            session_secret: "0123456789abcdef0123456789abcdef".to_string(),
            failure_redirect: "/login?error=auth".to_string(),
        }
    }

    fn test_profile() -> Profile {
        Profile {
            subject: "google-sub-1".to_string(),
            provider: Provider::Google,
            email: Some("ana@example.com".to_string()),
            name: Some("Ana".to_string()),
            picture: None,
        }
    }

    fn test_app(profile: Profile) -> Router {
        let state = AuthState::bare(
            Arc::new(MemoryUsers::default()),
            Arc::new(InMemorySessionStore::new()),
            test_config(),
        )
        .with_provider(Arc::new(StaticProvider {
            provider: Provider::Google,
            profile,
        }));

        auth_routes().with_state(state)
    }

    fn location(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("expected a session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// Drives login through the redirect and callback, returning the cookie.
    async fn login_flow(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let auth_url: Url = location(&response).parse().unwrap();
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/google/callback?code=ok&state={state}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/dashboard");

        session_cookie(&response)
    }

    #[tokio::test]
    async fn full_login_flow_sets_session_and_serves_me() {
        let app = test_app(test_profile());
        let cookie = login_flow(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let user: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(user["email"], "ana@example.com");
        assert_eq!(user["provider"], "google");
    }

    #[tokio::test]
    async fn me_without_session_is_unauthorized() {
        let app = test_app(test_profile());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsigned_cookie_is_rejected() {
        let app = test_app(test_profile());
        let _ = login_flow(&app).await;

        // A raw session id without the jar's signature must not authenticate.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(header::COOKIE, "session=abcdefghij0123456789abcdefghij01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn callback_with_unknown_state_redirects_to_failure() {
        let app = test_app(test_profile());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/google/callback?code=ok&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login?error=auth");
    }

    #[tokio::test]
    async fn callback_with_provider_error_redirects_to_failure() {
        let app = test_app(test_profile());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/google/callback?error=access_denied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login?error=auth");
    }

    #[tokio::test]
    async fn callback_with_failed_exchange_redirects_to_failure() {
        let app = test_app(test_profile());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let auth_url: Url = location(&response).parse().unwrap();
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/google/callback?code=bad-code&state={state}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login?error=auth");
    }

    #[tokio::test]
    async fn profile_without_email_redirects_to_failure() {
        let app = test_app(Profile {
            email: None,
            ..test_profile()
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let auth_url: Url = location(&response).parse().unwrap();
        let state = auth_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/google/callback?code=ok&state={state}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/login?error=auth");
    }

    #[tokio::test]
    async fn login_to_unconfigured_provider_is_not_found() {
        let app = test_app(test_profile());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/discord")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = test_app(test_profile());
        let cookie = login_flow(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn second_login_reuses_the_same_user() {
        let app = test_app(test_profile());

        let first = login_flow(&app).await;
        let second = login_flow(&app).await;

        let mut ids = Vec::new();
        for cookie in [first, second] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/auth/me")
                        .header(header::COOKIE, &cookie)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let user: serde_json::Value = serde_json::from_slice(&body).unwrap();
            ids.push(user["id"].as_str().unwrap().to_string());
        }

        assert_eq!(ids[0], ids[1]);
    }
}
