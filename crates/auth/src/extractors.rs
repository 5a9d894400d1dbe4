//! Axum extractors for authentication.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::cookie::Key;
use axum_extra::extract::SignedCookieJar;
use chrono::Utc;
use socialgate_core::auth::{is_session_expired, SessionId};
use socialgate_core::identity::User;

use crate::AuthState;

/// Extractor for authenticated user. Returns 401 if not authenticated.
///
/// The user is re-read from storage on every request, so profile changes made
/// by a concurrent login are visible immediately.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        // The signed jar rejects cookies whose signature does not verify, so
        // a tampered value reads the same as no cookie at all.
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(&auth_state));
        let cookie = jar
            .get(&auth_state.config.cookie_name)
            .ok_or((StatusCode::UNAUTHORIZED, "No session cookie"))?;

        let session_id = SessionId::parse(cookie.value())
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid session token"))?;

        let session = auth_state
            .sessions
            .get_session(&session_id)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Session lookup failed"))?
            .ok_or((StatusCode::UNAUTHORIZED, "Session not found"))?;

        if is_session_expired(&session, Utc::now()) {
            return Err((StatusCode::UNAUTHORIZED, "Session expired"));
        }

        let user = auth_state
            .users
            .get_user(session.user_id)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "User lookup failed"))?
            .ok_or((StatusCode::UNAUTHORIZED, "User not found"))?;

        Ok(CurrentUser(user))
    }
}

/// Extractor for optionally authenticated user. Returns None if not authenticated.
pub struct OptionalUser(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(&auth_state));
        let cookie = match jar.get(&auth_state.config.cookie_name) {
            Some(cookie) => cookie,
            None => return Ok(OptionalUser(None)),
        };

        let session_id = match SessionId::parse(cookie.value()) {
            Ok(id) => id,
            Err(_) => return Ok(OptionalUser(None)),
        };

        let session = match auth_state.sessions.get_session(&session_id).await {
            Ok(Some(s)) => s,
            _ => return Ok(OptionalUser(None)),
        };

        if is_session_expired(&session, Utc::now()) {
            return Ok(OptionalUser(None));
        }

        let user = match auth_state.users.get_user(session.user_id).await {
            Ok(Some(u)) => u,
            _ => return Ok(OptionalUser(None)),
        };

        Ok(OptionalUser(Some(user)))
    }
}
