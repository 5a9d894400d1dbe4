use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Auth errors for the socialgate_auth crate.
///
/// This wraps the core `AuthError` and adds crate-specific variants for
/// configuration and provider wiring.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Error from the core auth module (state, tokens, sessions, storage).
    #[error(transparent)]
    Core(#[from] socialgate_core::auth::AuthError),

    /// Error from identity reconciliation.
    #[error(transparent)]
    Identity(#[from] socialgate_core::identity::IdentityError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider not configured.
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use socialgate_core::auth::AuthError as CoreError;
        use socialgate_core::identity::IdentityError;

        let (status, message) = match &self {
            AuthError::Core(core_err) => match core_err {
                CoreError::InvalidState => (StatusCode::BAD_REQUEST, self.to_string()),
                CoreError::InvalidSession(_)
                | CoreError::SessionNotFound
                | CoreError::SessionExpired => (StatusCode::UNAUTHORIZED, self.to_string()),
                CoreError::ProfileIncomplete(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
                CoreError::CodeExchange(_) | CoreError::Provider(_) | CoreError::Persistence(_) => {
                    tracing::error!("Auth error: {}", self);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AuthError::Identity(identity_err) => match identity_err {
                IdentityError::ProfileIncomplete(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
                IdentityError::Repository(_) => {
                    tracing::error!("Storage error during auth: {}", self);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AuthError::Config(_) => {
                tracing::error!("Config error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
            AuthError::ProviderNotConfigured(provider) => (
                StatusCode::NOT_FOUND,
                format!("Authentication provider '{}' is not configured", provider),
            ),
        };

        (status, message).into_response()
    }
}
