use thiserror::Error;

use crate::identity::IdentityError;
use crate::storage::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid OAuth state parameter")]
    InvalidState,

    #[error("failed to exchange authorization code: {0}")]
    CodeExchange(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("profile incomplete: missing {0}")]
    ProfileIncomplete(&'static str),

    #[error("invalid session token: {0}")]
    InvalidSession(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("storage error: {0}")]
    Persistence(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::ProfileIncomplete(field) => Self::ProfileIncomplete(field),
            IdentityError::Repository(e) => Self::Persistence(e.to_string()),
        }
    }
}
