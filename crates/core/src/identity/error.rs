use thiserror::Error;

use crate::storage::RepositoryError;

/// Errors produced while reconciling a profile against stored users.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider returned insufficient data; nothing was persisted.
    #[error("profile incomplete: missing {0}")]
    ProfileIncomplete(&'static str),

    /// Storage read or write failure; the login attempt must be denied.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
