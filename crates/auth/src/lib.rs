//! Delegated authentication for socialgate.
//!
//! This crate provides:
//! - OAuth2/OIDC flows with Google, Discord and Facebook
//! - Session storage (in-memory or SQLite, selected at startup)
//! - Axum handlers and extractors for authentication

mod config;
mod error;
mod extractors;
mod handlers;
mod providers;
mod sessions;
mod state;

pub use config::{AuthConfig, ProviderConfig};
pub use error::AuthError;
pub use extractors::{CurrentUser, OptionalUser};
pub use handlers::auth_routes;
pub use providers::{GoogleProvider, OAuth2Provider};
pub use sessions::{InMemorySessionStore, SqliteSessionStore};
pub use state::AuthState;
