//! Identity provider implementations.
//!
//! This module contains implementations of `ProviderClient` for:
//! - Google (OIDC discovery and ID-token verification)
//! - Discord and Facebook (plain OAuth2 code flow plus a userinfo call),
//!   both served by one adapter selected by the `Provider` tag

mod google;
mod oauth;

pub use google::GoogleProvider;
pub use oauth::OAuth2Provider;
