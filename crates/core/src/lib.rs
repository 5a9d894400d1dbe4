pub mod identity;
pub mod storage;

#[cfg(feature = "auth")]
pub mod auth;
