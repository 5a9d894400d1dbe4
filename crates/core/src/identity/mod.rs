//! Identity reconciliation.
//!
//! Maps a verified external profile onto the locally persisted `User`
//! collection: refresh an existing record, attach a record for a known email
//! under a new provider, or create a brand-new record.

mod error;
mod reconcile;
mod types;

pub use error::IdentityError;
pub use reconcile::{resolve, Resolution};
pub use types::{Profile, Provider, User};
