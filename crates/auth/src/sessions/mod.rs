//! Session storage implementations.
//!
//! Provides `SessionRepository` implementations for:
//! - In-memory (development and tests)
//! - SQLite (durable across restarts)
//!
//! The backend is selected at startup from configuration.

mod inmemory;
mod sqlite;

pub use inmemory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
