//! User storage backends.
//!
//! Implements the `UserRepository` trait from `socialgate_core::storage` for:
//! - In-memory (development and tests)
//! - SQLite (durable)

mod inmemory;
mod sqlite;

pub use inmemory::InMemoryRepository;
pub use sqlite::SqliteRepository;
