use std::env;

/// Storage backend selection for users and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Backend::Sqlite),
            "memory" => Ok(Backend::Memory),
            other => Err(format!(
                "unknown storage backend '{other}' (expected 'sqlite' or 'memory')"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file (default: "socialgate.db")
    pub sqlite_path: String,
    /// User storage backend (default: sqlite)
    pub storage: Backend,
    /// Session storage backend (default: sqlite)
    pub session_store: Backend,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SQLITE_PATH` - SQLite database path (default: "socialgate.db")
    /// - `STORAGE` - User storage backend, `sqlite` or `memory` (default: sqlite)
    /// - `SESSION_STORE` - Session storage backend, `sqlite` or `memory` (default: sqlite)
    ///
    /// An unrecognized backend name is a startup error.
    pub fn from_env() -> Result<Self, String> {
        let storage = env::var("STORAGE")
            .map(|v| v.parse())
            .unwrap_or(Ok(Backend::Sqlite))?;
        let session_store = env::var("SESSION_STORE")
            .map(|v| v.parse())
            .unwrap_or(Ok(Backend::Sqlite))?;

        Ok(Self {
            sqlite_path: env::var("SQLITE_PATH").unwrap_or_else(|_| "socialgate.db".to_string()),
            storage,
            session_store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_known_names() {
        assert_eq!("sqlite".parse::<Backend>().unwrap(), Backend::Sqlite);
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
    }

    #[test]
    fn backend_rejects_unknown_names() {
        assert!("postgres".parse::<Backend>().is_err());
    }
}
