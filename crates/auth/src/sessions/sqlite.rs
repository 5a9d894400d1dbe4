//! SQLite session storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use socialgate_core::auth::{
    AuthError, AuthFlowState, Result, Session, SessionId, SessionRepository,
};
use socialgate_core::identity::Provider;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);

CREATE TABLE IF NOT EXISTS auth_flows (
    state TEXT PRIMARY KEY,
    pkce_verifier TEXT NOT NULL,
    provider TEXT NOT NULL,
    created_at TEXT NOT NULL,
    return_to TEXT
);
"#;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn storage_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::Persistence(e.to_string())
}

fn parse_provider(s: &str) -> Result<Provider> {
    s.parse::<Provider>().map_err(AuthError::Persistence)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(storage_err)?
        .with_timezone(&Utc))
}

/// SQLite-backed session storage.
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Creates a new SQLite session store backed by a file.
    ///
    /// The database file will be created if it doesn't exist and the schema
    /// is applied automatically.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).await.map_err(storage_err)?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Creates a store with an in-memory database. Useful for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(CREATE_TABLES).map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(storage_err)
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let id = session.id.as_str().to_string();
        let user_id = session.user_id.to_string();
        let provider = session.provider.to_string();
        let created_at = session.created_at.to_rfc3339();
        let expires_at = session.expires_at.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, user_id, provider, created_at, expires_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id, user_id, provider, created_at, expires_at],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let id_str = id.as_str().to_string();

        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, user_id, provider, created_at, expires_at \
                         FROM sessions WHERE id = ?1",
                    )
                    .map_err(wrap_err)?;
                match stmt.query_row([&id_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                }) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(storage_err)?;

        match row {
            Some((id, user_id, provider, created_at, expires_at)) => Ok(Some(Session {
                id: SessionId::new(id),
                user_id: user_id.parse::<Uuid>().map_err(storage_err)?,
                provider: parse_provider(&provider)?,
                created_at: parse_datetime(&created_at)?,
                expires_at: parse_datetime(&expires_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let id_str = id.as_str().to_string();

        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE id = ?1", [&id_str])
                    .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<()> {
        let user_id = user_id.to_string();

        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE user_id = ?1", [&user_id])
                    .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn store_auth_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()> {
        let state = state.to_string();
        let pkce_verifier = flow.pkce_verifier.clone();
        let provider = flow.provider.to_string();
        let created_at = flow.created_at.to_rfc3339();
        let return_to = flow.return_to.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO auth_flows \
                     (state, pkce_verifier, provider, created_at, return_to) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![state, pkce_verifier, provider, created_at, return_to],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn take_auth_flow(&self, state: &str) -> Result<Option<AuthFlowState>> {
        let state = state.to_string();

        // SELECT and DELETE run in one transaction so a state value can only
        // be redeemed once, preventing replay.
        let row = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;

                let row = {
                    let mut stmt = tx
                        .prepare(
                            "SELECT pkce_verifier, provider, created_at, return_to \
                             FROM auth_flows WHERE state = ?1",
                        )
                        .map_err(wrap_err)?;
                    match stmt.query_row([&state], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    }) {
                        Ok(row) => Some(row),
                        Err(rusqlite::Error::QueryReturnedNoRows) => None,
                        Err(e) => return Err(wrap_err(e)),
                    }
                };

                if row.is_some() {
                    tx.execute("DELETE FROM auth_flows WHERE state = ?1", [&state])
                        .map_err(wrap_err)?;
                }

                tx.commit().map_err(wrap_err)?;
                Ok(row)
            })
            .await
            .map_err(storage_err)?;

        match row {
            Some((pkce_verifier, provider, created_at, return_to)) => Ok(Some(AuthFlowState {
                pkce_verifier,
                provider: parse_provider(&provider)?,
                created_at: parse_datetime(&created_at)?,
                return_to,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialgate_core::auth::generate_session_id;

    fn test_session(user_id: Uuid) -> Session {
        Session {
            id: generate_session_id(),
            user_id,
            provider: Provider::Discord,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(30),
        }
    }

    #[tokio::test]
    async fn session_round_trips_through_sqlite() {
        let store = SqliteSessionStore::new_in_memory().await.unwrap();
        let session = test_session(Uuid::new_v4());

        store.create_session(&session).await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.user_id, session.user_id);
        assert_eq!(loaded.provider, Provider::Discord);
        assert_eq!(loaded.expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn delete_user_sessions_only_touches_that_user() {
        let store = SqliteSessionStore::new_in_memory().await.unwrap();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        let mine = test_session(user_a);
        let theirs = test_session(user_b);
        store.create_session(&mine).await.unwrap();
        store.create_session(&theirs).await.unwrap();

        store.delete_user_sessions(user_a).await.unwrap();

        assert!(store.get_session(&mine.id).await.unwrap().is_none());
        assert!(store.get_session(&theirs.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn auth_flow_is_consumed_exactly_once() {
        let store = SqliteSessionStore::new_in_memory().await.unwrap();
        let flow = AuthFlowState {
            pkce_verifier: "verifier".to_string(),
            provider: Provider::Facebook,
            created_at: Utc::now(),
            return_to: Some("/dashboard".to_string()),
        };

        store.store_auth_flow("state-1", &flow).await.unwrap();

        let taken = store.take_auth_flow("state-1").await.unwrap().unwrap();
        assert_eq!(taken.pkce_verifier, "verifier");
        assert_eq!(taken.provider, Provider::Facebook);
        assert_eq!(taken.return_to.as_deref(), Some("/dashboard"));

        assert!(store.take_auth_flow("state-1").await.unwrap().is_none());
    }
}
