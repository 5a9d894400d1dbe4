//! SQLite repository implementation.
//!
//! Implements `UserRepository` from `socialgate_core::storage` using SQLite.
//! The login upsert is a single `INSERT ... ON CONFLICT ... RETURNING`
//! statement, so two racing callbacks for the same `(email, provider)` pair
//! cannot both insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use socialgate_core::identity::{Provider, User};
use socialgate_core::storage::{RepositoryError, Result, UserRepository};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    provider_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    email TEXT NOT NULL,
    name TEXT,
    profile_picture TEXT,
    created_at TEXT NOT NULL,
    last_login TEXT NOT NULL,
    UNIQUE(email, provider),
    UNIQUE(provider, provider_id)
);
CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
"#;

const USER_COLUMNS: &str = "id, provider_id, provider, email, name, profile_picture, created_at, last_login";

/// One user row, still in its stored string encoding.
struct UserRow {
    id: String,
    provider_id: String,
    provider: String,
    email: String,
    name: Option<String>,
    profile_picture: Option<String>,
    created_at: String,
    last_login: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        provider: row.get(2)?,
        email: row.get(3)?,
        name: row.get(4)?,
        profile_picture: row.get(5)?,
        created_at: row.get(6)?,
        last_login: row.get(7)?,
    })
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            provider_id: self.provider_id,
            provider: parse_provider(&self.provider)?,
            email: self.email,
            name: self.name,
            profile_picture: self.profile_picture,
            created_at: parse_datetime(&self.created_at)?,
            last_login: parse_datetime(&self.last_login)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::InvalidData(format!("invalid uuid '{s}': {e}")))
}

fn parse_provider(s: &str) -> Result<Provider> {
    s.parse::<Provider>().map_err(RepositoryError::InvalidData)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("invalid datetime '{s}': {e}")))
}

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn is_constraint_violation(e: &tokio_rusqlite::Error) -> bool {
    matches!(
        e,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// SQLite-based user repository.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Creates a new repository with a file-based database.
    ///
    /// The database file will be created if it doesn't exist. Schema tables
    /// are created automatically.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Creates a new repository with an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(CREATE_TABLES).map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }

    async fn query_one(
        &self,
        sql: &'static str,
        params: Vec<String>,
    ) -> Result<Option<UserRow>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(sql).map_err(wrap_err)?;
                match stmt.query_row(rusqlite::params_from_iter(params), read_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = self
            .query_one(
                "SELECT id, provider_id, provider, email, name, profile_picture, \
                 created_at, last_login FROM users WHERE id = ?1",
                vec![id.to_string()],
            )
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email_and_provider(
        &self,
        email: &str,
        provider: Provider,
    ) -> Result<Option<User>> {
        let row = self
            .query_one(
                "SELECT id, provider_id, provider, email, name, profile_picture, \
                 created_at, last_login FROM users WHERE email = ?1 AND provider = ?2",
                vec![email.to_string(), provider.to_string()],
            )
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self
            .query_one(
                "SELECT id, provider_id, provider, email, name, profile_picture, \
                 created_at, last_login FROM users WHERE email = ?1 \
                 ORDER BY created_at LIMIT 1",
                vec![email.to_string()],
            )
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn upsert_login(&self, candidate: &User) -> Result<User> {
        let id = candidate.id.to_string();
        let provider_id = candidate.provider_id.clone();
        let provider = candidate.provider.to_string();
        let email = candidate.email.clone();
        let name = candidate.name.clone();
        let profile_picture = candidate.profile_picture.clone();
        let created_at = candidate.created_at.to_rfc3339();
        let last_login = candidate.last_login.to_rfc3339();
        let conflict_id = candidate.provider_id.clone();

        // On the refresh path the conflict clause keeps the stored id and
        // created_at and only advances metadata and last_login. The WHERE
        // guard stops a different provider subject from taking over an
        // existing row; no row comes back in that case.
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO users \
                         (id, provider_id, provider, email, name, profile_picture, \
                          created_at, last_login) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                         ON CONFLICT(email, provider) DO UPDATE SET \
                           name = excluded.name, \
                           profile_picture = excluded.profile_picture, \
                           last_login = excluded.last_login \
                         WHERE users.provider_id = excluded.provider_id \
                         RETURNING id, provider_id, provider, email, name, \
                           profile_picture, created_at, last_login",
                    )
                    .map_err(wrap_err)?;
                match stmt.query_row(
                    rusqlite::params![
                        id,
                        provider_id,
                        provider,
                        email,
                        name,
                        profile_picture,
                        created_at,
                        last_login
                    ],
                    read_row,
                ) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    RepositoryError::AlreadyExists {
                        entity_type: "User",
                        id: conflict_id.clone(),
                    }
                } else {
                    RepositoryError::QueryFailed(e.to_string())
                }
            })?;

        match row {
            Some(row) => row.into_user(),
            // The (email, provider) row exists under a different subject.
            None => Err(RepositoryError::AlreadyExists {
                entity_type: "User",
                id: conflict_id,
            }),
        }
    }
}
