//! SQLite-backed credential store.
//!
//! Tables:
//! - `users`: id, username (UNIQUE), password_hash, created_at
//!
//! The UNIQUE constraint on `username` is the authority on duplicates. The
//! lookup before insert only saves a hash computation in the common case.

use super::password::PasswordHasher;
use super::AuthError;
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::path::Path;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredential {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed user credential store.
pub struct CredentialStore {
    conn: Mutex<rusqlite::Connection>,
    hasher: PasswordHasher,
}

impl CredentialStore {
    /// Open (or create) the credential database at the given path.
    pub fn open(db_path: &Path, hasher: PasswordHasher) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }
        let conn = rusqlite::Connection::open(db_path)
            .with_context(|| format!("Failed to open credential DB: {}", db_path.display()))?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            hasher,
        })
    }

    /// Create an in-memory store (for tests).
    pub fn open_in_memory(hasher: PasswordHasher) -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            hasher,
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> anyhow::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Register a new user.
    pub fn register(&self, username: &str, password: &str) -> Result<UserCredential, AuthError> {
        // A taken username wins over a missing password.
        if !username.is_empty() && self.find_by_username(username)?.is_some() {
            return Err(AuthError::DuplicateUsername(username.to_string()));
        }
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        let user = UserCredential {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: self.hasher.hash(password),
            created_at: Utc::now(),
        };

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (id, username, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                user.id,
                user.username,
                user.password_hash,
                user.created_at.timestamp_millis(),
            ],
        );

        match result {
            Ok(_) => {
                tracing::info!(username = %user.username, user_id = %user.id, "User registered");
                Ok(user)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Lost a race with a concurrent registration.
                Err(AuthError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(AuthError::Store(e.into())),
        }
    }

    /// Look up a user by username (case-sensitive).
    pub fn find_by_username(&self, username: &str) -> anyhow::Result<Option<UserCredential>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            rusqlite::params![username],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        );

        match row {
            Ok((id, username, password_hash, created_at)) => Ok(Some(UserCredential {
                id,
                username,
                password_hash,
                created_at: Utc
                    .timestamp_millis_opt(created_at)
                    .single()
                    .unwrap_or_default(),
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check a password against the stored hash. Unknown users never verify.
    pub fn verify_password(&self, username: &str, password: &str) -> anyhow::Result<bool> {
        Ok(self
            .find_by_username(username)?
            .is_some_and(|user| self.hasher.verify(password, &user.password_hash)))
    }

    /// Count registered users.
    pub fn user_count(&self) -> anyhow::Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
