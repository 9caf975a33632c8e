use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

const AUTH_TOKEN_KEY: &str = "authToken";
const DARK_MODE_KEY: &str = "darkMode";

/// Durable client-side state: the bearer token and the dark-mode preference.
///
/// Single SQLite connection behind a mutex, cheap to clone and share.
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Open (or create) the session database at the given path.
    /// `":memory:"` gives a throwaway store.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = SessionStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM client_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO client_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM client_state WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Auth token ───────────────────────────────────────────────────────────

    pub fn auth_token(&self) -> Result<Option<String>> {
        Ok(self.get(AUTH_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    pub fn set_auth_token(&self, token: &str) -> Result<()> {
        self.set(AUTH_TOKEN_KEY, token)
    }

    pub fn clear_auth_token(&self) -> Result<()> {
        self.remove(AUTH_TOKEN_KEY)
    }

    // ── Preferences ──────────────────────────────────────────────────────────

    pub fn dark_mode(&self) -> Result<bool> {
        Ok(self.get(DARK_MODE_KEY)?.as_deref() == Some("true"))
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.set(DARK_MODE_KEY, if enabled { "true" } else { "false" })
    }
}

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS client_state (
    key         TEXT    PRIMARY KEY,
    value       TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);
"#;
