// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! SQLite-backed session store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{SessionData, SessionStore};
use crate::error::SessionError;

/// Session store keeping one row per session id.
///
/// The connection may be shared with a [`crate::db::SqliteAdapter`] so that
/// sessions live in the application database.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Uses an existing connection, creating the `sessions` table if needed.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self, SessionError> {
        {
            let guard = conn.lock().map_err(|e| SessionError::Storage(e.to_string()))?;
            guard
                .execute(
                    r#"
                    CREATE TABLE IF NOT EXISTS sessions (
                        id TEXT PRIMARY KEY,
                        data TEXT NOT NULL,
                        expires INTEGER NOT NULL
                    )
                    "#,
                    [],
                )
                .map_err(|e| SessionError::Storage(format!("Failed to create table: {}", e)))?;
        }
        Ok(Self { conn })
    }

    /// Opens (or creates) a database file.
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let conn = Connection::open(path)
            .map_err(|e| SessionError::Storage(format!("Failed to open database: {}", e)))?;
        Self::new(Arc::new(Mutex::new(conn)))
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, SessionError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SessionError::Storage(format!("Failed to open database: {}", e)))?;
        Self::new(Arc::new(Mutex::new(conn)))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SessionError> {
        self.conn.lock().map_err(|e| SessionError::Storage(e.to_string()))
    }

    /// Current Unix timestamp.
    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: &str) -> Result<Option<SessionData>, SessionError> {
        let conn = self.lock()?;
        let result: Result<(String, u64), rusqlite::Error> = conn.query_row(
            "SELECT data, expires FROM sessions WHERE id = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        match result {
            Ok((data, expires)) => {
                if Self::now() >= expires {
                    // Expired, delete it
                    let _ = conn.execute("DELETE FROM sessions WHERE id = ?1", params![key]);
                    Ok(None)
                } else {
                    serde_json::from_str(&data)
                        .map(Some)
                        .map_err(|e| SessionError::Serialization(e.to_string()))
                }
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Storage(e.to_string())),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &SessionData,
        max_age: Duration,
        _rolling: bool,
    ) -> Result<(), SessionError> {
        let data =
            serde_json::to_string(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        let expires = Self::now() + max_age.as_secs();

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (id, data, expires) VALUES (?1, ?2, ?3)",
            params![key, data, expires],
        )
        .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn destroy(&self, key: &str) -> Result<(), SessionError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![key])
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteSessionStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteSessionStore::open(&temp_dir.path().join("sessions.db")).unwrap();
        (temp_dir, store)
    }

    fn data(value: serde_json::Value) -> SessionData {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let (_temp_dir, store) = create_test_store();

        store
            .set("sid1", &data(serde_json::json!({ "user": "ada" })), Duration::from_secs(60), false)
            .await
            .unwrap();
        let loaded = store.get("sid1").await.unwrap().unwrap();
        assert_eq!(loaded["user"], "ada");

        assert!(store.get("nonexistent").await.unwrap().is_none());

        store.destroy("sid1").await.unwrap();
        assert!(store.get("sid1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let (_temp_dir, store) = create_test_store();

        // Zero max age expires immediately
        store
            .set("sid1", &data(serde_json::json!({ "a": 1 })), Duration::ZERO, false)
            .await
            .unwrap();
        assert!(store.get("sid1").await.unwrap().is_none());
    }
}
