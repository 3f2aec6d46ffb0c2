// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! SQLite adapter.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value as JsonValue};

use super::{ConnectionHandle, DbAdapter, ModelHandle};
use crate::config::ConnectionConfig;
use crate::error::DbError;
use crate::module::ModelConfig;

/// Adapter backed by one SQLite database.
///
/// `database = ":memory:"` (or empty) opens an in-memory database.
#[derive(Default)]
pub struct SqliteAdapter {
    conn: Option<Arc<Mutex<Connection>>>,
    target: Option<String>,
}

impl SqliteAdapter {
    /// The shared connection, after `connect`.
    pub fn shared_connection(&self) -> Option<Arc<Mutex<Connection>>> {
        self.conn.clone()
    }
}

#[async_trait]
impl DbAdapter for SqliteAdapter {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), DbError> {
        let conn = if config.database.is_empty() || config.database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.database)
        }
        .map_err(|e| DbError::Storage(format!("Failed to open database: {}", e)))?;

        self.target = Some(if config.database.is_empty() {
            ":memory:".to_string()
        } else {
            config.database.clone()
        });
        self.conn = Some(Arc::new(Mutex::new(conn)));
        Ok(())
    }

    fn connection(&self) -> Option<ConnectionHandle> {
        self.conn.clone().map(|conn| conn as ConnectionHandle)
    }

    fn connected_to(&self) -> Option<String> {
        self.target.clone()
    }

    async fn setup_model(&self, name: &str, config: &ModelConfig) -> Result<ModelHandle, DbError> {
        let conn = self.conn.clone().ok_or(DbError::NotConnected)?;
        if config.schema.is_empty() {
            return Err(DbError::MissingSchema(name.to_string()));
        }

        let table = config
            .table
            .clone()
            .unwrap_or_else(|| name.to_lowercase());
        check_identifier(&table)?;

        let mut columns = Vec::with_capacity(config.schema.len());
        let mut definitions = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        for (column, sql_type) in &config.schema {
            check_identifier(column)?;
            check_identifier(sql_type)?;
            definitions.push(format!("\"{}\" {}", column, sql_type));
            columns.push(column.clone());
        }

        {
            let guard = lock(&conn)?;
            guard.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
                    table,
                    definitions.join(", ")
                ),
                [],
            )?;
        }

        Ok(Arc::new(SqliteModel {
            conn,
            table,
            columns,
        }))
    }
}

/// One table with a fixed set of columns plus an `id` primary key.
pub struct SqliteModel {
    conn: Arc<Mutex<Connection>>,
    table: String,
    columns: Vec<String>,
}

impl SqliteModel {
    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Schema columns (without `id`).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Inserts a record; unknown keys are ignored. Returns the new id.
    pub fn insert(&self, record: &Map<String, JsonValue>) -> Result<i64, DbError> {
        let present: Vec<&String> = self
            .columns
            .iter()
            .filter(|c| record.contains_key(c.as_str()))
            .collect();

        let conn = lock(&self.conn)?;
        if present.is_empty() {
            conn.execute(&format!("INSERT INTO \"{}\" DEFAULT VALUES", self.table), [])?;
        } else {
            let names: Vec<String> = present.iter().map(|c| format!("\"{}\"", c)).collect();
            let placeholders: Vec<String> = (1..=present.len()).map(|i| format!("?{}", i)).collect();
            let values = present.iter().map(|c| to_sql(&record[c.as_str()]));
            conn.execute(
                &format!(
                    "INSERT INTO \"{}\" ({}) VALUES ({})",
                    self.table,
                    names.join(", "),
                    placeholders.join(", ")
                ),
                params_from_iter(values),
            )?;
        }
        Ok(conn.last_insert_rowid())
    }

    /// All records ordered by id.
    pub fn find_all(&self) -> Result<Vec<Map<String, JsonValue>>, DbError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\" ORDER BY id", self.table))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt.query_map([], |row| Ok(row_to_map(row, &names)))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Record by id.
    pub fn find(&self, id: i64) -> Result<Option<Map<String, JsonValue>>, DbError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\" WHERE id = ?1", self.table))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_map(row, &names))),
            None => Ok(None),
        }
    }

    /// Deletes by id; returns whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool, DbError> {
        let conn = lock(&self.conn)?;
        let removed = conn.execute(
            &format!("DELETE FROM \"{}\" WHERE id = ?1", self.table),
            params![id],
        )?;
        Ok(removed > 0)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, DbError> {
    conn.lock().map_err(|e| DbError::Storage(e.to_string()))
}

fn check_identifier(name: &str) -> Result<(), DbError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ');
    if valid && !name.starts_with(' ') {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn row_to_map(row: &Row<'_>, names: &[String]) -> Map<String, JsonValue> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = match row.get_ref(i) {
                Ok(ValueRef::Integer(n)) => JsonValue::from(n),
                Ok(ValueRef::Real(f)) => JsonValue::from(f),
                Ok(ValueRef::Text(t)) | Ok(ValueRef::Blob(t)) => {
                    JsonValue::from(String::from_utf8_lossy(t).into_owned())
                }
                Ok(ValueRef::Null) | Err(_) => JsonValue::Null,
            };
            (name.clone(), value)
        })
        .collect()
}
