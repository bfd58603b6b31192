//! SQLite-backed persistence for tenant configuration and extension tables

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::application::errors::StorageError;
use crate::domain::entities::FieldValue;
use crate::domain::traits::ConfigBackend;

/// Declaration of a table owned by a storage-backed extension.
///
/// `ddl` must be a `CREATE TABLE IF NOT EXISTS` statement so that ensuring
/// the table is idempotent; existing data is never dropped or migrated.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub ddl: String,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, ddl: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ddl: ddl.into(),
        }
    }
}

/// SQLite database wrapper.
///
/// The connection lives behind a mutex: one session per logical operation,
/// handed out by [`Database::with_session`]. Retry and backoff are left to
/// callers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_tables()?;
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let conn = self.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tenant_config (
                tenant_id TEXT NOT NULL,
                extension TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (tenant_id, extension, field)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tenant_extensions (
                tenant_id TEXT NOT NULL,
                extension TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                PRIMARY KEY (tenant_id, extension)
            )",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Recover the guard if a previous holder panicked.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Idempotently ensure an extension-owned table exists.
    pub fn ensure_table(&self, spec: &TableSpec) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute_batch(&spec.ddl)?;
        tracing::info!("Ensured table: {}", spec.name);
        Ok(())
    }

    /// Run one logical operation against the connection.
    ///
    /// This is the scoped-session accessor storage-backed extensions use
    /// for their own tables.
    pub fn with_session<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self.lock();
        Ok(f(&conn)?)
    }
}

impl ConfigBackend for Database {
    fn load_overrides(
        &self,
        tenant_id: &str,
        extension: &str,
    ) -> Result<HashMap<String, FieldValue>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT field, value FROM tenant_config WHERE tenant_id = ?1 AND extension = ?2",
        )?;

        let rows = stmt.query_map([tenant_id, extension], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut overrides = HashMap::new();
        for row in rows {
            let (field, raw) = row?;
            let value: FieldValue = serde_json::from_str(&raw)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            overrides.insert(field, value);
        }
        Ok(overrides)
    }

    fn save_overrides(
        &self,
        tenant_id: &str,
        extension: &str,
        values: &HashMap<String, FieldValue>,
    ) -> Result<(), StorageError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for (field, value) in values {
            let raw = serde_json::to_string(value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            tx.execute(
                "INSERT OR REPLACE INTO tenant_config (tenant_id, extension, field, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))",
                rusqlite::params![tenant_id, extension, field, raw],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn disabled_extensions(&self, tenant_id: &str) -> Result<HashSet<String>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT extension FROM tenant_extensions WHERE tenant_id = ?1 AND enabled = 0",
        )?;

        let rows = stmt.query_map([tenant_id], |row| row.get::<_, String>(0))?;

        let mut disabled = HashSet::new();
        for row in rows {
            disabled.insert(row?);
        }
        Ok(disabled)
    }

    fn set_extension_enabled(
        &self,
        tenant_id: &str,
        extension: &str,
        enabled: bool,
    ) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO tenant_extensions (tenant_id, extension, enabled)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![tenant_id, extension, enabled as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_round_trip() {
        let db = Database::in_memory().unwrap();
        let mut values = HashMap::new();
        values.insert("greeting".to_string(), FieldValue::Text("hi".to_string()));
        values.insert("count".to_string(), FieldValue::Int(3));

        db.save_overrides("t1", "karma", &values).unwrap();
        let loaded = db.load_overrides("t1", "karma").unwrap();
        assert_eq!(loaded, values);

        // Other tenants are unaffected.
        assert!(db.load_overrides("t2", "karma").unwrap().is_empty());
    }

    #[test]
    fn enabled_rows_default_to_absent() {
        let db = Database::in_memory().unwrap();
        assert!(db.disabled_extensions("t1").unwrap().is_empty());

        db.set_extension_enabled("t1", "karma", false).unwrap();
        assert!(db.disabled_extensions("t1").unwrap().contains("karma"));

        db.set_extension_enabled("t1", "karma", true).unwrap();
        assert!(db.disabled_extensions("t1").unwrap().is_empty());
    }

    #[test]
    fn ensure_table_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let spec = TableSpec::new(
            "karma_scores",
            "CREATE TABLE IF NOT EXISTS karma_scores (
                tenant_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (tenant_id, subject)
            )",
        );
        db.ensure_table(&spec).unwrap();
        db.with_session(|conn| {
            conn.execute(
                "INSERT INTO karma_scores (tenant_id, subject, score) VALUES ('t1', 'ada', 2)",
                [],
            )
        })
        .unwrap();

        // Ensuring again must not drop existing rows.
        db.ensure_table(&spec).unwrap();
        let score: i64 = db
            .with_session(|conn| {
                conn.query_row(
                    "SELECT score FROM karma_scores WHERE tenant_id = 't1' AND subject = 'ada'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(score, 2);
    }
}
