//! SQLite key-value store.
//!
//! One table keyed by (partition, sort) holding JSON attributes. Conditional
//! writes read and replace the row inside one immediate transaction, under
//! the connection lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use hearth_core::error::{ErrorCode, HearthError, HearthResult};
use hearth_core::traits::{KeyValueStore, StoreItem, StoreKey, WriteCondition};

fn db_error(context: &'static str) -> impl Fn(rusqlite::Error) -> HearthError {
    move |e| HearthError::store_with_source(format!("{}: {}", context, e), e)
}

/// SQLite-backed [`KeyValueStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> HearthResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| HearthError::Store {
            message: format!("Failed to open {}: {}", path.display(), e),
            code: ErrorCode::StoreConnectionFailed,
            source: Some(Box::new(e)),
        })?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> HearthResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error("Failed to open in-memory database"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> HearthResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> HearthResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| HearthError::store("SQLite connection lock poisoned"))
    }

    fn init_schema(&self) -> HearthResult<()> {
        let conn = self.lock()?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(db_error("Failed to set busy timeout"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_items (
                partition TEXT NOT NULL,
                sort TEXT NOT NULL,
                attributes TEXT NOT NULL,
                PRIMARY KEY (partition, sort)
            );
        "#,
        )
        .map_err(db_error("Failed to initialize schema"))?;
        Ok(())
    }

    fn decode_row(partition: String, sort: String, attributes: &str) -> HearthResult<StoreItem> {
        let attributes: HashMap<String, serde_json::Value> = serde_json::from_str(attributes)?;
        Ok(StoreItem::new(StoreKey::new(partition, sort), attributes))
    }

    fn read(conn: &Connection, key: &StoreKey) -> HearthResult<Option<StoreItem>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT attributes FROM kv_items WHERE partition = ?1 AND sort = ?2",
                params![key.partition, key.sort],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error("Failed to read item"))?;

        raw.map(|attrs| Self::decode_row(key.partition.clone(), key.sort.clone(), &attrs))
            .transpose()
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &StoreKey) -> HearthResult<Option<StoreItem>> {
        let conn = self.lock()?;
        Self::read(&conn, key)
    }

    async fn put(&self, item: StoreItem, condition: WriteCondition) -> HearthResult<()> {
        let attributes = serde_json::to_string(&item.attributes)?;
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error("Failed to begin transaction"))?;

        if !matches!(condition, WriteCondition::Always) {
            let current = Self::read(&tx, &item.key)?;
            if !condition.is_satisfied_by(current.as_ref()) {
                debug!(key = %item.key, "Conditional write rejected");
                return Err(HearthError::condition_failed(
                    item.key.partition.clone(),
                    item.key.sort.clone(),
                ));
            }
        }

        tx.execute(
            "INSERT INTO kv_items (partition, sort, attributes) VALUES (?1, ?2, ?3)
             ON CONFLICT(partition, sort) DO UPDATE SET attributes = excluded.attributes",
            params![item.key.partition, item.key.sort, attributes],
        )
        .map_err(db_error("Failed to write item"))?;
        tx.commit().map_err(db_error("Failed to commit write"))?;
        Ok(())
    }

    async fn query_prefix(
        &self,
        partition: &str,
        sort_prefix: &str,
        limit: Option<usize>,
    ) -> HearthResult<Vec<StoreItem>> {
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT sort, attributes FROM kv_items
                 WHERE partition = ?1 AND substr(sort, 1, length(?2)) = ?2
                 ORDER BY sort
                 LIMIT ?3",
            )
            .map_err(db_error("Failed to prepare prefix query"))?;

        let rows = stmt
            .query_map(params![partition, sort_prefix, limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_error("Failed to run prefix query"))?;

        let mut items = Vec::new();
        for row in rows {
            let (sort, attributes) = row.map_err(db_error("Failed to read row"))?;
            items.push(Self::decode_row(partition.to_string(), sort, &attributes)?);
        }
        Ok(items)
    }

    async fn delete(&self, key: &StoreKey) -> HearthResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM kv_items WHERE partition = ?1 AND sort = ?2",
            params![key.partition, key.sort],
        )
        .map_err(db_error("Failed to delete item"))?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
