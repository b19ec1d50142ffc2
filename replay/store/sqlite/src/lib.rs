use replay_core::store::{ContentId, ContentStore, StoreError};

use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Content store kept in a SQLite database.
///
/// Blobs live in a single `resources` table keyed by their 32-byte id.
/// Storing bytes that are already present is a no-op.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        Self::with_connection(rusqlite::Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(rusqlite::Connection::open_in_memory()?)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS resources (\
                id BLOB PRIMARY KEY, \
                data BLOB NOT NULL\
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored blobs.
    pub fn len(&self) -> Result<u64, DatabaseError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, DatabaseError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn tamper(&self, id: &ContentId, bytes: &[u8]) {
        self.lock()
            .execute(
                "UPDATE resources SET data = ?2 WHERE id = ?1",
                params![&id.as_bytes()[..], bytes],
            )
            .unwrap();
    }
}

impl ContentStore for SqliteStore {
    fn store(&self, bytes: &[u8]) -> Result<ContentId, StoreError> {
        let id = ContentId::of(bytes);
        let inserted = self
            .lock()
            .execute(
                "INSERT OR IGNORE INTO resources (id, data) VALUES (?1, ?2)",
                params![&id.as_bytes()[..], bytes],
            )
            .map_err(|e| StoreError::backend(DatabaseError(e)))?;
        if inserted > 0 {
            tracing::trace!(%id, size = bytes.len(), "stored resource");
        }
        Ok(id)
    }

    fn resolve(&self, id: &ContentId) -> Result<Arc<[u8]>, StoreError> {
        let data: Option<Vec<u8>> = self
            .lock()
            .query_row(
                "SELECT data FROM resources WHERE id = ?1",
                params![&id.as_bytes()[..]],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::backend(DatabaseError(e)))?;
        let data = data.ok_or(StoreError::UnknownId(*id))?;
        if !id.matches(&data) {
            tracing::warn!(%id, "stored resource does not match its id");
            return Err(StoreError::Corrupt(*id));
        }
        Ok(data.into())
    }

    fn contains(&self, id: &ContentId) -> bool {
        self.lock()
            .query_row(
                "SELECT 1 FROM resources WHERE id = ?1",
                params![&id.as_bytes()[..]],
                |_| Ok(()),
            )
            .optional()
            .ok()
            .flatten()
            .is_some()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DatabaseError(#[from] rusqlite::Error);
