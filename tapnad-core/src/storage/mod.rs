pub mod race_store;

pub use race_store::{RaceStore, StoredEvent};

use crate::error::{Result, TapnadError};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long a writer waits for another process to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TapnadError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    /// Storage that lives only as long as this value.
    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Single row holding the authoritative race
        conn.execute(
            "CREATE TABLE IF NOT EXISTS race_snapshots (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                snapshot TEXT NOT NULL,
                checksum TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Append-only event ledger
        conn.execute(
            "CREATE TABLE IF NOT EXISTS race_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Take the database write lock until `commit` or `rollback`. Other
    /// connections can still read but cannot begin a write of their own.
    pub async fn begin_exclusive(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        tracing::debug!("Acquired race write lock");
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaceConfig;
    use crate::race::Race;
    use crate::types::{PlayerId, RaceEvent, Team};

    fn id(raw: &str) -> PlayerId {
        PlayerId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_exclusive_write_commits_snapshot_and_events() {
        let storage = Storage::in_memory().await.unwrap();
        let store = RaceStore::new(&storage);

        let mut race = Race::new(RaceConfig::new(vec![id("0xabcd")])).unwrap();
        let event = race.join_team(id("alice"), Team::Bitcoin).unwrap();

        storage.begin_exclusive().await.unwrap();
        store.save_race(&race).await.unwrap();
        store.append_events(&[event]).await.unwrap();
        storage.commit().await.unwrap();

        let loaded = store.load_race().await.unwrap().unwrap();
        assert!(loaded.has_joined(&id("alice")));
        assert_eq!(store.event_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_pending_writes() {
        let storage = Storage::in_memory().await.unwrap();
        let store = RaceStore::new(&storage);
        let race = Race::new(RaceConfig::new(vec![id("0xabcd")])).unwrap();

        storage.begin_exclusive().await.unwrap();
        store.save_race(&race).await.unwrap();
        store.append_events(&[RaceEvent::GameReset]).await.unwrap();
        storage.rollback().await.unwrap();

        assert!(store.load_race().await.unwrap().is_none());
        assert_eq!(store.event_count().await.unwrap(), 0);

        // No open transaction left behind
        storage.commit().await.unwrap();
        storage.rollback().await.unwrap();
    }
}
