use crate::error::{Result, TapnadError};
use crate::race::Race;
use crate::storage::Storage;
use crate::types::RaceEvent;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub seq: i64,
    pub event: RaceEvent,
    pub created_at: DateTime<Utc>,
}

pub struct RaceStore<'a> {
    storage: &'a Storage,
}

impl<'a> RaceStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_race(&self, race: &Race) -> Result<()> {
        let snapshot = serde_json::to_string(race)?;
        let checksum = calculate_checksum(snapshot.as_bytes());
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO race_snapshots (id, snapshot, checksum, updated_at)
             VALUES (1, ?1, ?2, ?3)",
            params![snapshot, checksum, Utc::now().timestamp()],
        )?;

        tracing::debug!("Saved race snapshot ({})", race.status());
        Ok(())
    }

    /// Load the stored race, if one was ever saved.
    pub async fn load_race(&self) -> Result<Option<Race>> {
        let conn = self.storage.get_connection().await;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT snapshot, checksum FROM race_snapshots WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((snapshot, checksum)) = row else {
            return Ok(None);
        };

        if calculate_checksum(snapshot.as_bytes()) != checksum {
            return Err(TapnadError::corrupted("race snapshot checksum mismatch"));
        }

        Ok(Some(serde_json::from_str(&snapshot)?))
    }

    pub async fn append_events(&self, events: &[RaceEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        // Savepoint nests inside a write lock held by the caller
        let mut conn = self.storage.get_connection().await;
        let tx = conn.savepoint()?;
        let now = Utc::now().timestamp();

        for event in events {
            tx.execute(
                "INSERT INTO race_events (kind, payload, created_at) VALUES (?1, ?2, ?3)",
                params![event.kind(), serde_json::to_string(event)?, now],
            )?;
        }

        tx.commit()?;
        tracing::debug!("Appended {} race event(s)", events.len());
        Ok(())
    }

    /// The most recent `limit` events, oldest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT seq, payload, created_at FROM race_events
             ORDER BY seq DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (seq, payload, created_at) = row?;
            events.push(StoredEvent {
                seq,
                event: serde_json::from_str(&payload)?,
                created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
            });
        }

        events.reverse();
        Ok(events)
    }

    pub async fn event_count(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM race_events", [], |row| row.get(0))?;

        Ok(count as u64)
    }
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaceConfig;
    use crate::types::{PlayerId, Team};
    use tempfile::tempdir;

    fn id(raw: &str) -> PlayerId {
        PlayerId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_race_persists_across_connections() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("tapnad.db");

        let mut race = Race::new(RaceConfig::new(vec![id("0xabcd")])).unwrap();
        race.join_team(id("alice"), Team::Bitcoin).unwrap();
        race.join_team(id("bob"), Team::Ethereum).unwrap();
        race.start_race(&id("0xabcd")).unwrap();
        race.tap(&id("bob")).unwrap();

        {
            let storage = Storage::new(&db_path).await.unwrap();
            RaceStore::new(&storage).save_race(&race).await.unwrap();
        }

        let storage = Storage::new(&db_path).await.unwrap();
        let loaded = RaceStore::new(&storage).load_race().await.unwrap().unwrap();

        assert_eq!(loaded.status(), race.status());
        assert_eq!(loaded.started_at(), race.started_at());
        assert_eq!(loaded.supporters(Team::Ethereum), race.supporters(Team::Ethereum));
        assert_eq!(loaded.player_taps(&id("bob")), 1);
    }

    #[tokio::test]
    async fn test_missing_snapshot_loads_none() {
        let storage = Storage::in_memory().await.unwrap();
        assert!(RaceStore::new(&storage).load_race().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tampered_snapshot_is_rejected() {
        let storage = Storage::in_memory().await.unwrap();
        let store = RaceStore::new(&storage);
        let race = Race::new(RaceConfig::new(vec![id("0xabcd")])).unwrap();
        store.save_race(&race).await.unwrap();

        {
            let conn = storage.get_connection().await;
            conn.execute(
                "UPDATE race_snapshots SET snapshot = replace(snapshot, 'Lobby', 'Finished')",
                [],
            )
            .unwrap();
        }

        assert!(matches!(store.load_race().await, Err(TapnadError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_event_ledger_keeps_order() {
        let storage = Storage::in_memory().await.unwrap();
        let store = RaceStore::new(&storage);

        store
            .append_events(&[
                RaceEvent::PlayerJoined {
                    player: id("alice"),
                    team: Team::Bitcoin,
                },
                RaceEvent::GameReset,
            ])
            .await
            .unwrap();
        store
            .append_events(&[RaceEvent::GameFinished {
                winner: Team::Ethereum,
                duration_secs: 9,
            }])
            .await
            .unwrap();

        assert_eq!(store.event_count().await.unwrap(), 3);

        let recent = store.recent_events(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event, RaceEvent::GameReset);
        assert!(recent[0].seq < recent[1].seq);
        assert!(matches!(recent[1].event, RaceEvent::GameFinished { .. }));
    }
}
