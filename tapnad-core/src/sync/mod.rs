//! Best-effort display sync between clients.
//!
//! Clients share their locally observed team totals so progress bars move
//! smoothly between authoritative reads. Delivery is lossy and unordered and
//! nothing here is ever consulted to decide a winner.
//!
//! Two transports are used side by side: an in-process broadcast channel for
//! peers in the same process, and a shared slot file that every publish
//! overwrites and every watcher polls.

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const DEFAULT_ROOM: &str = "tapnad-main-race";
pub const SLOT_FILE: &str = "realtime-sync.json";
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);
const STALE_AFTER_MS: i64 = 2000;
const CHANNEL_CAPACITY: usize = 64;

/// One client's view of the team totals at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapBeacon {
    pub bitcoin: u64,
    pub ethereum: u64,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub room: String,
}

pub struct DisplaySync {
    device_id: String,
    room: String,
    slot: PathBuf,
    channel: broadcast::Sender<TapBeacon>,
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DisplaySync {
    /// Sync through the slot file in `data_dir` with a fresh local channel.
    pub fn new(data_dir: &Path, room: impl Into<String>) -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self::with_channel(data_dir, room, channel)
    }

    /// Share `channel` with other in-process peers.
    pub fn with_channel(
        data_dir: &Path,
        room: impl Into<String>,
        channel: broadcast::Sender<TapBeacon>,
    ) -> Self {
        Self {
            device_id: get_or_create_device_id(),
            room: room.into(),
            slot: data_dir.join(SLOT_FILE),
            channel,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn channel(&self) -> broadcast::Sender<TapBeacon> {
        self.channel.clone()
    }

    /// Share local totals. A missing listener is not an error.
    pub async fn publish(&self, bitcoin: u64, ethereum: u64) -> Result<TapBeacon> {
        let beacon = TapBeacon {
            bitcoin,
            ethereum,
            timestamp: Utc::now(),
            device_id: self.device_id.clone(),
            room: self.room.clone(),
        };

        let _ = self.channel.send(beacon.clone());

        if let Some(parent) = self.slot.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so pollers never read a half-written slot.
        let staging = self.slot.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec(&beacon)?).await?;
        tokio::fs::rename(&staging, &self.slot).await?;

        tracing::debug!(
            "Broadcast totals ₿{} Ξ{} from {}",
            bitcoin,
            ethereum,
            self.device_id
        );
        Ok(beacon)
    }

    /// Whether `beacon` should be shown: from another device in this room and
    /// newer than anything already accepted from that device.
    pub fn accept(&self, beacon: &TapBeacon) -> bool {
        if beacon.device_id == self.device_id || beacon.room != self.room {
            return false;
        }

        let mut last_seen = self.last_seen.lock();
        match last_seen.get(&beacon.device_id) {
            Some(seen) if *seen >= beacon.timestamp => false,
            _ => {
                last_seen.insert(beacon.device_id.clone(), beacon.timestamp);
                true
            }
        }
    }

    /// Read the slot file once. Stale, foreign or already seen beacons yield `None`.
    pub async fn poll_slot(&self) -> Option<TapBeacon> {
        let raw = match tokio::fs::read(&self.slot).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read sync slot {:?}: {}", self.slot, e);
                return None;
            }
        };

        let beacon: TapBeacon = match serde_json::from_slice(&raw) {
            Ok(beacon) => beacon,
            Err(e) => {
                tracing::warn!("Ignoring malformed sync slot: {}", e);
                return None;
            }
        };

        if is_stale(&beacon, Utc::now()) {
            return None;
        }

        self.accept(&beacon).then_some(beacon)
    }

    /// Feed accepted beacons from both transports to `on_beacon`. Runs until
    /// the future is dropped.
    pub async fn run(&self, mut on_beacon: impl FnMut(TapBeacon)) {
        let mut rx = self.channel.subscribe();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        tracing::info!(
            "Display sync running in room '{}' as {}",
            self.room,
            self.device_id
        );

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(beacon) => {
                        if self.accept(&beacon) {
                            on_beacon(beacon);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!("Display sync skipped {} beacon(s)", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => {
                    if let Some(beacon) = self.poll_slot().await {
                        on_beacon(beacon);
                    }
                }
            }
        }
    }
}

fn is_stale(beacon: &TapBeacon, now: DateTime<Utc>) -> bool {
    now - beacon.timestamp >= Duration::milliseconds(STALE_AFTER_MS)
}

fn get_or_create_device_id() -> String {
    if let Ok(id) = std::env::var("TAPNAD_DEVICE_ID") {
        id
    } else {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn beacon(device: &str, room: &str, timestamp: DateTime<Utc>) -> TapBeacon {
        TapBeacon {
            bitcoin: 3,
            ethereum: 5,
            timestamp,
            device_id: device.to_string(),
            room: room.to_string(),
        }
    }

    #[test]
    fn test_accept_filters_own_and_foreign_rooms() {
        let dir = tempdir().unwrap();
        let sync = DisplaySync::new(dir.path(), DEFAULT_ROOM).with_device_id("me");
        let now = Utc::now();

        assert!(!sync.accept(&beacon("me", DEFAULT_ROOM, now)));
        assert!(!sync.accept(&beacon("peer", "other-room", now)));
        assert!(sync.accept(&beacon("peer", DEFAULT_ROOM, now)));
    }

    #[test]
    fn test_accept_drops_duplicates_and_reordered_beacons() {
        let dir = tempdir().unwrap();
        let sync = DisplaySync::new(dir.path(), DEFAULT_ROOM).with_device_id("me");
        let now = Utc::now();

        assert!(sync.accept(&beacon("peer", DEFAULT_ROOM, now)));
        assert!(!sync.accept(&beacon("peer", DEFAULT_ROOM, now)));
        assert!(!sync.accept(&beacon("peer", DEFAULT_ROOM, now - Duration::seconds(1))));
        assert!(sync.accept(&beacon("peer", DEFAULT_ROOM, now + Duration::milliseconds(5))));
        assert!(sync.accept(&beacon("other-peer", DEFAULT_ROOM, now)));
    }

    #[test]
    fn test_stale_beacons() {
        let now = Utc::now();
        assert!(!is_stale(&beacon("peer", DEFAULT_ROOM, now), now));
        assert!(is_stale(
            &beacon("peer", DEFAULT_ROOM, now - Duration::seconds(3)),
            now
        ));
    }

    #[tokio::test]
    async fn test_slot_carries_beacons_between_devices() {
        let dir = tempdir().unwrap();
        let sender = DisplaySync::new(dir.path(), DEFAULT_ROOM).with_device_id("laptop");
        let watcher = DisplaySync::new(dir.path(), DEFAULT_ROOM).with_device_id("phone");

        assert!(watcher.poll_slot().await.is_none());

        let sent = sender.publish(12, 7).await.unwrap();
        assert_eq!(watcher.poll_slot().await, Some(sent));
        // Already seen.
        assert!(watcher.poll_slot().await.is_none());
        // Own beacon.
        assert!(sender.poll_slot().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_slot_is_ignored() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join(SLOT_FILE), b"not json")
            .await
            .unwrap();

        let watcher = DisplaySync::new(dir.path(), DEFAULT_ROOM).with_device_id("phone");
        assert!(watcher.poll_slot().await.is_none());
    }

    #[tokio::test]
    async fn test_shared_channel_delivers_to_peers() {
        let dir = tempdir().unwrap();
        let sender = DisplaySync::new(dir.path(), DEFAULT_ROOM).with_device_id("tab-1");
        let watcher = DisplaySync::with_channel(dir.path(), DEFAULT_ROOM, sender.channel())
            .with_device_id("tab-2");

        let mut rx = watcher.channel().subscribe();
        let sent = sender.publish(1, 2).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, sent);
        assert!(watcher.accept(&received));
    }
}
