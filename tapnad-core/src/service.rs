//! Single-writer host for a [`Race`].
//!
//! The race lives inside one spawned task. Mutations are queued on an mpsc
//! channel and applied strictly in the order they were accepted; readers get
//! the latest published snapshot through a watch channel and never wait on
//! the writer.

use crate::error::{RaceResult, Result, TapnadError};
use crate::race::Race;
use crate::types::{PlayerId, RaceEvent, Team};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 128;

enum Command {
    Join {
        player: PlayerId,
        team: Team,
        reply: oneshot::Sender<RaceResult<RaceEvent>>,
    },
    Start {
        caller: PlayerId,
        reply: oneshot::Sender<RaceResult<RaceEvent>>,
    },
    Tap {
        player: PlayerId,
        reply: oneshot::Sender<RaceResult<Option<RaceEvent>>>,
    },
    Reset {
        caller: PlayerId,
        reply: oneshot::Sender<RaceResult<RaceEvent>>,
    },
}

pub struct RaceService {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Race>,
    events: broadcast::Sender<RaceEvent>,
    task: JoinHandle<Race>,
}

impl RaceService {
    /// Take ownership of `race` and start the writer task.
    pub fn spawn(race: Race) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot) = watch::channel(race.clone());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let task = tokio::spawn(writer_loop(race, command_rx, snapshot_tx, events.clone()));

        Self {
            commands,
            snapshot,
            events,
            task,
        }
    }

    pub async fn join_team(&self, player: PlayerId, team: Team) -> Result<RaceEvent> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Join {
            player,
            team,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| TapnadError::ServiceStopped)??)
    }

    pub async fn start_race(&self, caller: PlayerId) -> Result<RaceEvent> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { caller, reply }).await?;
        Ok(rx.await.map_err(|_| TapnadError::ServiceStopped)??)
    }

    pub async fn tap(&self, player: PlayerId) -> Result<Option<RaceEvent>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Tap { player, reply }).await?;
        Ok(rx.await.map_err(|_| TapnadError::ServiceStopped)??)
    }

    pub async fn reset_race(&self, caller: PlayerId) -> Result<RaceEvent> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { caller, reply }).await?;
        Ok(rx.await.map_err(|_| TapnadError::ServiceStopped)??)
    }

    /// Latest published state. Any state between two writes may be observed.
    pub fn snapshot(&self) -> Race {
        self.snapshot.borrow().clone()
    }

    /// Run `f` against the latest published state without cloning it.
    pub fn read<T>(&self, f: impl FnOnce(&Race) -> T) -> T {
        f(&self.snapshot.borrow())
    }

    pub fn watch(&self) -> watch::Receiver<Race> {
        self.snapshot.clone()
    }

    /// Observe emitted events. Slow subscribers lag and lose events; the
    /// writer never waits for them.
    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.events.subscribe()
    }

    /// Stop accepting commands and hand back the race once queued commands
    /// have been applied.
    pub async fn shutdown(self) -> Result<Race> {
        drop(self.commands);
        self.task
            .await
            .map_err(|e| TapnadError::internal(format!("race writer task failed: {}", e)))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TapnadError::ServiceStopped)
    }
}

async fn writer_loop(
    mut race: Race,
    mut commands: mpsc::Receiver<Command>,
    snapshot: watch::Sender<Race>,
    events: broadcast::Sender<RaceEvent>,
) -> Race {
    tracing::debug!("Race writer started");

    while let Some(command) = commands.recv().await {
        let applied = match command {
            Command::Join {
                player,
                team,
                reply,
            } => respond(reply, race.join_team(player, team)).map(Some),
            Command::Start { caller, reply } => respond(reply, race.start_race(&caller)).map(Some),
            Command::Tap { player, reply } => respond(reply, race.tap(&player)),
            Command::Reset { caller, reply } => respond(reply, race.reset_race(&caller)).map(Some),
        };

        if let Some(event) = applied {
            snapshot.send_replace(race.clone());
            if let Some(event) = event {
                // No subscribers is fine.
                let _ = events.send(event);
            }
        }
    }

    tracing::debug!("Race writer stopped");
    race
}

/// Deliver `result` to the caller; yields the value when the operation was accepted.
fn respond<T: Clone>(reply: oneshot::Sender<RaceResult<T>>, result: RaceResult<T>) -> Option<T> {
    let accepted = match &result {
        Ok(value) => Some(value.clone()),
        Err(e) => {
            tracing::debug!("Rejected race operation: {}", e);
            None
        }
    };
    // The caller may have gone away; the operation still stands.
    let _ = reply.send(result);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaceConfig;
    use crate::error::RaceError;
    use crate::types::RaceStatus;
    use std::sync::Arc;

    fn id(raw: &str) -> PlayerId {
        PlayerId::parse(raw).unwrap()
    }

    fn spawn_service() -> RaceService {
        let race = Race::new(RaceConfig::new(vec![id("0xabcd")])).unwrap();
        RaceService::spawn(race)
    }

    #[tokio::test]
    async fn test_mutations_publish_snapshots_and_events() {
        let service = spawn_service();
        let mut events = service.subscribe();

        service.join_team(id("alice"), Team::Bitcoin).await.unwrap();
        service.join_team(id("bob"), Team::Ethereum).await.unwrap();
        service.start_race(id("0xabcd")).await.unwrap();
        service.tap(id("alice")).await.unwrap();

        assert_eq!(service.read(|race| race.status()), RaceStatus::InProgress);
        assert_eq!(service.snapshot().player_taps(&id("alice")), 1);

        let kinds: Vec<&str> = [
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
        ]
        .iter()
        .map(RaceEvent::kind)
        .collect();
        assert_eq!(kinds, vec!["PlayerJoined", "PlayerJoined", "GameStarted"]);
    }

    #[tokio::test]
    async fn test_rejections_surface_as_race_errors() {
        let service = spawn_service();
        service.join_team(id("alice"), Team::Bitcoin).await.unwrap();

        let err = service.start_race(id("0xabcd")).await.unwrap_err();
        assert_eq!(err.as_race(), Some(&RaceError::InsufficientPlayers));

        let err = service.join_team(id("alice"), Team::Ethereum).await.unwrap_err();
        assert!(matches!(err.as_race(), Some(RaceError::AlreadyJoined(_))));
        assert_eq!(service.read(|race| race.supporter_count(Team::Ethereum)), 0);
    }

    #[tokio::test]
    async fn test_concurrent_taps_are_serialized() {
        let service = Arc::new(spawn_service());
        service.join_team(id("alice"), Team::Bitcoin).await.unwrap();
        service.join_team(id("bob"), Team::Ethereum).await.unwrap();
        service.start_race(id("0xabcd")).await.unwrap();

        let mut handles = Vec::new();
        for player in ["alice", "bob"] {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let mut finishes = 0;
                for _ in 0..200 {
                    match service.tap(id(player)).await {
                        Ok(Some(_)) => finishes += 1,
                        Ok(None) => {}
                        Err(e) => {
                            assert!(matches!(e.as_race(), Some(RaceError::InvalidState(_))));
                        }
                    }
                }
                finishes
            }));
        }

        let mut finishes = 0;
        for handle in handles {
            finishes += handle.await.unwrap();
        }

        let race = service.snapshot();
        assert_eq!(finishes, 1);
        assert_eq!(race.status(), RaceStatus::Finished);
        let winner = race.winner().unwrap();
        assert_eq!(race.total_taps(winner), 150);
        assert!(race.total_taps(winner.rival()) < 150);
    }

    #[tokio::test]
    async fn test_shutdown_returns_race() {
        let service = spawn_service();
        service.join_team(id("alice"), Team::Bitcoin).await.unwrap();

        let race = service.shutdown().await.unwrap();
        assert!(race.has_joined(&id("alice")));
    }
}
