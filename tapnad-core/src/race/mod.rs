//! The authoritative tap race state machine.
//!
//! A [`Race`] moves through `Lobby -> InProgress -> Finished -> Lobby`.
//! Every operation checks its preconditions before touching any field, so a
//! rejected call leaves the race exactly as it was.

pub mod clock;
pub mod scoring;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scoring::ScoringRules;

use crate::config::RaceConfig;
use crate::error::{RaceError, RaceResult, Result};
use crate::types::{PlayerId, Progress, RaceEvent, RaceStatus, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TeamRecord {
    supporters: Vec<PlayerId>,
    total_taps: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PlayerRecord {
    team: Team,
    tap_count: u64,
}

/// Read-only view of one team, for rendering rosters and progress bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team: Team,
    pub supporters: Vec<PlayerId>,
    pub total_taps: u64,
    pub progress: Progress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    config: RaceConfig,
    status: RaceStatus,
    started_at: Option<DateTime<Utc>>,
    winner: Option<Team>,
    teams: [TeamRecord; 2],
    players: HashMap<PlayerId, PlayerRecord>,
    #[serde(skip, default = "clock::system_clock")]
    clock: Arc<dyn Clock>,
}

impl Race {
    pub fn new(config: RaceConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            status: RaceStatus::Lobby,
            started_at: None,
            winner: None,
            teams: Default::default(),
            players: HashMap::new(),
            clock: clock::system_clock(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Replace the configuration. Scoring may only change in the lobby.
    pub fn reconfigure(&mut self, config: RaceConfig) -> Result<()> {
        config.validate()?;

        if config.scoring != self.config.scoring && self.status != RaceStatus::Lobby {
            return Err(RaceError::invalid_state("scoring can only change in the lobby").into());
        }

        self.config = config;
        tracing::info!(
            "Race reconfigured with {} organizer(s)",
            self.config.organizers.len()
        );
        Ok(())
    }

    pub fn join_team(&mut self, player: PlayerId, team: Team) -> RaceResult<RaceEvent> {
        if self.status != RaceStatus::Lobby {
            return Err(RaceError::invalid_state(format!(
                "cannot join while race is {}",
                self.status
            )));
        }

        if self.players.contains_key(&player) {
            return Err(RaceError::AlreadyJoined(player.to_string()));
        }

        let record = &mut self.teams[team.index()];
        if !record.supporters.contains(&player) {
            record.supporters.push(player.clone());
        }
        self.players.insert(
            player.clone(),
            PlayerRecord {
                team,
                tap_count: 0,
            },
        );

        tracing::info!("Player {} joined Team {}", player, team);
        Ok(RaceEvent::PlayerJoined { player, team })
    }

    /// Join using an untyped team name or coin id.
    pub fn join_team_by_name(&mut self, player: PlayerId, team: &str) -> RaceResult<RaceEvent> {
        let team = team.parse::<Team>()?;
        self.join_team(player, team)
    }

    pub fn start_race(&mut self, caller: &PlayerId) -> RaceResult<RaceEvent> {
        if !self.is_organizer(caller) {
            return Err(RaceError::Unauthorized(caller.to_string()));
        }

        if self.status != RaceStatus::Lobby {
            return Err(RaceError::invalid_state(format!(
                "cannot start while race is {}",
                self.status
            )));
        }

        if !self.can_start() {
            return Err(RaceError::InsufficientPlayers);
        }

        let started_at = self.clock.now();
        self.status = RaceStatus::InProgress;
        self.started_at = Some(started_at);

        tracing::info!(
            "Race started by {} ({} vs {} supporters)",
            caller,
            self.supporter_count(Team::Bitcoin),
            self.supporter_count(Team::Ethereum)
        );
        Ok(RaceEvent::GameStarted { started_at })
    }

    /// Record one tap. Returns the finish event when this tap wins the race.
    pub fn tap(&mut self, player: &PlayerId) -> RaceResult<Option<RaceEvent>> {
        if self.status != RaceStatus::InProgress {
            return Err(RaceError::invalid_state(format!(
                "cannot tap while race is {}",
                self.status
            )));
        }

        let record = self
            .players
            .get_mut(player)
            .ok_or_else(|| RaceError::NotJoined(player.to_string()))?;

        record.tap_count += 1;
        let team = record.team;
        let team_record = &mut self.teams[team.index()];
        team_record.total_taps += 1;

        tracing::debug!(
            "Player {} tapped for Team {} ({} total)",
            player,
            team,
            team_record.total_taps
        );

        if !self
            .config
            .scoring
            .has_finished(team_record.total_taps, team_record.supporters.len())
        {
            return Ok(None);
        }

        let finished_at = self.clock.now();
        let duration_secs = self
            .started_at
            .map(|started| (finished_at - started).num_seconds().max(0) as u64)
            .unwrap_or_default();

        self.status = RaceStatus::Finished;
        self.winner = Some(team);

        tracing::info!("Race finished. Team {} wins after {}s", team, duration_secs);
        Ok(Some(RaceEvent::GameFinished {
            winner: team,
            duration_secs,
        }))
    }

    /// Clear every player and tap and return to the lobby, from any status.
    pub fn reset_race(&mut self, caller: &PlayerId) -> RaceResult<RaceEvent> {
        if !self.is_organizer(caller) {
            return Err(RaceError::Unauthorized(caller.to_string()));
        }

        if self.status == RaceStatus::InProgress {
            tracing::warn!("Discarding unfinished race on reset by {}", caller);
        }

        self.status = RaceStatus::Lobby;
        self.started_at = None;
        self.winner = None;
        self.teams = Default::default();
        self.players.clear();

        tracing::info!("Race reset by {}", caller);
        Ok(RaceEvent::GameReset)
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Team> {
        self.winner
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn supporter_count(&self, team: Team) -> usize {
        self.teams[team.index()].supporters.len()
    }

    pub fn supporters(&self, team: Team) -> &[PlayerId] {
        &self.teams[team.index()].supporters
    }

    pub fn total_taps(&self, team: Team) -> u64 {
        self.teams[team.index()].total_taps
    }

    pub fn player_team(&self, player: &PlayerId) -> Option<Team> {
        self.players.get(player).map(|p| p.team)
    }

    pub fn player_taps(&self, player: &PlayerId) -> u64 {
        self.players.get(player).map_or(0, |p| p.tap_count)
    }

    pub fn has_joined(&self, player: &PlayerId) -> bool {
        self.players.contains_key(player)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn progress(&self, team: Team) -> Progress {
        let record = &self.teams[team.index()];
        self.config
            .scoring
            .progress(record.total_taps, record.supporters.len())
    }

    pub fn is_organizer(&self, id: &PlayerId) -> bool {
        self.config.is_organizer(id)
    }

    pub fn can_start(&self) -> bool {
        Team::ALL.iter().all(|&team| self.supporter_count(team) > 0)
    }

    pub fn team_summary(&self, team: Team) -> TeamSummary {
        TeamSummary {
            team,
            supporters: self.supporters(team).to_vec(),
            total_taps: self.total_taps(team),
            progress: self.progress(team),
        }
    }
}
