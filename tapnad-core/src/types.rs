use crate::error::{RaceError, Result, TapnadError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address-like player identifier.
///
/// Stored trimmed and lowercased so `0xABC..` and `0xabc..` name the same
/// player. Identifiers with a `0x` prefix must be valid hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim().to_lowercase();

        if id.is_empty() {
            return Err(TapnadError::invalid_player("identifier cannot be empty"));
        }

        if id.chars().any(char::is_whitespace) {
            return Err(TapnadError::invalid_player(format!(
                "'{}' contains whitespace",
                id
            )));
        }

        if let Some(digits) = id.strip_prefix("0x") {
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(TapnadError::invalid_player(format!(
                    "'{}' is not a valid hex address",
                    id
                )));
            }
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for display, e.g. `0x9a00…256f`.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return self.0.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = TapnadError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl FromStr for PlayerId {
    type Err = TapnadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The two competing teams. The index matches the coin id used by clients
/// (Bitcoin = 0, Ethereum = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Bitcoin,
    Ethereum,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Bitcoin, Team::Ethereum];

    pub fn index(self) -> usize {
        match self {
            Team::Bitcoin => 0,
            Team::Ethereum => 1,
        }
    }

    pub fn from_index(index: u8) -> std::result::Result<Self, RaceError> {
        match index {
            0 => Ok(Team::Bitcoin),
            1 => Ok(Team::Ethereum),
            other => Err(RaceError::InvalidTeam(other.to_string())),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Team::Bitcoin => "₿",
            Team::Ethereum => "Ξ",
        }
    }

    pub fn rival(self) -> Self {
        match self {
            Team::Bitcoin => Team::Ethereum,
            Team::Ethereum => Team::Bitcoin,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Bitcoin => f.write_str("Bitcoin"),
            Team::Ethereum => f.write_str("Ethereum"),
        }
    }
}

impl FromStr for Team {
    type Err = RaceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bitcoin" | "btc" | "0" => Ok(Team::Bitcoin),
            "ethereum" | "eth" | "1" => Ok(Team::Ethereum),
            _ => Err(RaceError::InvalidTeam(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RaceStatus {
    #[default]
    Lobby,
    InProgress,
    Finished,
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceStatus::Lobby => f.write_str("Lobby"),
            RaceStatus::InProgress => f.write_str("In progress"),
            RaceStatus::Finished => f.write_str("Finished"),
        }
    }
}

/// A team's place on the track: completed laps plus units into the current lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub lap: u64,
    pub position: u64,
}

/// Notifications emitted by accepted race operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RaceEvent {
    PlayerJoined {
        player: PlayerId,
        team: Team,
    },
    GameStarted {
        started_at: DateTime<Utc>,
    },
    GameFinished {
        winner: Team,
        duration_secs: u64,
    },
    GameReset,
}

impl RaceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RaceEvent::PlayerJoined { .. } => "PlayerJoined",
            RaceEvent::GameStarted { .. } => "GameStarted",
            RaceEvent::GameFinished { .. } => "GameFinished",
            RaceEvent::GameReset => "GameReset",
        }
    }
}

impl fmt::Display for RaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceEvent::PlayerJoined { player, team } => {
                write!(f, "{} joined Team {}", player, team)
            }
            RaceEvent::GameStarted { started_at } => {
                write!(f, "Race started at {}", started_at.format("%Y-%m-%d %H:%M:%S"))
            }
            RaceEvent::GameFinished {
                winner,
                duration_secs,
            } => write!(f, "Team {} won in {}s", winner, duration_secs),
            RaceEvent::GameReset => f.write_str("Race reset to lobby"),
        }
    }
}
