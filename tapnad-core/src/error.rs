use thiserror::Error;

pub type Result<T> = std::result::Result<T, TapnadError>;
pub type RaceResult<T> = std::result::Result<T, RaceError>;

/// Rejections raised by the race state machine.
///
/// Every variant is reported before any mutation, so a rejected operation
/// leaves the race untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaceError {
    #[error("Invalid race state: {0}")]
    InvalidState(String),

    #[error("Caller {0} is not an organizer")]
    Unauthorized(String),

    #[error("Player {0} already joined a team")]
    AlreadyJoined(String),

    #[error("Player {0} has not joined a team")]
    NotJoined(String),

    #[error("Unknown team: {0}")]
    InvalidTeam(String),

    #[error("Both teams need at least one supporter to start")]
    InsufficientPlayers,
}

#[derive(Error, Debug)]
pub enum TapnadError {
    #[error(transparent)]
    Race(#[from] RaceError),

    #[error("Invalid player id: {0}")]
    InvalidPlayer(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Stored data is corrupted: {0}")]
    Corrupted(String),

    #[error("Race service has stopped")]
    ServiceStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TapnadError {
    pub fn invalid_player(msg: impl Into<String>) -> Self {
        Self::InvalidPlayer(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The state-machine rejection wrapped by this error, if any.
    pub fn as_race(&self) -> Option<&RaceError> {
        match self {
            Self::Race(err) => Some(err),
            _ => None,
        }
    }
}

impl RaceError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
