use crate::error::{Result, TapnadError};
use crate::race::ScoringRules;
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};

/// Organizer of the public demo race.
pub const DEMO_ORGANIZER: &str = "0x9A00D0828743a8D94D995FC6e5A6BF50B71f256F";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Identities allowed to start and reset a race.
    pub organizers: Vec<PlayerId>,
    #[serde(default)]
    pub scoring: ScoringRules,
}

impl RaceConfig {
    pub fn new(organizers: Vec<PlayerId>) -> Self {
        Self {
            organizers,
            scoring: ScoringRules::default(),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringRules) -> Self {
        self.scoring = scoring;
        self
    }

    /// Config with the demo organizer and default scoring.
    pub fn demo() -> Result<Self> {
        Ok(Self::new(vec![PlayerId::parse(DEMO_ORGANIZER)?]))
    }

    pub fn is_organizer(&self, id: &PlayerId) -> bool {
        self.organizers.contains(id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.organizers.is_empty() {
            return Err(TapnadError::config("at least one organizer is required"));
        }

        self.scoring.validate()
    }
}
