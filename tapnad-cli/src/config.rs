use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tapnad_core::sync::DEFAULT_ROOM;
use tapnad_core::{PlayerId, RaceConfig, Result, ScoringRules};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub organizers: Vec<PlayerId>,
    #[serde(default)]
    pub scoring: ScoringRules,
    #[serde(default = "default_room")]
    pub room: String,
}

fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}

impl CliConfig {
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tapnad")
    }

    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Load the config from `data_dir`, falling back to the demo organizer.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            let demo = RaceConfig::demo()?;
            return Ok(Self {
                organizers: demo.organizers,
                scoring: demo.scoring,
                room: default_room(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(data_dir), content)?;
        Ok(())
    }

    pub fn race_config(&self) -> RaceConfig {
        RaceConfig::new(self.organizers.clone()).with_scoring(self.scoring)
    }

    /// Returns false if `id` was already an organizer.
    pub fn add_organizer(&mut self, id: PlayerId) -> bool {
        if self.organizers.contains(&id) {
            return false;
        }
        self.organizers.push(id);
        true
    }

    /// Returns false if `id` was not an organizer. The last organizer cannot
    /// be removed.
    pub fn remove_organizer(&mut self, id: &PlayerId) -> Result<bool> {
        let before = self.organizers.len();
        let remaining: Vec<PlayerId> = self
            .organizers
            .iter()
            .filter(|o| *o != id)
            .cloned()
            .collect();

        if remaining.len() == before {
            return Ok(false);
        }

        let candidate = RaceConfig::new(remaining);
        candidate.validate()?;
        self.organizers = candidate.organizers;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapnad_core::config::DEMO_ORGANIZER;
    use tapnad_core::TapnadError;
    use tempfile::tempdir;

    fn id(raw: &str) -> PlayerId {
        PlayerId::parse(raw).unwrap()
    }

    #[test]
    fn test_missing_config_falls_back_to_demo() {
        let temp_dir = tempdir().unwrap();
        let config = CliConfig::load(temp_dir.path()).unwrap();

        assert_eq!(config.organizers, vec![id(DEMO_ORGANIZER)]);
        assert_eq!(config.room, DEFAULT_ROOM);
    }

    #[test]
    fn test_organizer_edits() {
        let temp_dir = tempdir().unwrap();
        let mut config = CliConfig::load(temp_dir.path()).unwrap();

        assert!(config.add_organizer(id("0xbeef")));
        assert!(!config.add_organizer(id("0xBEEF")));
        assert!(!config.remove_organizer(&id("0xcafe")).unwrap());
        assert_eq!(config.organizers.len(), 2);

        assert!(config.remove_organizer(&id(DEMO_ORGANIZER)).unwrap());
        config.save(temp_dir.path()).unwrap();

        let reloaded = CliConfig::load(temp_dir.path()).unwrap();
        assert_eq!(reloaded.organizers, vec![id("0xbeef")]);
    }

    #[test]
    fn test_last_organizer_cannot_be_removed() {
        let temp_dir = tempdir().unwrap();
        let mut config = CliConfig::load(temp_dir.path()).unwrap();

        assert!(matches!(
            config.remove_organizer(&id(DEMO_ORGANIZER)),
            Err(TapnadError::Config(_))
        ));
        assert_eq!(config.organizers, vec![id(DEMO_ORGANIZER)]);
    }
}
