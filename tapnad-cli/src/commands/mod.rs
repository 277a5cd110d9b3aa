pub mod organizer;
pub mod query;
pub mod race;
pub mod sync;

pub use organizer::{handle_organizer_command, OrganizerCommands};

use crate::config::CliConfig;
use std::path::{Path, PathBuf};
use tapnad_core::{
    Race, RaceEvent, RaceService, RaceStatus, RaceStore, Result, Storage,
};

/// The CLI's view of the authoritative race: config plus SQLite storage.
pub struct RaceHost {
    data_dir: PathBuf,
    config: CliConfig,
    storage: Storage,
}

impl RaceHost {
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let config = CliConfig::load(data_dir)?;
        let storage = Storage::new(&data_dir.join("tapnad.db")).await?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config,
            storage,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn store(&self) -> RaceStore<'_> {
        RaceStore::new(&self.storage)
    }

    /// Stored race with the current organizers applied, or a fresh lobby.
    ///
    /// Scoring edits only reach a race in the lobby. A running or finished
    /// race keeps its rules until it is reset.
    pub async fn load_race(&self) -> Result<Race> {
        let mut config = self.config.race_config();

        match self.store().load_race().await? {
            Some(mut race) => {
                let current = race.config().scoring;
                if config.scoring != current && race.status() != RaceStatus::Lobby {
                    tracing::warn!(
                        "Race is {}, new scoring applies after the next reset",
                        race.status()
                    );
                    config.scoring = current;
                }

                if race.config() != &config {
                    race.reconfigure(config)?;
                }
                Ok(race)
            }
            None => {
                tracing::info!("No stored race, opening a fresh lobby");
                Race::new(config)
            }
        }
    }

    /// Take the race write lock and host the stored race. The lock is held
    /// until `persist`, so overlapping invocations apply in turn.
    pub async fn spawn_service(&self) -> Result<RaceService> {
        self.storage.begin_exclusive().await?;

        match self.load_race().await {
            Ok(race) => Ok(RaceService::spawn(race)),
            Err(e) => {
                self.release().await;
                Err(e)
            }
        }
    }

    /// Stop `service`, write its race and the accepted events back, and
    /// release the write lock.
    pub async fn persist(
        &self,
        service: RaceService,
        events: impl IntoIterator<Item = RaceEvent>,
    ) -> Result<Race> {
        let events: Vec<RaceEvent> = events.into_iter().collect();

        match self.write_back(service, &events).await {
            Ok(race) => {
                self.storage.commit().await?;
                Ok(race)
            }
            Err(e) => {
                self.release().await;
                Err(e)
            }
        }
    }

    async fn write_back(&self, service: RaceService, events: &[RaceEvent]) -> Result<Race> {
        let race = service.shutdown().await?;
        let store = self.store();
        store.save_race(&race).await?;
        store.append_events(events).await?;
        Ok(race)
    }

    async fn release(&self) {
        if let Err(e) = self.storage.rollback().await {
            tracing::warn!("Failed to release race write lock: {}", e);
        }
    }
}
