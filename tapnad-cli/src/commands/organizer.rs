use crate::config::CliConfig;
use clap::Subcommand;
use std::path::Path;
use tapnad_core::{PlayerId, Result};

#[derive(Subcommand)]
pub enum OrganizerCommands {
    /// Allow an identity to start and reset races
    Add {
        /// Organizer address
        id: String,
    },
    /// Revoke an organizer
    Remove {
        /// Organizer address
        id: String,
    },
    /// List organizers
    List,
}

pub async fn handle_organizer_command(cmd: OrganizerCommands, data_dir: &Path) -> Result<()> {
    let mut config = CliConfig::load(data_dir)?;

    match cmd {
        OrganizerCommands::Add { id } => {
            let id = PlayerId::parse(&id)?;
            if !config.add_organizer(id.clone()) {
                println!("{} is already an organizer", id);
                return Ok(());
            }

            config.save(data_dir)?;
            println!("Added organizer {}", id);
        }

        OrganizerCommands::Remove { id } => {
            let id = PlayerId::parse(&id)?;
            if !config.remove_organizer(&id)? {
                println!("{} is not an organizer", id);
                return Ok(());
            }

            config.save(data_dir)?;
            println!("Removed organizer {}", id);
        }

        OrganizerCommands::List => {
            println!("Organizers:");
            for organizer in &config.organizers {
                println!("  {}", organizer);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_removing_unknown_organizer_leaves_config_untouched() {
        let temp_dir = tempdir().unwrap();

        handle_organizer_command(
            OrganizerCommands::Remove {
                id: "0xcafe".to_string(),
            },
            temp_dir.path(),
        )
        .await
        .unwrap();

        assert!(!temp_dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_added_organizer_is_saved() {
        let temp_dir = tempdir().unwrap();

        handle_organizer_command(
            OrganizerCommands::Add {
                id: "0xBEEF".to_string(),
            },
            temp_dir.path(),
        )
        .await
        .unwrap();

        let config = CliConfig::load(temp_dir.path()).unwrap();
        assert!(config.organizers.contains(&PlayerId::parse("0xbeef").unwrap()));
    }
}
