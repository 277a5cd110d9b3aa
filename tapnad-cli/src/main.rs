mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::RaceHost;
use config::CliConfig;
use std::path::{Path, PathBuf};
use tapnad_core::{RaceError, Result, TapnadError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tapnad")]
#[command(about = "Tapnad - Bitcoin vs Ethereum tap race")]
#[command(version)]
struct Cli {
    /// Data directory for race storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Organizer management
    #[command(subcommand)]
    Organizer(commands::OrganizerCommands),
    #[command(flatten)]
    Race(RaceCommands),
}

/// Commands that open the race database.
#[derive(Subcommand)]
enum RaceCommands {
    /// Join a team in the lobby
    Join {
        /// Player address
        player: String,
        /// Team (bitcoin/btc/0 or ethereum/eth/1)
        team: String,
    },
    /// Start the race (organizer only)
    Start {
        /// Organizer address
        caller: String,
    },
    /// Tap for your team
    Tap {
        /// Player address
        player: String,
        /// Number of taps to send
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Reset the race back to the lobby (organizer only)
    Reset {
        /// Organizer address
        caller: String,
        /// Skip confirmation when a race is in progress
        #[arg(short, long)]
        yes: bool,
    },
    /// Show race status and team progress
    Status,
    /// Show a team's roster
    Team {
        /// Team (bitcoin or ethereum)
        team: String,
    },
    /// Show a player's team and taps
    Player {
        /// Player address
        player: String,
    },
    /// Show the event ledger
    Events {
        /// Number of recent events to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Share team totals with other displays (best effort)
    Broadcast {
        /// Bitcoin taps
        bitcoin: u64,
        /// Ethereum taps
        ethereum: u64,
    },
    /// Print totals shared by other displays
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "tapnad={},tapnad_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(CliConfig::default_data_dir);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    // Execute command
    let result = match cli.command {
        // Organizer edits only touch the config file
        Commands::Organizer(cmd) => commands::handle_organizer_command(cmd, &data_dir).await,
        Commands::Race(command) => run(command, &data_dir).await,
    };

    if let Err(e) = result {
        report(e);
    }

    Ok(())
}

async fn run(command: RaceCommands, data_dir: &Path) -> Result<()> {
    let host = RaceHost::open(data_dir).await?;

    match command {
        RaceCommands::Join { player, team } => commands::race::join(&host, &player, &team).await,
        RaceCommands::Start { caller } => commands::race::start(&host, &caller).await,
        RaceCommands::Tap { player, count } => commands::race::tap(&host, &player, count).await,
        RaceCommands::Reset { caller, yes } => commands::race::reset(&host, &caller, yes).await,
        RaceCommands::Status => commands::query::show_status(&host).await,
        RaceCommands::Team { team } => commands::query::show_team(&host, &team).await,
        RaceCommands::Player { player } => commands::query::show_player(&host, &player).await,
        RaceCommands::Events { limit } => commands::query::list_events(&host, limit).await,
        RaceCommands::Broadcast { bitcoin, ethereum } => {
            commands::sync::broadcast(&host, bitcoin, ethereum).await
        }
        RaceCommands::Watch => commands::sync::watch(&host).await,
    }
}

fn report(e: TapnadError) -> ! {
    match e {
        TapnadError::Race(RaceError::Unauthorized(caller)) => {
            eprintln!("Error: {} is not an organizer", caller);
            eprintln!("Only an organizer may start or reset the race");
            eprintln!("Use 'tapnad organizer list' to see organizers");
        }
        TapnadError::Race(RaceError::InsufficientPlayers) => {
            eprintln!("Error: Need players on both teams before starting");
        }
        TapnadError::Race(RaceError::AlreadyJoined(player)) => {
            eprintln!("Error: {} already joined a team for this race", player);
        }
        TapnadError::Race(RaceError::NotJoined(player)) => {
            eprintln!("Error: {} must join a team first", player);
        }
        TapnadError::Race(RaceError::InvalidTeam(team)) => {
            eprintln!("Error: Unknown team '{}'", team);
            eprintln!("Choose bitcoin (btc) or ethereum (eth)");
        }
        TapnadError::Race(RaceError::InvalidState(reason)) => {
            eprintln!("Error: {}", reason);
            eprintln!("Use 'tapnad status' to see the current race");
        }
        _ => {
            eprintln!("Error: {}", e);
        }
    }
    std::process::exit(1);
}
