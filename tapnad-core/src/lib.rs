//! Tapnad - Bitcoin vs Ethereum tap race
//!
//! This library holds the authoritative race state machine, a single-writer
//! service to host it, SQLite persistence for the race and its event ledger,
//! and a best-effort display sync layer for clients.

pub mod config;
pub mod error;
pub mod race;
pub mod service;
pub mod storage;
pub mod sync;
pub mod types;

pub use config::RaceConfig;
pub use error::{RaceError, RaceResult, Result, TapnadError};
pub use race::{Race, ScoringRules, TeamSummary};
pub use service::RaceService;
pub use storage::{RaceStore, Storage};
pub use sync::{DisplaySync, TapBeacon};
pub use types::{PlayerId, Progress, RaceEvent, RaceStatus, Team};
