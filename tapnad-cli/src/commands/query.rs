use super::RaceHost;
use comfy_table::{presets::UTF8_FULL, Table};
use tapnad_core::{PlayerId, RaceStatus, Result, Team};

pub async fn show_status(host: &RaceHost) -> Result<()> {
    let race = host.load_race().await?;
    let scoring = race.config().scoring;

    println!("Status: {}", race.status());
    if let Some(started_at) = race.started_at() {
        println!("Started: {}", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(winner) = race.winner() {
        println!("Winner: Team {} {}", winner, winner.symbol());
    }
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Team", "Supporters", "Total taps", "Lap", "Position"]);

    for team in Team::ALL {
        let summary = race.team_summary(team);
        table.add_row(vec![
            format!("{} {}", team.symbol(), team),
            summary.supporters.len().to_string(),
            summary.total_taps.to_string(),
            format!("{} / {}", summary.progress.lap, scoring.laps_to_win),
            format!("{} / {}", summary.progress.position, scoring.units_per_lap),
        ]);
    }

    println!("{}", table);

    match race.status() {
        RaceStatus::Lobby if !race.can_start() => println!("Need players on both teams"),
        RaceStatus::Lobby => println!("Ready to start"),
        _ => {}
    }

    Ok(())
}

pub async fn show_team(host: &RaceHost, team: &str) -> Result<()> {
    let team = team.parse::<Team>()?;
    let race = host.load_race().await?;
    let supporters = race.supporters(team);

    println!("Team {} {} ({} supporters)", team, team.symbol(), supporters.len());

    if supporters.is_empty() {
        println!("No players yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Player", "Taps"]);

    for (i, player) in supporters.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            player.short(),
            race.player_taps(player).to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn show_player(host: &RaceHost, player: &str) -> Result<()> {
    let player = PlayerId::parse(player)?;
    let race = host.load_race().await?;

    match race.player_team(&player) {
        Some(team) => {
            println!("Player {} supports Team {} {}", player, team, team.symbol());
            println!("Taps: {}", race.player_taps(&player));
        }
        None => println!("Player {} has not joined a team", player),
    }

    if race.is_organizer(&player) {
        println!("Organizer: yes");
    }

    Ok(())
}

pub async fn list_events(host: &RaceHost, limit: usize) -> Result<()> {
    let events = host.store().recent_events(limit).await?;

    if events.is_empty() {
        println!("No events recorded");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Seq", "Time", "Event", "Details"]);

    for stored in events {
        table.add_row(vec![
            stored.seq.to_string(),
            stored.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            stored.event.kind().to_string(),
            stored.event.to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}
