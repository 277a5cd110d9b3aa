use super::RaceHost;
use dialoguer::Confirm;
use tapnad_core::{
    DisplaySync, PlayerId, RaceError, RaceEvent, RaceStatus, Result, TapnadError, Team,
};

pub async fn join(host: &RaceHost, player: &str, team: &str) -> Result<()> {
    let player = PlayerId::parse(player)?;
    let team = team.parse::<Team>()?;

    let service = host.spawn_service().await?;
    let outcome = service.join_team(player.clone(), team).await;
    let race = host.persist(service, outcome.as_ref().ok().cloned()).await?;
    outcome?;

    println!("{} joined Team {} {}", player, team, team.symbol());
    println!(
        "Supporters: ₿ {}  Ξ {}",
        race.supporter_count(Team::Bitcoin),
        race.supporter_count(Team::Ethereum)
    );
    if !race.can_start() {
        println!("Waiting for players on both teams...");
    }

    Ok(())
}

pub async fn start(host: &RaceHost, caller: &str) -> Result<()> {
    let caller = PlayerId::parse(caller)?;

    let service = host.spawn_service().await?;
    let outcome = service.start_race(caller).await;
    let race = host.persist(service, outcome.as_ref().ok().cloned()).await?;
    outcome?;

    println!("Race started!");
    println!(
        "Team Bitcoin ({}) vs Team Ethereum ({})",
        race.supporter_count(Team::Bitcoin),
        race.supporter_count(Team::Ethereum)
    );
    println!(
        "First team to complete {} laps wins. Tap fast!",
        race.config().scoring.laps_to_win
    );

    Ok(())
}

pub async fn tap(host: &RaceHost, player: &str, count: u32) -> Result<()> {
    let player = PlayerId::parse(player)?;
    let service = host.spawn_service().await?;

    let mut accepted = 0u32;
    let mut events = Vec::new();
    let mut failure = None;

    for _ in 0..count.max(1) {
        match service.tap(player.clone()).await {
            Ok(None) => accepted += 1,
            Ok(Some(finish)) => {
                accepted += 1;
                events.push(finish);
                break;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let race = host.persist(service, events.clone()).await?;

    if accepted > 0 {
        let sync = DisplaySync::new(host.data_dir(), host.config().room.clone());
        if let Err(e) = sync
            .publish(
                race.total_taps(Team::Bitcoin),
                race.total_taps(Team::Ethereum),
            )
            .await
        {
            tracing::warn!("Display sync publish failed: {}", e);
        }

        println!(
            "{} tapped {} time(s). Your taps: {}",
            player,
            accepted,
            race.player_taps(&player)
        );
        if let Some(team) = race.player_team(&player) {
            let progress = race.progress(team);
            println!(
                "Team {}: lap {} / {}, {}%",
                team,
                (progress.lap + 1).min(race.config().scoring.laps_to_win),
                race.config().scoring.laps_to_win,
                progress.position * 100 / race.config().scoring.units_per_lap
            );
        }
    }

    for event in &events {
        if let RaceEvent::GameFinished {
            winner,
            duration_secs,
        } = event
        {
            println!("🏁 Team {} {} wins in {}s!", winner, winner.symbol(), duration_secs);
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub async fn reset(host: &RaceHost, caller: &str, yes: bool) -> Result<()> {
    let caller = PlayerId::parse(caller)?;
    let race = host.load_race().await?;

    if !race.is_organizer(&caller) {
        return Err(RaceError::Unauthorized(caller.to_string()).into());
    }

    if !yes && race.status() == RaceStatus::InProgress {
        let confirmed = Confirm::new()
            .with_prompt("A race is in progress. Discard it and return to the lobby?")
            .default(false)
            .interact()
            .map_err(|e| TapnadError::internal(format!("Confirmation failed: {}", e)))?;

        if !confirmed {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let service = host.spawn_service().await?;
    let outcome = service.reset_race(caller).await;
    host.persist(service, outcome.as_ref().ok().cloned()).await?;
    outcome?;

    println!("Race reset. Ready for a new race, join your team again!");
    Ok(())
}
