use super::RaceHost;
use tapnad_core::{DisplaySync, Result};

pub async fn broadcast(host: &RaceHost, bitcoin: u64, ethereum: u64) -> Result<()> {
    let sync = DisplaySync::new(host.data_dir(), host.config().room.clone());
    let beacon = sync.publish(bitcoin, ethereum).await?;

    println!(
        "Broadcast ₿ {} Ξ {} to room '{}' as {}",
        beacon.bitcoin, beacon.ethereum, beacon.room, beacon.device_id
    );
    Ok(())
}

/// Print totals shared by other devices until interrupted. These numbers are
/// display hints only; use `status` for the authoritative race.
pub async fn watch(host: &RaceHost) -> Result<()> {
    let sync = DisplaySync::new(host.data_dir(), host.config().room.clone());

    println!(
        "Watching room '{}' as {} (Ctrl-C to stop)",
        sync.room(),
        sync.device_id()
    );

    tokio::select! {
        _ = sync.run(|beacon| {
            println!(
                "[{}] {}: ₿ {}  Ξ {}",
                beacon.timestamp.format("%H:%M:%S%.3f"),
                beacon.device_id,
                beacon.bitcoin,
                beacon.ethereum
            );
        }) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            println!("Stopped watching");
        }
    }

    Ok(())
}
