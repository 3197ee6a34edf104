//! `garagelink run`: one sync engine per configured door until a shutdown
//! signal arrives.

use tracing::info;

use garagelink_core::{EngineHandle, GenieDoor, LocalSwitch, SyncEngine};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let (client, credentials) = super::connect(&cfg)?;
    let sync = cfg.sync_config();

    // Build every engine before spawning any, so a bad door entry never
    // leaves a half-started bridge behind.
    let mut engines = Vec::new();
    for door in cfg.doors() {
        let remote = GenieDoor::new(client.clone(), credentials.clone(), door.clone())?;
        let switch = LocalSwitch::new(door.name.clone(), false);
        mirror(&switch);
        engines.push(SyncEngine::new(door, remote, switch, sync.clone())?);
    }

    let handles: Vec<EngineHandle> = engines.into_iter().map(SyncEngine::spawn).collect();
    info!(doors = handles.len(), "garagelink running; press Ctrl-C to stop");

    shutdown_signal().await?;
    info!("shutdown requested");

    for handle in handles {
        handle.shutdown().await;
    }
    Ok(())
}

/// Log every switch transition, whichever side made it. Ends when the
/// switch is dropped with its engine.
fn mirror(switch: &LocalSwitch) {
    let label = switch.label().to_owned();
    let mut values = switch.watch();
    tokio::spawn(async move {
        while values.changed().await.is_ok() {
            let on = *values.borrow_and_update();
            info!(door = %label, value = if on { "on" } else { "off" }, "switch changed");
        }
    });
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> Result<(), CliError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
