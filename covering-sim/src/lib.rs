use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use covering_core::{
    ActuatorOutput, AttributeChange, CoveringHandle, MemoryAttributeStore, PwmDevice, Settings,
    Snapshot, spawn,
};

use crate::console::{ConsoleInput, HELP};

pub mod console;

const LIFT_CHANNEL: u32 = 0;
const TILT_CHANNEL: u32 = 1;

pub async fn run(settings: &Arc<Settings>) -> anyhow::Result<()> {
    let store = MemoryAttributeStore::from_settings(settings)?;
    let changes = store.subscribe();

    let lift_output = PwmDevice::new(
        LIFT_CHANNEL,
        settings.lift.actuator_min,
        settings.lift.actuator_max,
    )?;
    let tilt_output = settings
        .tilt
        .as_ref()
        .map(|tilt| PwmDevice::new(TILT_CHANNEL, tilt.actuator_min, tilt.actuator_max))
        .transpose()?
        .map(|output| Box::new(output) as Box<dyn ActuatorOutput>);

    let (handle, worker) = spawn(settings, store, Box::new(lift_output), tilt_output)?;
    tokio::spawn(log_changes(changes));

    tracing::info!("Window covering simulator ready, type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&handle, &line).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    drop(handle);
    let covering = worker.await?;
    print_snapshot(&covering.snapshot());

    Ok(())
}

/// Returns `false` once the console asks to quit.
async fn handle_line(handle: &CoveringHandle, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    match line.parse::<ConsoleInput>() {
        Ok(ConsoleInput::Command(command)) => {
            if let Err(e) = handle.post(command) {
                tracing::error!("Command not accepted: {e}");
            }
        }
        Ok(ConsoleInput::Status) => match handle.snapshot().await {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(e) => tracing::error!("Status unavailable: {e}"),
        },
        Ok(ConsoleInput::Help) => println!("{HELP}"),
        Ok(ConsoleInput::Quit) => return false,
        Err(e) => println!("{e}"),
    }

    true
}

async fn log_changes(mut changes: broadcast::Receiver<AttributeChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => tracing::info!("{change}"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Change feed lagged, {skipped} updates skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "active axis: {}, status: {} (0x{:02x})",
        snapshot.active_axis,
        snapshot.status,
        snapshot.status.pack()
    );

    for axis in std::iter::once(&snapshot.lift).chain(snapshot.tilt.as_ref()) {
        let show = |value: Option<_>| value.map_or("unknown".to_string(), |v| format!("{v}"));
        println!(
            "  {}: current {}, target {}, absolute {}, {}",
            axis.axis,
            show(axis.current),
            show(axis.target),
            axis.absolute.map_or("unknown".to_string(), |v| v.to_string()),
            axis.state
        );
    }
}
