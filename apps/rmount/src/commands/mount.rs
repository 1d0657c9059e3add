use anyhow::{Result, bail};
use colored::Colorize;
use rmount_core::{MountEvent, MountRecord, RmountError, detect_platform};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub async fn execute(config: Option<PathBuf>, mountpoints: Vec<PathBuf>, all: bool) -> Result<()> {
    let settings = super::load_settings(config)?;

    let records: Vec<MountRecord> = if all {
        settings.list().to_vec()
    } else {
        mountpoints
            .iter()
            .map(|m| {
                let mountpoint = super::absolute_mountpoint(m)?;
                settings
                    .get(&mountpoint)
                    .cloned()
                    .ok_or_else(|| RmountError::MountpointNotConfigured { mountpoint }.into())
            })
            .collect::<Result<_>>()?
    };

    if records.is_empty() {
        println!("No mounts configured");
        return Ok(());
    }

    let platform = detect_platform();
    platform.ensure_can_mount()?;
    if !platform.fuse_available {
        eprintln!(
            "{} no FUSE device found, mounts will likely fail",
            "Warning:".yellow()
        );
    }

    let supervisor = super::supervisor_on(&settings, &platform);
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, MountEvent)>();
    let mut running = 0usize;

    for record in &records {
        if supervisor.probe().is_mounted(&record.mountpoint).await? {
            println!(
                "{} {} is already mounted, skipping",
                "Note:".yellow(),
                record.mountpoint.display()
            );
            continue;
        }

        let controller = supervisor.controller_for_record(record);
        let mut events = controller.subscribe();
        if !controller.start() {
            warn!("Could not start {}", record.mountpoint.display());
            continue;
        }
        running += 1;

        let tx = tx.clone();
        let name = record.display_name().to_string();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let done = matches!(event, MountEvent::Unmounted { .. });
                        if tx.send((name.clone(), event)).is_err() || done {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Dropped {} notifications for {}", skipped, name);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
    drop(tx);

    if running == 0 {
        bail!("No mount was started");
    }

    let mut failed = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while running > 0 {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("{}", "Interrupted, unmounting...".yellow());
                break;
            }
            received = rx.recv() => {
                let Some((name, event)) = received else { break };
                match event {
                    MountEvent::Started { mountpoint } => {
                        println!("{} {} on {}", "Starting".cyan(), name, mountpoint.display());
                    }
                    MountEvent::Mounted { mountpoint } => {
                        println!("{} {} on {}", "Mounted".green(), name, mountpoint.display());
                    }
                    MountEvent::Unmounted { mountpoint, exit_code, error_output } => {
                        running -= 1;
                        if exit_code == 0 {
                            println!("{} {} from {}", "Unmounted".yellow(), name, mountpoint.display());
                        } else {
                            failed += 1;
                            eprintln!(
                                "{} {} on {} stopped with code {}",
                                "Error:".red(),
                                name,
                                mountpoint.display(),
                                exit_code
                            );
                            let stderr = String::from_utf8_lossy(&error_output);
                            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                                eprintln!("  {line}");
                            }
                        }
                    }
                }
            }
        }
    }

    for (mountpoint, result) in supervisor.shutdown().await {
        if let Err(e) = result {
            failed += 1;
            eprintln!("{} {}: {}", "Error:".red(), mountpoint.display(), e);
        }
    }

    if failed > 0 {
        bail!("{failed} mount(s) failed");
    }
    Ok(())
}
