use anyhow::Result;
use colored::Colorize;
use rmount_core::{MountProbe, SystemMountTable};
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>, detailed: bool) -> Result<()> {
    let settings = super::load_settings(config)?;

    if settings.list().is_empty() {
        println!("No mounts configured");
        println!("\nAdd mounts with:");
        println!("  {}", "rmount add <connection> <mountpoint>".cyan());
        return Ok(());
    }

    let probe = SystemMountTable::new();
    println!("{}", "Configured mounts:".bold());
    for record in settings.list() {
        println!(
            "  {} {}",
            record.display_name().cyan(),
            record.mountpoint.display()
        );
        if detailed {
            println!(
                "    Remote: {}:{}",
                record.connection_id,
                record.remote_path()
            );
            let state = if probe.is_mounted(&record.mountpoint).await? {
                "mounted".green()
            } else {
                "not mounted".dimmed()
            };
            println!("    State: {state}");
        }
    }

    Ok(())
}
