use anyhow::Result;
use colored::Colorize;
use rmount_core::{MountProbe, SystemMountTable};
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>, json: bool) -> Result<()> {
    let settings = super::load_settings(config)?;
    let probe = SystemMountTable::new();

    let mut rows = Vec::with_capacity(settings.list().len());
    for record in settings.list() {
        let entry = probe.entry_for(&record.mountpoint).await?;
        rows.push((record, entry));
    }

    // rclone mounts nobody configured here
    let unmanaged: Vec<_> = probe
        .mounted_volumes()
        .await?
        .into_iter()
        .filter(|m| m.fs_type.contains("rclone"))
        .filter(|m| settings.get(&m.root).is_none())
        .collect();

    if json {
        let configured: Vec<_> = rows
            .iter()
            .map(|(record, entry)| {
                serde_json::json!({
                    "mountpoint": record.mountpoint,
                    "connection": record.connection_id,
                    "label": record.display_name(),
                    "remote_path": record.remote_path(),
                    "mounted": entry.is_some(),
                    "source": entry.as_ref().map(|e| e.source.clone()),
                })
            })
            .collect();
        let output = serde_json::json!({
            "configured": configured,
            "unmanaged": unmanaged,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Mount Status".bold().cyan());
    println!("{}", "============".cyan());

    if rows.is_empty() {
        println!("  No mounts configured");
    }
    for (record, entry) in &rows {
        let state = match entry {
            Some(entry) if entry.source.split(':').next() == Some(record.connection_id.as_str()) => {
                "mounted".green()
            }
            Some(_) => "mounted (other source)".yellow(),
            None => "not mounted".dimmed(),
        };
        println!(
            "  {} {} [{}]",
            record.display_name().cyan(),
            record.mountpoint.display(),
            state
        );
    }

    if !unmanaged.is_empty() {
        println!();
        println!("{}", "Unmanaged rclone mounts:".yellow());
        for entry in &unmanaged {
            println!("  {} on {}", entry.source, entry.root.display());
        }
    }

    Ok(())
}
