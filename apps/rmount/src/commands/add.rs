use anyhow::Result;
use colored::Colorize;
use rmount_core::{
    MountRecord, RcloneConfigCatalog, RemoteCatalog, SystemMountTable, check_new_mountpoint,
};
use std::path::PathBuf;
use tracing::warn;

pub async fn execute(
    config: Option<PathBuf>,
    connection: String,
    mountpoint: PathBuf,
    label: Option<String>,
    remote_path: Option<String>,
) -> Result<()> {
    let mut settings = super::load_settings(config)?;
    let mountpoint = super::absolute_mountpoint(&mountpoint)?;
    let connection = connection.trim().trim_end_matches(':').to_string();

    // Unknown remotes are allowed; rclone may be configured through the environment
    match RcloneConfigCatalog::from_settings(settings.main()).and_then(|c| c.contains(&connection)) {
        Ok(true) => {}
        Ok(false) => warn!("Remote '{}' is not listed in the rclone config", connection),
        Err(e) => warn!("Could not read the rclone config: {}", e),
    }

    check_new_mountpoint(settings.list(), &SystemMountTable::new(), &mountpoint).await?;

    let mut record = MountRecord::new(&mountpoint, &connection);
    if let Some(label) = label {
        record = record.with_label(label);
    }
    if let Some(remote_path) = remote_path {
        record = record.with_remote_path(remote_path);
    }
    let name = record.display_name().to_string();

    settings.upsert(record)?;
    settings.save()?;

    println!(
        "{} {} ({}) on {}",
        "Added".green(),
        name,
        connection,
        mountpoint.display()
    );
    Ok(())
}
