use anyhow::{Result, bail};
use colored::Colorize;
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>, mountpoint: PathBuf) -> Result<()> {
    let mut settings = super::load_settings(config)?;
    let mountpoint = super::absolute_mountpoint(&mountpoint)?;

    if settings.get(&mountpoint).is_none() {
        bail!("No mount configured at {}", mountpoint.display());
    }

    let supervisor = super::supervisor_for(&settings);
    supervisor.ensure_inactive(&mountpoint).await?;

    settings.remove(&mountpoint);
    settings.save()?;
    println!("{} mount at {}", "Removed".yellow(), mountpoint.display());
    Ok(())
}
