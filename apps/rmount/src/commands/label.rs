use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>, mountpoint: PathBuf, label: Option<String>) -> Result<()> {
    let mut settings = super::load_settings(config)?;
    let mountpoint = super::absolute_mountpoint(&mountpoint)?;

    let supervisor = super::supervisor_for(&settings);
    supervisor.ensure_inactive(&mountpoint).await?;

    settings.set_label(&mountpoint, label)?;
    settings.save()?;

    if let Some(record) = settings.get(&mountpoint) {
        println!(
            "{} {} is now labelled '{}'",
            "Updated".green(),
            mountpoint.display(),
            record.display_name()
        );
    }
    Ok(())
}
