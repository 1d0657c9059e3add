use anyhow::{Result, bail};
use colored::Colorize;
use rmount_core::ReleaseOutcome;
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>, mountpoint: PathBuf) -> Result<()> {
    let settings = super::load_settings(config)?;
    let mountpoint = super::absolute_mountpoint(&mountpoint)?;
    let supervisor = super::supervisor_for(&settings);

    match supervisor.release(&mountpoint).await? {
        ReleaseOutcome::Stopped | ReleaseOutcome::ForeignUnmounted => {
            println!("{} {}", "Unmounted".green(), mountpoint.display());
        }
        ReleaseOutcome::NotMounted => {
            println!("Nothing mounted at {}", mountpoint.display());
        }
        ReleaseOutcome::ForeignUnmountFailed => {
            bail!(
                "Could not unmount {}; it may be busy or owned by another user",
                mountpoint.display()
            );
        }
    }
    Ok(())
}
