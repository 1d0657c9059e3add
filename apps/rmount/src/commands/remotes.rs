use anyhow::Result;
use colored::Colorize;
use rmount_core::{RcloneConfigCatalog, RemoteCatalog};
use std::path::PathBuf;

pub async fn execute(config: Option<PathBuf>) -> Result<()> {
    let settings = super::load_settings(config)?;
    let catalog = RcloneConfigCatalog::from_settings(settings.main())?;
    let remotes = catalog.remotes()?;

    if remotes.is_empty() {
        println!("No remotes found in {}", catalog.path().display());
        println!("\nCreate one with:");
        println!("  {}", "rclone config".cyan());
        return Ok(());
    }

    for remote in remotes {
        println!("{remote}");
    }
    Ok(())
}
