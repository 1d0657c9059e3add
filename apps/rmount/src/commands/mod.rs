pub mod add;
pub mod label;
pub mod list;
pub mod mount;
pub mod release;
pub mod remotes;
pub mod remove;
pub mod status;

use anyhow::{Context, Result};
use rmount_core::utils::paths::{default_config_path, normalize_mountpoint};
use rmount_core::{MountSettings, MountSupervisor, PlatformInfo, SupervisorConfig, detect_platform};
use std::path::{Path, PathBuf};

/// Settings from `--config` / `RMOUNT_CONFIG`, else the default location
pub(crate) fn load_settings(config: Option<PathBuf>) -> Result<MountSettings> {
    let path = match config {
        Some(path) => path,
        None => default_config_path()?,
    };
    MountSettings::load(path.clone())
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

pub(crate) fn supervisor_for(settings: &MountSettings) -> MountSupervisor {
    supervisor_on(settings, &detect_platform())
}

pub(crate) fn supervisor_on(settings: &MountSettings, platform: &PlatformInfo) -> MountSupervisor {
    MountSupervisor::with_system_probe(SupervisorConfig::from_settings(settings.main(), platform))
}

/// Absolute, normalized form of a mountpoint given on the command line
pub(crate) fn absolute_mountpoint(path: &Path) -> Result<PathBuf> {
    let normalized = normalize_mountpoint(path);
    if normalized.is_absolute() {
        return Ok(normalized);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(normalize_mountpoint(&cwd.join(normalized)))
}
