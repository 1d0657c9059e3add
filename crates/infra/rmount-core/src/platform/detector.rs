use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::common::{DEFAULT_HELPER_PATH, FALLBACK_UNMOUNT_TOOL, HELPER_PATH_ENV};
use crate::error::{Result, RmountError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOS,
    Unsupported(String),
}

#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub platform: Platform,
    /// Program used for the one-shot `-u <mountpoint>` unmount
    pub unmount_tool: PathBuf,
    /// Whether a FUSE device is present (always true where it cannot be checked)
    pub fuse_available: bool,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::MacOS,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn can_mount(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl PlatformInfo {
    /// Fail early where no helper could ever mount
    pub fn ensure_can_mount(&self) -> Result<()> {
        match &self.platform {
            Platform::Unsupported(os) => Err(RmountError::UnsupportedPlatform {
                platform: os.clone(),
            }),
            _ => Ok(()),
        }
    }
}

pub fn detect_platform() -> PlatformInfo {
    debug!("Starting platform detection");
    let platform = Platform::current();

    #[cfg(target_os = "linux")]
    let candidates = super::linux::UNMOUNT_TOOLS;
    #[cfg(target_os = "macos")]
    let candidates = super::macos::UNMOUNT_TOOLS;
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    let candidates: &[&str] = &[];

    let unmount_tool = find_unmount_tool(candidates);
    let fuse_available = check_fuse_support();
    info!(
        "Platform {:?}: unmount tool {}, FUSE {}",
        platform,
        unmount_tool.display(),
        if fuse_available { "available" } else { "not detected" }
    );

    PlatformInfo {
        platform,
        unmount_tool,
        fuse_available,
    }
}

/// First candidate found on PATH, else plain `umount`.
pub fn find_unmount_tool(candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_UNMOUNT_TOOL))
}

/// Resolve the mount helper executable.
///
/// Precedence: `RMOUNT_HELPER`, then the path stored in settings, then the
/// compiled-in default.
pub fn resolve_helper_path(configured: Option<&Path>) -> PathBuf {
    if let Ok(from_env) = std::env::var(HELPER_PATH_ENV)
        && !from_env.trim().is_empty()
    {
        return crate::utils::paths::expand_path(Path::new(&from_env));
    }
    match configured {
        Some(path) if !path.as_os_str().is_empty() => crate::utils::paths::expand_path(path),
        _ => PathBuf::from(DEFAULT_HELPER_PATH),
    }
}

#[cfg(target_os = "linux")]
fn check_fuse_support() -> bool {
    Path::new("/dev/fuse").exists()
}

#[cfg(not(target_os = "linux"))]
fn check_fuse_support() -> bool {
    true
}
