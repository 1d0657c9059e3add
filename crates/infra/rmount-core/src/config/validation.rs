use std::collections::HashSet;
use std::path::Path;

use crate::config::types::{MountRecord, Settings};
use crate::error::{Result, RmountError};
use crate::mount::MountProbe;
use crate::utils::paths::normalize_mountpoint;

pub struct RecordValidator;

impl RecordValidator {
    pub fn validate_record(record: &MountRecord) -> Result<()> {
        if record.mountpoint.as_os_str().is_empty() {
            return Err(RmountError::ConfigInvalid {
                message: "mountpoint cannot be empty".to_string(),
            });
        }
        if !record.mountpoint.is_absolute() && !record.mountpoint.starts_with("~") {
            return Err(RmountError::ConfigInvalid {
                message: format!(
                    "mountpoint must be an absolute path: {}",
                    record.mountpoint.display()
                ),
            });
        }
        if record.connection_id.trim().is_empty() {
            return Err(RmountError::ConfigInvalid {
                message: format!(
                    "connection cannot be empty for {}",
                    record.mountpoint.display()
                ),
            });
        }
        if record.connection_id.contains(':') {
            return Err(RmountError::ConfigInvalid {
                message: format!(
                    "connection '{}' must be a remote name without ':'",
                    record.connection_id
                ),
            });
        }
        Ok(())
    }

    pub fn validate_settings(settings: &Settings) -> Result<()> {
        let mut seen = HashSet::new();
        for record in &settings.mount_list {
            Self::validate_record(record)?;
            if !seen.insert(normalize_mountpoint(&record.mountpoint)) {
                return Err(RmountError::ConfigInvalid {
                    message: format!(
                        "mountpoint configured more than once: {}",
                        record.mountpoint.display()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Checks a directory before it is accepted as a new mountpoint.
///
/// The directory must not already be configured, must be a readable
/// directory, must not be mounted by anything, and must be empty.
pub async fn check_new_mountpoint(
    existing: &[MountRecord],
    probe: &dyn MountProbe,
    mountpoint: &Path,
) -> Result<()> {
    if existing.iter().any(|r| r.is_for(mountpoint)) {
        return Err(RmountError::MountpointAlreadyConfigured {
            mountpoint: mountpoint.to_path_buf(),
        });
    }

    let unusable = |reason: &str| RmountError::MountpointUnusable {
        mountpoint: mountpoint.to_path_buf(),
        reason: reason.to_string(),
    };

    if !mountpoint.is_dir() {
        return Err(unusable("not an existing directory"));
    }
    let mut entries = match tokio::fs::read_dir(mountpoint).await {
        Ok(entries) => entries,
        Err(_) => return Err(unusable("directory is not accessible")),
    };

    if probe.is_mounted(mountpoint).await? {
        return Err(unusable("directory is already mounted"));
    }

    if entries.next_entry().await?.is_some() {
        return Err(unusable("directory is not empty"));
    }

    Ok(())
}
