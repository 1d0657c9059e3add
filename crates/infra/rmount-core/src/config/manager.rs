use super::types::*;
use super::validation::RecordValidator;
use crate::error::{Result, RmountError};
use crate::utils::paths;
use atomicwrites::{AllowOverwrite, AtomicFile};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read access to configured mounts, as needed by the supervisor.
pub trait MountRecordStore: Send + Sync {
    fn mount_records(&self) -> Vec<MountRecord>;

    fn mount_record(&self, mountpoint: &Path) -> Option<MountRecord> {
        self.mount_records()
            .into_iter()
            .find(|r| r.is_for(mountpoint))
    }
}

/// The JSON settings file holding the mount list.
///
/// Changes stay in memory until [`MountSettings::save`] is called.
#[derive(Debug, Clone)]
pub struct MountSettings {
    config_path: PathBuf,
    file: SettingsFile,
    dirty: bool,
}

impl MountSettings {
    /// Load from the default location
    pub fn new() -> Result<Self> {
        let config_path = paths::default_config_path()?;
        Self::load(config_path)
    }

    /// Empty settings bound to `path`, without touching the disk
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            file: SettingsFile::default(),
            dirty: false,
        }
    }

    /// Load settings; a missing file yields an empty mount list.
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {:?}, starting empty", path);
            return Ok(Self::with_path(path));
        }

        debug!("Loading settings from {:?}", path);
        let contents = fs::read_to_string(&path)?;
        let file: SettingsFile = if contents.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_json::from_str(&contents)?
        };
        RecordValidator::validate_settings(&file.settings)?;

        Ok(Self {
            config_path: path,
            file,
            dirty: false,
        })
    }

    pub fn load_or_default(path: PathBuf) -> Self {
        match Self::load(path.clone()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings: {}, using empty settings", e);
                Self::with_path(path)
            }
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn main(&self) -> &MainSettings {
        &self.file.settings.main
    }

    pub fn main_mut(&mut self) -> &mut MainSettings {
        self.dirty = true;
        &mut self.file.settings.main
    }

    pub fn list(&self) -> &[MountRecord] {
        &self.file.settings.mount_list
    }

    pub fn get(&self, mountpoint: &Path) -> Option<&MountRecord> {
        self.list().iter().find(|r| r.is_for(mountpoint))
    }

    /// Replace the record with the same mountpoint, or append a new one.
    pub fn upsert(&mut self, record: MountRecord) -> Result<()> {
        if record.mountpoint.as_os_str().is_empty() {
            debug!("Ignoring mount record without mountpoint");
            return Ok(());
        }
        RecordValidator::validate_record(&record)?;

        let list = &mut self.file.settings.mount_list;
        match list.iter_mut().find(|r| r.is_for(&record.mountpoint)) {
            Some(existing) => *existing = record,
            None => list.push(record),
        }
        self.dirty = true;
        Ok(())
    }

    /// Returns whether a record was removed
    pub fn remove(&mut self, mountpoint: &Path) -> bool {
        let list = &mut self.file.settings.mount_list;
        let before = list.len();
        list.retain(|r| !r.is_for(mountpoint));
        let removed = list.len() != before;
        self.dirty |= removed;
        removed
    }

    /// Make the stored list match `records`: update or add each one, then
    /// drop the mountpoints that are no longer present.
    pub fn replace_all(&mut self, records: Vec<MountRecord>) -> Result<()> {
        let stale: Vec<PathBuf> = self
            .list()
            .iter()
            .filter(|old| !records.iter().any(|r| r.is_for(&old.mountpoint)))
            .map(|old| old.mountpoint.clone())
            .collect();

        for record in records {
            self.upsert(record)?;
        }
        for mountpoint in stale {
            self.remove(&mountpoint);
        }
        Ok(())
    }

    pub fn set_label(&mut self, mountpoint: &Path, label: Option<String>) -> Result<()> {
        let record = self
            .file
            .settings
            .mount_list
            .iter_mut()
            .find(|r| r.is_for(mountpoint))
            .ok_or_else(|| RmountError::MountpointNotConfigured {
                mountpoint: mountpoint.to_path_buf(),
            })?;
        record.label = label.filter(|l| !l.trim().is_empty());
        self.dirty = true;
        Ok(())
    }

    /// Copy the current file aside as `config.json.bak`
    pub fn backup(&self) -> Result<()> {
        if self.config_path.exists() {
            let backup_path = self.config_path.with_extension("json.bak");
            fs::copy(&self.config_path, backup_path)?;
            debug!("Created settings backup");
        }
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        RecordValidator::validate_settings(&self.file.settings)?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.backup()?;

        debug!("Saving settings to {:?}", self.config_path);
        let json = serde_json::to_string_pretty(&self.file)?;

        let af = AtomicFile::new(&self.config_path, AllowOverwrite);
        af.write(|f| f.write_all(json.as_bytes()))
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        self.dirty = false;
        info!("Settings saved to {}", self.config_path.display());
        Ok(())
    }
}

impl MountRecordStore for MountSettings {
    fn mount_records(&self) -> Vec<MountRecord> {
        self.list().to_vec()
    }
}
