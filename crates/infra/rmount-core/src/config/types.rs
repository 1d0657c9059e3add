use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::platform::common::DEFAULT_REMOTE_PATH;

/// One configured mount: which remote goes where.
///
/// The JSON keys (`mountpoint`, `connection`, `label`) match the settings
/// files written by earlier releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRecord {
    pub mountpoint: PathBuf,
    #[serde(rename = "connection")]
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
}

impl MountRecord {
    pub fn new(mountpoint: impl Into<PathBuf>, connection_id: impl Into<String>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            connection_id: connection_id.into(),
            label: None,
            remote_path: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_remote_path(mut self, remote_path: impl Into<String>) -> Self {
        self.remote_path = Some(remote_path.into());
        self
    }

    /// Label if set and non-empty, otherwise the connection id
    pub fn display_name(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => &self.connection_id,
        }
    }

    pub fn remote_path(&self) -> &str {
        self.remote_path.as_deref().unwrap_or(DEFAULT_REMOTE_PATH)
    }

    pub fn is_for(&self, mountpoint: &Path) -> bool {
        crate::utils::paths::normalize_mountpoint(&self.mountpoint)
            == crate::utils::paths::normalize_mountpoint(mountpoint)
    }
}

/// Application-wide settings (the `main` group)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rclone_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rclone_config: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub main: MainSettings,
    #[serde(default)]
    pub mount_list: Vec<MountRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// On-disk layout. Everything lives under the `Q` key; unknown keys at any
/// level are carried through a load/save cycle untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(rename = "Q", default)]
    pub settings: Settings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_name_falls_back_to_connection() {
        let record = MountRecord::new("/home/u/drive", "gdrive");
        assert_eq!(record.display_name(), "gdrive");
        assert_eq!(record.clone().with_label("  ").display_name(), "gdrive");
        assert_eq!(record.with_label("My Drive").display_name(), "My Drive");
    }

    #[test]
    fn test_remote_path_default() {
        let record = MountRecord::new("/m", "s3");
        assert_eq!(record.remote_path(), "/");
        assert_eq!(record.with_remote_path("bucket/photos").remote_path(), "bucket/photos");
    }

    #[test]
    fn test_parses_legacy_settings_file() {
        let json = r#"{
            "Q": {
                "main": {"rclone_path": "/usr/local/bin/rclone", "window_geometry": "abc"},
                "mount_list": [
                    {"mountpoint": "/home/u/drive", "connection": "gdrive", "label": "Drive"},
                    {"mountpoint": "/home/u/box", "connection": "box"}
                ]
            },
            "other_app_data": 1
        }"#;
        let file: SettingsFile = serde_json::from_str(json).unwrap();
        assert_eq!(
            file.settings.main.rclone_path,
            Some(PathBuf::from("/usr/local/bin/rclone"))
        );
        assert_eq!(file.settings.mount_list.len(), 2);
        assert_eq!(file.settings.mount_list[0].label.as_deref(), Some("Drive"));
        assert_eq!(file.settings.mount_list[1].label, None);
        assert!(file.settings.main.extra.contains_key("window_geometry"));
        assert!(file.extra.contains_key("other_app_data"));

        let back = serde_json::to_value(&file).unwrap();
        assert_eq!(back["Q"]["main"]["window_geometry"], "abc");
        assert_eq!(back["Q"]["mount_list"][0]["connection"], "gdrive");
        assert_eq!(back["other_app_data"], 1);
    }

    #[test]
    fn test_record_matching_ignores_trailing_slash() {
        let record = MountRecord::new("/home/u/drive/", "gdrive");
        assert!(record.is_for(Path::new("/home/u/drive")));
        assert!(!record.is_for(Path::new("/home/u/drive2")));
    }
}
