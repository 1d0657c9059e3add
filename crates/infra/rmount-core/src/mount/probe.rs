//! Queries the operating system's live mount table, independent of what any
//! controller believes it owns.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::types::MountEntry;
use crate::error::Result;
use crate::utils::paths::{resolve_mount_root, same_mount_root};

#[async_trait]
pub trait MountProbe: Send + Sync {
    /// Every filesystem currently mounted
    async fn mounted_volumes(&self) -> Result<Vec<MountEntry>>;

    /// The mount table row whose root is `path`, if any
    async fn entry_for(&self, path: &Path) -> Result<Option<MountEntry>> {
        let resolved = resolve_mount_root(path).await;
        Ok(self
            .mounted_volumes()
            .await?
            .into_iter()
            .find(|m| same_mount_root(&m.root, path, &resolved)))
    }

    /// Whether something is mounted with `path` as its root
    async fn is_mounted(&self, path: &Path) -> Result<bool> {
        Ok(self.entry_for(path).await?.is_some())
    }
}

/// The real mount table: `/proc/self/mountinfo` on Linux, `mount` output on macOS.
#[derive(Debug, Clone, Default)]
pub struct SystemMountTable;

impl SystemMountTable {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MountProbe for SystemMountTable {
    #[cfg(target_os = "linux")]
    async fn mounted_volumes(&self) -> Result<Vec<MountEntry>> {
        use crate::platform::linux::{PROC_MOUNTINFO, PROC_MOUNTS};

        match tokio::fs::read_to_string(PROC_MOUNTINFO).await {
            Ok(content) => Ok(parse_mountinfo(&content)),
            Err(e) => {
                debug!("{} unreadable ({}), falling back to {}", PROC_MOUNTINFO, e, PROC_MOUNTS);
                let content = tokio::fs::read_to_string(PROC_MOUNTS).await?;
                Ok(parse_proc_mounts(&content))
            }
        }
    }

    #[cfg(target_os = "macos")]
    async fn mounted_volumes(&self) -> Result<Vec<MountEntry>> {
        use crate::error::RmountError;
        use crate::platform::macos::MOUNT_CMD;

        let output = tokio::process::Command::new(MOUNT_CMD).output().await?;
        if !output.status.success() {
            return Err(RmountError::Other(anyhow::anyhow!(
                "Failed to list mounts: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(parse_mount_output(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    async fn mounted_volumes(&self) -> Result<Vec<MountEntry>> {
        debug!("Mount table not available on this platform");
        Ok(Vec::new())
    }
}

/// Parse `/proc/self/mountinfo`.
///
/// Format: `id parent major:minor root mount_point options [optional...] - fstype source super_options`
pub fn parse_mountinfo(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let (left, right) = line.split_once(" - ")?;
            let left: Vec<&str> = left.split_whitespace().collect();
            let right: Vec<&str> = right.split_whitespace().collect();
            if left.len() < 6 || right.len() < 2 {
                return None;
            }
            Some(MountEntry {
                root: PathBuf::from(decode_mount_escape(left[4])),
                source: decode_mount_escape(right[1]),
                fs_type: right[0].to_string(),
                options: left[5].split(',').map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Parse `/proc/mounts`: `source mount_point fstype options dump pass`
pub fn parse_proc_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(MountEntry {
                root: PathBuf::from(decode_mount_escape(fields[1])),
                source: decode_mount_escape(fields[0]),
                fs_type: fields[2].to_string(),
                options: fields[3].split(',').map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Parse BSD-style `mount` output: `source on /path (type, opt, opt)`
pub fn parse_mount_output(output: &str) -> Vec<MountEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (source, rest) = line.split_once(" on ")?;
            let paren = rest.rfind(" (")?;
            let root = &rest[..paren];
            let opts = rest[paren + 2..].trim_end_matches(')');
            let options: Vec<String> = opts.split(", ").map(str::to_string).collect();
            Some(MountEntry {
                root: PathBuf::from(root),
                source: source.to_string(),
                fs_type: options.first().cloned().unwrap_or_default(),
                options,
            })
        })
        .collect()
}

/// Undo the octal escaping the kernel applies to whitespace and backslashes
fn decode_mount_escape(value: &str) -> String {
    value
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MOUNTINFO: &str = "\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw,errors=remount-ro
25 22 0:21 / /proc rw,nosuid,nodev,noexec,relatime shared:13 - proc proc rw
87 22 0:52 / /home/u/My\\040Drive rw,nosuid,nodev,relatime shared:48 - fuse.rclone gdrive: rw,user_id=1000,group_id=1000
broken line without separator
";

    #[test]
    fn test_parse_mountinfo() {
        let entries = parse_mountinfo(MOUNTINFO);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].root, PathBuf::from("/"));
        assert_eq!(entries[0].fs_type, "ext4");
        assert_eq!(
            entries[2],
            MountEntry {
                root: PathBuf::from("/home/u/My Drive"),
                source: "gdrive:".to_string(),
                fs_type: "fuse.rclone".to_string(),
                options: vec![
                    "rw".to_string(),
                    "nosuid".to_string(),
                    "nodev".to_string(),
                    "relatime".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_parse_proc_mounts() {
        let content = "/dev/sda1 / ext4 rw,relatime 0 0\nbox: /mnt/box fuse.rclone rw,nosuid 0 0\n";
        let entries = parse_proc_mounts(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].root, PathBuf::from("/mnt/box"));
        assert_eq!(entries[1].source, "box:");
    }

    #[test]
    fn test_parse_mount_output() {
        let content = "\
/dev/disk3s1s1 on / (apfs, sealed, local, read-only, journaled)
gdrive: on /Users/u/Google Drive (macfuse, nodev, nosuid, synchronous, mounted by u)
";
        let entries = parse_mount_output(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].root, PathBuf::from("/Users/u/Google Drive"));
        assert_eq!(entries[1].fs_type, "macfuse");
    }

    #[tokio::test]
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    async fn test_system_table_sees_root() {
        let probe = SystemMountTable::new();
        assert!(probe.is_mounted(Path::new("/")).await.unwrap());

        let tmp = tempfile::TempDir::new().unwrap();
        assert!(!probe.is_mounted(tmp.path()).await.unwrap());
    }
}
