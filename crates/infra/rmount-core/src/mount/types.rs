use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Lifecycle of a mount controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountState {
    /// Created, no helper process yet
    Idle,
    /// Helper spawned, not yet confirmed
    Starting,
    /// Helper survived the confirmation delay
    Mounted,
    /// Unmount requested, waiting for the helper to exit
    Stopping,
    /// Helper exited
    Terminated,
}

impl MountState {
    /// Whether a helper process may still be running
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Mounted | Self::Stopping)
    }
}

impl std::fmt::Display for MountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Mounted => "mounted",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// How the helper process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    /// Exited on its own with an exit code
    Normal,
    /// Killed by a signal, or its exit could not be observed
    Crashed,
    /// The executable could not be launched at all
    FailedToStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperExit {
    pub code: i32,
    pub kind: ExitKind,
    /// Everything the helper wrote to stderr
    pub error_output: Vec<u8>,
}

impl HelperExit {
    pub fn error_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.error_output)
    }

    pub fn success(&self) -> bool {
        self.kind == ExitKind::Normal && self.code == 0
    }
}

/// Notifications delivered to whoever subscribed to a controller.
///
/// Per start cycle: `Started` first, `Mounted` at most once, and exactly one
/// `Unmounted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEvent {
    Started {
        mountpoint: PathBuf,
    },
    Mounted {
        mountpoint: PathBuf,
    },
    Unmounted {
        mountpoint: PathBuf,
        exit_code: i32,
        error_output: Vec<u8>,
    },
}

impl MountEvent {
    pub fn mountpoint(&self) -> &Path {
        match self {
            Self::Started { mountpoint }
            | Self::Mounted { mountpoint }
            | Self::Unmounted { mountpoint, .. } => mountpoint,
        }
    }
}

/// One row of the operating system's mount table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry {
    /// Where the filesystem is mounted
    pub root: PathBuf,
    /// Device or remote the filesystem comes from (e.g. `gdrive:`)
    pub source: String,
    /// Filesystem type (e.g. `fuse.rclone`)
    pub fs_type: String,
    pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!MountState::Idle.is_active());
        assert!(MountState::Starting.is_active());
        assert!(MountState::Mounted.is_active());
        assert!(MountState::Stopping.is_active());
        assert!(!MountState::Terminated.is_active());
    }

    #[test]
    fn test_helper_exit_text() {
        let exit = HelperExit {
            code: 1,
            kind: ExitKind::Normal,
            error_output: b"Failed to create file system: didn't find section\n".to_vec(),
        };
        assert!(exit.error_text().contains("didn't find section"));
        assert!(!exit.success());
    }

    #[test]
    fn test_event_mountpoint() {
        let event = MountEvent::Unmounted {
            mountpoint: PathBuf::from("/mnt/a"),
            exit_code: 0,
            error_output: Vec::new(),
        };
        assert_eq!(event.mountpoint(), Path::new("/mnt/a"));
    }
}
