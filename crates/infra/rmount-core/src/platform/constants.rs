/// Platform-specific constants for mount operations

#[cfg(target_os = "linux")]
pub mod linux {
    /// Path to mountinfo for detailed mount information
    pub const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

    /// Fallback mount table when mountinfo is unavailable
    pub const PROC_MOUNTS: &str = "/proc/mounts";

    /// Unmount tools to search for, in order of preference
    pub const UNMOUNT_TOOLS: &[&str] = &["fusermount", "fusermount3"];
}

#[cfg(target_os = "macos")]
pub mod macos {
    /// Mount command for listing mounts
    pub const MOUNT_CMD: &str = "mount";

    /// Unmount tools to search for, in order of preference
    pub const UNMOUNT_TOOLS: &[&str] = &["umount"];
}

/// Common constants across platforms
pub mod common {
    use std::time::Duration;

    /// Default location of the mount helper
    pub const DEFAULT_HELPER_PATH: &str = "/usr/bin/rclone";

    /// Environment variable overriding the helper location
    pub const HELPER_PATH_ENV: &str = "RMOUNT_HELPER";

    /// Remote path mounted when a record does not name one
    pub const DEFAULT_REMOTE_PATH: &str = "/";

    /// Last-resort unmount program when no FUSE-specific tool is installed
    pub const FALLBACK_UNMOUNT_TOOL: &str = "umount";

    /// How long a freshly started helper must survive before it counts as mounted
    pub const MOUNT_CONFIRM_DELAY: Duration = Duration::from_secs(1);

    /// Timeout for unmount operations, and for the helper to exit after one
    pub const UNMOUNT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Grace period after SIGKILL before the helper is declared unresponsive
    pub const KILL_GRACE: Duration = Duration::from_secs(5);

    /// Capacity of each controller's notification channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 32;
}
