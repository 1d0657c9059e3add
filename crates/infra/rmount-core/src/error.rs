use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RmountError {
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("Mountpoint is not configured: {mountpoint}")]
    MountpointNotConfigured { mountpoint: PathBuf },

    #[error("Mountpoint is already configured: {mountpoint}")]
    MountpointAlreadyConfigured { mountpoint: PathBuf },

    #[error("Mountpoint is active and cannot be modified: {mountpoint}")]
    MountpointActive { mountpoint: PathBuf },

    #[error("Cannot use {mountpoint} as a mountpoint: {reason}")]
    MountpointUnusable { mountpoint: PathBuf, reason: String },

    #[error("Mounting is not supported on {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("Unmount of {mountpoint} failed: {message}")]
    UnmountFailed { mountpoint: PathBuf, message: String },

    #[error("Mount helper for {mountpoint} did not exit within {timeout:?}, even after SIGKILL")]
    HelperUnresponsive { mountpoint: PathBuf, timeout: Duration },

    #[error("Command timeout: {command} timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RmountError>;
