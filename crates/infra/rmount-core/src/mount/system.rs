use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, RmountError};

/// Detach whatever is mounted at `mountpoint` using the OS unmount tool.
///
/// FUSE tools (`fusermount`, `fusermount3`) are invoked as `<tool> -u <mountpoint>`;
/// plain `umount` only takes the mountpoint.
pub async fn unmount_with_tool(tool: &Path, mountpoint: &Path, limit: Duration) -> Result<()> {
    let tool_name = tool
        .file_name()
        .map_or_else(|| tool.display().to_string(), |n| n.to_string_lossy().into_owned());

    let mut cmd = Command::new(tool);
    if tool_name != "umount" {
        cmd.arg("-u");
    }
    cmd.arg(mountpoint).kill_on_drop(true);

    debug!("Running {} on {}", tool_name, mountpoint.display());
    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| RmountError::CommandTimeout {
            command: tool_name.clone(),
            timeout: limit,
        })??;

    if output.status.code() == Some(0) {
        info!("Unmounted {} with {}", mountpoint.display(), tool_name);
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("{} failed for {}: {}", tool_name, mountpoint.display(), stderr.trim());
        Err(RmountError::UnmountFailed {
            mountpoint: mountpoint.to_path_buf(),
            message: stderr.trim().to_string(),
        })
    }
}
