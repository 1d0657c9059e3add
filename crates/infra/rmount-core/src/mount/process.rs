use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::types::{ExitKind, HelperExit};

/// How long to keep draining stderr after the helper exited. Grandchildren
/// that inherited the pipe can hold it open indefinitely.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A running mount helper with its stderr being collected in the background
pub struct MountProcess {
    child: Child,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
}

impl MountProcess {
    /// Spawn `program args...` with stdin and stdout detached and stderr captured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(program: &Path, args: &[String]) -> std::io::Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        debug!(
            "Spawned {} {} (pid {:?})",
            program.display(),
            args.join(" "),
            child.id()
        );

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!("Stopped reading helper stderr: {}", e);
                }
                buf
            })
        });

        Ok(Self { child, stderr_task })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the helper to exit and collect everything it wrote to stderr.
    pub async fn wait(mut self) -> HelperExit {
        let status = self.child.wait().await;

        let mut error_output = match self.stderr_task.take() {
            Some(mut task) => match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task).await {
                Ok(Ok(buf)) => buf,
                Ok(Err(e)) => {
                    warn!("Helper stderr reader failed: {}", e);
                    Vec::new()
                }
                Err(_) => {
                    debug!("Helper stderr still open after exit, giving up on it");
                    task.abort();
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        match status {
            Ok(status) => {
                let (code, kind) = classify_exit(status);
                HelperExit {
                    code,
                    kind,
                    error_output,
                }
            }
            Err(e) => {
                warn!("Lost track of helper process: {}", e);
                error_output.extend_from_slice(e.to_string().as_bytes());
                HelperExit {
                    code: -1,
                    kind: ExitKind::Crashed,
                    error_output,
                }
            }
        }
    }
}

/// Map an exit status to an exit code. Signal deaths count as crashes and
/// report `128 + signal` like a shell would.
pub fn classify_exit(status: ExitStatus) -> (i32, ExitKind) {
    if let Some(code) = status.code() {
        return (code, ExitKind::Normal);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (128 + signal, ExitKind::Crashed);
        }
    }

    (-1, ExitKind::Crashed)
}

/// Ask the helper to shut down (SIGTERM).
#[cfg(unix)]
pub fn terminate(pid: u32) -> std::io::Result<()> {
    send_signal(pid, nix::sys::signal::Signal::SIGTERM)
}

/// Kill the helper outright (SIGKILL).
#[cfg(unix)]
pub fn kill(pid: u32) -> std::io::Result<()> {
    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::unistd::Pid;

    let pid = i32::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    match nix::sys::signal::kill(Pid::from_raw(pid), signal) {
        // Already gone
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(std::io::Error::from(e)),
    }
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

#[cfg(not(unix))]
pub fn kill(pid: u32) -> std::io::Result<()> {
    terminate(pid)
}
