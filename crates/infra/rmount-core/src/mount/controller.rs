use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::probe::MountProbe;
use super::process::{self, MountProcess};
use super::supervisor::{Registry, SupervisorConfig};
use super::system::unmount_with_tool;
use super::types::{ExitKind, HelperExit, MountEvent, MountState};
use crate::error::{Result, RmountError};
use crate::platform::common::{EVENT_CHANNEL_CAPACITY, MOUNT_CONFIRM_DELAY};

/// Owns at most one rclone helper process serving one mountpoint.
///
/// Controllers are obtained from [`MountSupervisor`](super::MountSupervisor),
/// which guarantees a single controller per mountpoint. Subscribe before
/// calling [`start`](Self::start) to observe every notification.
pub struct MountController {
    mountpoint: PathBuf,
    config: Arc<SupervisorConfig>,
    probe: Arc<dyn MountProbe>,
    registry: Weak<Registry>,
    inner: Mutex<ControllerInner>,
    state_tx: watch::Sender<MountState>,
    events: broadcast::Sender<MountEvent>,
}

struct ControllerInner {
    connection_id: String,
    remote_path: String,
    state: MountState,
    /// Set when a helper is launched, cleared on any error or exit
    mounted: bool,
    pid: Option<u32>,
    discarded: bool,
    last_exit: Option<HelperExit>,
}

impl std::fmt::Debug for MountController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MountController")
            .field("mountpoint", &self.mountpoint)
            .field("connection_id", &inner.connection_id)
            .field("remote_path", &inner.remote_path)
            .field("state", &inner.state)
            .field("pid", &inner.pid)
            .field("discarded", &inner.discarded)
            .finish_non_exhaustive()
    }
}

impl MountController {
    pub(crate) fn new(
        mountpoint: PathBuf,
        connection_id: String,
        remote_path: String,
        config: Arc<SupervisorConfig>,
        probe: Arc<dyn MountProbe>,
        registry: Weak<Registry>,
    ) -> Self {
        let (state_tx, _) = watch::channel(MountState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            mountpoint,
            config,
            probe,
            registry,
            inner: Mutex::new(ControllerInner {
                connection_id,
                remote_path,
                state: MountState::Idle,
                mounted: false,
                pid: None,
                discarded: false,
                last_exit: None,
            }),
            state_tx,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn connection_id(&self) -> String {
        self.lock().connection_id.clone()
    }

    pub fn remote_path(&self) -> String {
        self.lock().remote_path.clone()
    }

    pub fn state(&self) -> MountState {
        self.lock().state
    }

    /// True once the helper has survived the confirmation delay
    pub fn is_mounted(&self) -> bool {
        self.lock().state == MountState::Mounted
    }

    /// True while a helper may be running (starting, mounted or stopping)
    pub fn is_active(&self) -> bool {
        self.lock().state.is_active()
    }

    pub fn is_discarded(&self) -> bool {
        self.lock().discarded
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    /// How the most recent helper ended
    pub fn last_exit(&self) -> Option<HelperExit> {
        self.lock().last_exit.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MountEvent> {
        self.events.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<MountState> {
        self.state_tx.subscribe()
    }

    /// Set the connection (and the remote path that goes with it) of a
    /// controller created without one. Ignored once set.
    pub(crate) fn bind_connection(&self, connection_id: &str, remote_path: &str) {
        let mut inner = self.lock();
        if inner.connection_id.is_empty() && !connection_id.trim().is_empty() {
            inner.connection_id = connection_id.trim().to_string();
            inner.remote_path = remote_path.to_string();
        }
    }

    /// Helper argument list: `mount <connection>:<remote path> <mountpoint>`
    pub fn mount_args(&self) -> Vec<String> {
        let inner = self.lock();
        self.helper_args(&inner.connection_id, &inner.remote_path)
    }

    fn helper_args(&self, connection_id: &str, remote_path: &str) -> Vec<String> {
        vec![
            "mount".to_string(),
            format!("{connection_id}:{remote_path}"),
            self.mountpoint.display().to_string(),
        ]
    }

    /// Launch the helper and register this controller.
    ///
    /// Returns false without side effects when there is no connection, a helper
    /// is already running, the controller was discarded, or another controller
    /// owns the mountpoint. A launch that fails at the OS level still returns
    /// true and is reported as an `Unmounted` notification with code -1.
    pub fn start(self: &Arc<Self>) -> bool {
        if tokio::runtime::Handle::try_current().is_err() {
            error!("Cannot start mount helper outside of a tokio runtime");
            return false;
        }

        let mut inner = self.lock();
        if inner.connection_id.is_empty() {
            warn!("No connection configured for {}", self.mountpoint.display());
            return false;
        }
        if inner.discarded {
            warn!("Controller for {} was discarded", self.mountpoint.display());
            return false;
        }
        if inner.mounted || inner.state.is_active() {
            debug!("Helper for {} already running", self.mountpoint.display());
            return false;
        }

        let Some(registry) = self.registry.upgrade() else {
            warn!("Supervisor for {} is gone", self.mountpoint.display());
            return false;
        };
        if !registry.register(self) {
            warn!(
                "Another controller already owns {}",
                self.mountpoint.display()
            );
            return false;
        }

        let args = self.helper_args(&inner.connection_id, &inner.remote_path);
        info!(
            "Mounting {}:{} on {}",
            inner.connection_id,
            inner.remote_path,
            self.mountpoint.display()
        );

        inner.state = MountState::Starting;
        inner.last_exit = None;
        self.state_tx.send_replace(MountState::Starting);

        match MountProcess::spawn(&self.config.helper_path, &args) {
            Ok(process) => {
                inner.pid = process.id();
                inner.mounted = true;
                drop(inner);
                tokio::spawn(Arc::clone(self).supervise(process));
            }
            Err(e) => {
                error!(
                    "Failed to launch {}: {}",
                    self.config.helper_path.display(),
                    e
                );
                inner.mounted = false;
                drop(inner);
                let exit = HelperExit {
                    code: -1,
                    kind: ExitKind::FailedToStart,
                    error_output: e.to_string().into_bytes(),
                };
                let this = Arc::clone(self);
                tokio::spawn(async move { this.on_exit(exit) });
            }
        }
        true
    }

    async fn supervise(self: Arc<Self>, process: MountProcess) {
        self.on_started();

        let exited = process.wait();
        tokio::pin!(exited);
        let confirm = tokio::time::sleep(MOUNT_CONFIRM_DELAY);
        tokio::pin!(confirm);
        let mut confirmed = false;

        let exit = loop {
            tokio::select! {
                exit = &mut exited => break exit,
                () = &mut confirm, if !confirmed => {
                    confirmed = true;
                    self.on_confirm();
                }
            }
        };
        self.on_exit(exit);
    }

    fn on_started(&self) {
        let inner = self.lock();
        if !inner.discarded {
            debug!("Helper started for {}", self.mountpoint.display());
            let _ = self.events.send(MountEvent::Started {
                mountpoint: self.mountpoint.clone(),
            });
        }
    }

    fn on_confirm(&self) {
        let mut inner = self.lock();
        if inner.discarded || !inner.mounted || inner.state != MountState::Starting {
            return;
        }
        inner.state = MountState::Mounted;
        self.state_tx.send_replace(MountState::Mounted);
        info!("Mounted {}", self.mountpoint.display());
        let _ = self.events.send(MountEvent::Mounted {
            mountpoint: self.mountpoint.clone(),
        });
    }

    fn on_exit(&self, exit: HelperExit) {
        let mut inner = self.lock();
        inner.mounted = false;
        inner.pid = None;
        inner.state = MountState::Terminated;

        match exit.kind {
            ExitKind::Normal if exit.code == 0 => {
                info!("Helper for {} exited", self.mountpoint.display());
            }
            ExitKind::Normal | ExitKind::FailedToStart => warn!(
                "Helper for {} exited with code {}: {}",
                self.mountpoint.display(),
                exit.code,
                exit.error_text().trim()
            ),
            ExitKind::Crashed => warn!(
                "Helper for {} crashed (code {})",
                self.mountpoint.display(),
                exit.code
            ),
        }

        if !inner.discarded {
            if let Some(registry) = self.registry.upgrade() {
                registry.unregister(self);
            }
            // After a crash the caller may still restart or discard explicitly
            if exit.kind != ExitKind::Crashed {
                inner.discarded = true;
                debug!("Discarded controller for {}", self.mountpoint.display());
            }
            let _ = self.events.send(MountEvent::Unmounted {
                mountpoint: self.mountpoint.clone(),
                exit_code: exit.code,
                error_output: exit.error_output.clone(),
            });
        }
        inner.last_exit = Some(exit);
        self.state_tx.send_replace(MountState::Terminated);
    }

    /// Stop the helper and wait for it to exit.
    ///
    /// Tries the OS unmount tool first and falls back to SIGTERM. If the helper
    /// is still alive after the unmount timeout it is killed; if even that does
    /// not end it, [`RmountError::HelperUnresponsive`] is returned. Does nothing
    /// when no helper is running.
    pub async fn umount(&self) -> Result<()> {
        let mut state_rx = self.state_tx.subscribe();
        let pid = {
            let mut inner = self.lock();
            match inner.state {
                MountState::Starting | MountState::Mounted => {
                    inner.state = MountState::Stopping;
                    self.state_tx.send_replace(MountState::Stopping);
                    inner.pid
                }
                MountState::Stopping => inner.pid,
                MountState::Idle | MountState::Terminated => {
                    debug!("Nothing to unmount at {}", self.mountpoint.display());
                    return Ok(());
                }
            }
        };

        info!("Unmounting {}", self.mountpoint.display());
        if !self.umount_system().await
            && let Some(pid) = pid
        {
            debug!("Sending SIGTERM to helper {}", pid);
            if let Err(e) = process::terminate(pid) {
                warn!("Failed to terminate helper {}: {}", pid, e);
            }
        }

        if wait_for_exit(&mut state_rx, self.config.unmount_timeout).await {
            return Ok(());
        }

        warn!(
            "Helper for {} still running after {:?}, killing it",
            self.mountpoint.display(),
            self.config.unmount_timeout
        );
        if let Some(pid) = self.pid()
            && let Err(e) = process::kill(pid)
        {
            warn!("Failed to kill helper {}: {}", pid, e);
        }

        if wait_for_exit(&mut state_rx, self.config.kill_grace).await {
            Ok(())
        } else {
            error!("Helper for {} is unresponsive", self.mountpoint.display());
            Err(RmountError::HelperUnresponsive {
                mountpoint: self.mountpoint.clone(),
                timeout: self.config.unmount_timeout + self.config.kill_grace,
            })
        }
    }

    /// Detach the mountpoint with the OS unmount tool, whoever mounted it.
    pub async fn umount_system(&self) -> bool {
        unmount_with_tool(
            &self.config.unmount_tool,
            &self.mountpoint,
            self.config.unmount_timeout,
        )
        .await
        .is_ok()
    }

    /// Whether the OS reports a filesystem mounted at this mountpoint,
    /// regardless of who mounted it.
    pub async fn is_externally_mounted(&self) -> Result<bool> {
        self.probe.is_mounted(&self.mountpoint).await
    }

    /// Remove from the registry and release the helper. Idempotent.
    ///
    /// A helper still running is killed. No notifications are delivered after
    /// this returns.
    pub fn discard(&self) {
        let pid = {
            let mut inner = self.lock();
            if inner.discarded {
                return;
            }
            inner.discarded = true;
            inner.pid
        };

        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self);
        }
        if let Some(pid) = pid {
            warn!(
                "Discarding {} while its helper is running, killing {}",
                self.mountpoint.display(),
                pid
            );
            if let Err(e) = process::kill(pid) {
                warn!("Failed to kill helper {}: {}", pid, e);
            }
        }
        debug!("Discarded controller for {}", self.mountpoint.display());
    }
}

async fn wait_for_exit(rx: &mut watch::Receiver<MountState>, limit: Duration) -> bool {
    matches!(
        tokio::time::timeout(limit, rx.wait_for(|s| *s == MountState::Terminated)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{MountSupervisor, StaticMountTable};

    fn supervisor() -> MountSupervisor {
        let config = SupervisorConfig {
            helper_path: PathBuf::from("/bin/false"),
            remote_path: "/".to_string(),
            unmount_tool: PathBuf::from("/bin/false"),
            unmount_timeout: Duration::from_secs(1),
            kill_grace: Duration::from_secs(1),
        };
        MountSupervisor::new(config, Arc::new(StaticMountTable::new()))
    }

    #[test]
    fn test_mount_args() {
        let sup = supervisor();
        let controller = sup
            .controller_for(Path::new("/mnt/drive/"), Some("gdrive"), true)
            .unwrap();
        assert_eq!(controller.mountpoint(), Path::new("/mnt/drive"));
        assert_eq!(controller.mount_args(), vec!["mount", "gdrive:/", "/mnt/drive"]);
        assert_eq!(controller.state(), MountState::Idle);
    }

    #[test]
    fn test_start_needs_runtime() {
        let sup = supervisor();
        let controller = sup
            .controller_for(Path::new("/mnt/drive"), Some("gdrive"), true)
            .unwrap();
        assert!(!controller.start());
        assert!(sup.tracked_mountpoints().is_empty());
    }

    #[tokio::test]
    async fn test_umount_idle_is_noop() {
        let sup = supervisor();
        let controller = sup
            .controller_for(Path::new("/mnt/drive"), Some("gdrive"), true)
            .unwrap();
        controller.umount().await.unwrap();
        assert_eq!(controller.state(), MountState::Idle);
    }

    #[tokio::test]
    async fn test_is_externally_mounted_uses_probe() {
        let table = StaticMountTable::new();
        let sup = MountSupervisor::new(supervisor().config().clone(), Arc::new(table.clone()));
        let controller = sup
            .controller_for(Path::new("/mnt/drive"), None, true)
            .unwrap();

        assert!(!controller.is_externally_mounted().await.unwrap());
        table.insert(Path::new("/mnt/drive"));
        assert!(controller.is_externally_mounted().await.unwrap());
    }

    #[test]
    fn test_discard_idle_is_idempotent() {
        let sup = supervisor();
        let controller = sup
            .controller_for(Path::new("/mnt/drive"), Some("gdrive"), true)
            .unwrap();
        controller.discard();
        controller.discard();
        assert!(controller.is_discarded());
        assert!(sup.controller_for(Path::new("/mnt/drive"), None, false).is_none());
    }
}
