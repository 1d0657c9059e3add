use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::controller::MountController;
use super::probe::{MountProbe, SystemMountTable};
use super::system::unmount_with_tool;
use crate::config::{MainSettings, MountRecord, MountRecordStore};
use crate::error::{Result, RmountError};
use crate::platform::common::{DEFAULT_REMOTE_PATH, KILL_GRACE, UNMOUNT_TIMEOUT};
use crate::platform::{PlatformInfo, resolve_helper_path};
use crate::utils::paths::normalize_mountpoint;

/// How helpers are launched and stopped
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// rclone executable
    pub helper_path: PathBuf,
    /// Remote path used when a controller is created without a record
    pub remote_path: String,
    /// One-shot unmount program (`fusermount`, `fusermount3` or `umount`)
    pub unmount_tool: PathBuf,
    /// Bound on the unmount tool, and on the helper exiting afterwards
    pub unmount_timeout: Duration,
    /// Wait after SIGKILL before giving up on the helper
    pub kill_grace: Duration,
}

impl SupervisorConfig {
    /// Build from stored settings and the detected platform
    pub fn from_settings(main: &MainSettings, platform: &PlatformInfo) -> Self {
        Self {
            helper_path: resolve_helper_path(main.rclone_path.as_deref()),
            unmount_tool: platform.unmount_tool.clone(),
            ..Self::default()
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            helper_path: resolve_helper_path(None),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
            unmount_tool: crate::platform::detect_platform().unmount_tool,
            unmount_timeout: UNMOUNT_TIMEOUT,
            kill_grace: KILL_GRACE,
        }
    }
}

/// Result of [`MountSupervisor::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// A tracked helper was stopped
    Stopped,
    /// Something mounted outside this process was detached
    ForeignUnmounted,
    /// Something foreign is mounted there and the unmount tool failed
    ForeignUnmountFailed,
    /// Nothing was mounted
    NotMounted,
}

#[derive(Default)]
struct Tables {
    /// Controllers that have started, keyed by normalized mountpoint
    active: HashMap<PathBuf, Arc<MountController>>,
    /// Controllers handed out but not yet started
    pending: HashMap<PathBuf, Weak<MountController>>,
}

/// Process-wide table of mount controllers
#[derive(Default)]
pub(crate) struct Registry {
    tables: Mutex<Tables>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `controller` as the owner of its mountpoint. Fails when a
    /// different controller already owns it.
    pub(crate) fn register(&self, controller: &Arc<MountController>) -> bool {
        let mut tables = self.lock();
        let key = controller.mountpoint().to_path_buf();
        if let Some(existing) = tables.active.get(&key) {
            return Arc::ptr_eq(existing, controller);
        }
        if tables
            .pending
            .get(&key)
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(controller)))
        {
            tables.pending.remove(&key);
        }
        tables.active.insert(key, Arc::clone(controller));
        true
    }

    /// Drop `controller` from the table, leaving any other instance alone
    pub(crate) fn unregister(&self, controller: &MountController) {
        let mut tables = self.lock();
        let key = controller.mountpoint();
        if tables
            .active
            .get(key)
            .is_some_and(|c| std::ptr::eq(Arc::as_ptr(c), controller))
        {
            tables.active.remove(key);
        }
        if tables
            .pending
            .get(key)
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), controller))
        {
            tables.pending.remove(key);
        }
    }
}

/// Hands out controllers, at most one per mountpoint, and answers
/// questions about the whole set.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct MountSupervisor {
    registry: Arc<Registry>,
    config: Arc<SupervisorConfig>,
    probe: Arc<dyn MountProbe>,
}

impl std::fmt::Debug for MountSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountSupervisor")
            .field("config", &self.config)
            .field("tracked", &self.tracked_mountpoints())
            .finish_non_exhaustive()
    }
}

impl MountSupervisor {
    pub fn new(config: SupervisorConfig, probe: Arc<dyn MountProbe>) -> Self {
        debug!("Supervisor using helper {}", config.helper_path.display());
        Self {
            registry: Arc::new(Registry::default()),
            config: Arc::new(config),
            probe,
        }
    }

    /// Supervisor backed by the real mount table
    pub fn with_system_probe(config: SupervisorConfig) -> Self {
        Self::new(config, Arc::new(SystemMountTable::new()))
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn probe(&self) -> &Arc<dyn MountProbe> {
        &self.probe
    }

    /// Look up the controller for `mountpoint`, optionally creating one.
    ///
    /// An existing controller always wins, and its connection is left as is.
    /// Otherwise one is created when `create_if_missing` is set or a
    /// connection is given; a controller created without a connection can be
    /// inspected but not started. New controllers are not
    /// registered until they start, but concurrent callers still receive the
    /// same instance while any of them holds it.
    pub fn controller_for(
        &self,
        mountpoint: &Path,
        connection_id: Option<&str>,
        create_if_missing: bool,
    ) -> Option<Arc<MountController>> {
        let connection_id = connection_id.unwrap_or_default();
        if create_if_missing || !connection_id.trim().is_empty() {
            Some(self.get_or_create(mountpoint, connection_id, &self.config.remote_path))
        } else {
            let key = normalize_mountpoint(mountpoint);
            let found = Self::find(&self.registry.lock(), &key);
            if let Some(controller) = &found {
                controller.bind_connection(connection_id, &self.config.remote_path);
            }
            found
        }
    }

    /// Controller for a configured mount, created from the record if needed
    pub fn controller_for_record(&self, record: &MountRecord) -> Arc<MountController> {
        self.get_or_create(
            &record.mountpoint,
            &record.connection_id,
            record.remote_path(),
        )
    }

    /// Controller for `mountpoint`, resolving the connection from `store`.
    ///
    /// A configured record binds its connection to an existing controller
    /// that has none. An unconfigured mountpoint only yields a controller
    /// that already exists.
    pub fn controller_for_configured(
        &self,
        store: &dyn MountRecordStore,
        mountpoint: &Path,
    ) -> Result<Arc<MountController>> {
        if let Some(record) = store.mount_record(mountpoint) {
            return Ok(self.controller_for_record(&record));
        }
        self.controller_for(mountpoint, None, false)
            .ok_or_else(|| RmountError::MountpointNotConfigured {
                mountpoint: mountpoint.to_path_buf(),
            })
    }

    /// Must not touch controller locks: `start` takes the registry lock
    /// while holding its own.
    fn find(tables: &Tables, key: &Path) -> Option<Arc<MountController>> {
        tables
            .active
            .get(key)
            .cloned()
            .or_else(|| tables.pending.get(key).and_then(Weak::upgrade))
    }

    fn get_or_create(
        &self,
        mountpoint: &Path,
        connection_id: &str,
        remote_path: &str,
    ) -> Arc<MountController> {
        let key = normalize_mountpoint(mountpoint);
        let connection_id = connection_id.trim();
        let mut tables = self.registry.lock();

        if let Some(existing) = Self::find(&tables, &key) {
            drop(tables);
            existing.bind_connection(connection_id, remote_path);
            return existing;
        }

        tables.pending.retain(|_, w| w.strong_count() > 0);
        let controller = Arc::new(self.build_controller(
            key.clone(),
            connection_id.to_string(),
            remote_path.to_string(),
        ));
        tables.pending.insert(key, Arc::downgrade(&controller));
        debug!("New controller for {}", controller.mountpoint().display());
        controller
    }

    fn build_controller(
        &self,
        mountpoint: PathBuf,
        connection_id: String,
        remote_path: String,
    ) -> MountController {
        MountController::new(
            mountpoint,
            connection_id,
            remote_path,
            Arc::clone(&self.config),
            Arc::clone(&self.probe),
            Arc::downgrade(&self.registry),
        )
    }

    /// Registered controllers, in no particular order
    pub fn controllers(&self) -> Vec<Arc<MountController>> {
        self.registry.lock().active.values().cloned().collect()
    }

    /// Every registered mountpoint, whatever its state
    pub fn tracked_mountpoints(&self) -> BTreeSet<PathBuf> {
        self.registry.lock().active.keys().cloned().collect()
    }

    /// Mountpoints whose helper has been confirmed mounted
    pub fn active_mountpoints(&self) -> BTreeSet<PathBuf> {
        // Snapshot first; controllers take their own lock
        self.controllers()
            .into_iter()
            .filter(|c| c.is_mounted())
            .map(|c| c.mountpoint().to_path_buf())
            .collect()
    }

    /// Whether a tracked helper may be running at `mountpoint`
    pub fn is_tracked_active(&self, mountpoint: &Path) -> bool {
        self.controller_for(mountpoint, None, false)
            .is_some_and(|c| c.is_active())
    }

    /// Refuse to proceed while anything is mounted at `mountpoint`, tracked
    /// or not. Used before a configured mount is renamed or removed.
    pub async fn ensure_inactive(&self, mountpoint: &Path) -> Result<()> {
        if self.is_tracked_active(mountpoint) || self.probe.is_mounted(mountpoint).await? {
            return Err(RmountError::MountpointActive {
                mountpoint: mountpoint.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Unmount `mountpoint` whoever owns it.
    ///
    /// A tracked helper is stopped and its controller discarded. Otherwise a
    /// foreign mount is detached with the unmount tool.
    pub async fn release(&self, mountpoint: &Path) -> Result<ReleaseOutcome> {
        if let Some(controller) = self.controller_for(mountpoint, None, false)
            && controller.is_active()
        {
            let result = controller.umount().await;
            controller.discard();
            result?;
            return Ok(ReleaseOutcome::Stopped);
        }

        if !self.probe.is_mounted(mountpoint).await? {
            debug!("Nothing mounted at {}", mountpoint.display());
            return Ok(ReleaseOutcome::NotMounted);
        }

        match unmount_with_tool(
            &self.config.unmount_tool,
            mountpoint,
            self.config.unmount_timeout,
        )
        .await
        {
            Ok(()) => Ok(ReleaseOutcome::ForeignUnmounted),
            Err(e) => {
                warn!("Could not unmount {}: {}", mountpoint.display(), e);
                Ok(ReleaseOutcome::ForeignUnmountFailed)
            }
        }
    }

    /// Stop every tracked helper and discard its controller.
    pub async fn shutdown(&self) -> Vec<(PathBuf, Result<()>)> {
        let controllers = self.controllers();
        if !controllers.is_empty() {
            info!("Stopping {} mount helper(s)", controllers.len());
        }

        let mut results = Vec::with_capacity(controllers.len());
        for controller in controllers {
            let result = controller.umount().await;
            controller.discard();
            results.push((controller.mountpoint().to_path_buf(), result));
        }
        results
    }
}
