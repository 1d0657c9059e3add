pub mod config;
pub mod error;
pub mod mount;
pub mod platform;
pub mod remotes;
pub mod utils;

pub use config::{MainSettings, MountRecord, MountRecordStore, MountSettings, check_new_mountpoint};
pub use error::{Result, RmountError};
pub use mount::{
    HelperExit, MountController, MountEvent, MountProbe, MountState, MountSupervisor,
    ReleaseOutcome, SupervisorConfig, SystemMountTable,
};
pub use platform::{Platform, PlatformInfo, detect_platform};
pub use remotes::{RcloneConfigCatalog, RemoteCatalog};
