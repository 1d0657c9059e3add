mod controller;
mod probe;
mod process;
mod supervisor;
mod system;
mod types;

#[cfg(test)]
mod mock;

pub use controller::MountController;
pub use probe::{MountProbe, SystemMountTable, parse_mount_output, parse_mountinfo, parse_proc_mounts};
pub use process::classify_exit;
pub use supervisor::{MountSupervisor, ReleaseOutcome, SupervisorConfig};
pub use system::unmount_with_tool;
pub use types::*;

#[cfg(test)]
pub use mock::StaticMountTable;
