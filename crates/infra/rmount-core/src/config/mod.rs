mod manager;
mod types;
mod validation;

pub use manager::{MountRecordStore, MountSettings};
pub use types::{MainSettings, MountRecord, Settings, SettingsFile};
pub use validation::{RecordValidator, check_new_mountpoint};
