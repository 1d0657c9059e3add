mod constants;
mod detector;

pub use constants::*;
pub use detector::{Platform, PlatformInfo, detect_platform, find_unmount_tool, resolve_helper_path};
