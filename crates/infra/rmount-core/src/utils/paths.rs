use std::path::{Component, Path, PathBuf};

/// Expand tilde (~) in paths to home directory.
///
/// Paths are returned unchanged when the home directory is unknown.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(stripped) = path_str.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    if path_str == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    path.to_path_buf()
}

/// Lexically normalize a mountpoint: expand `~`, drop `.` segments, resolve
/// `..` and strip trailing separators. Symlinks are left alone so that the
/// registry key does not depend on whether the helper is already serving the
/// directory.
pub fn normalize_mountpoint(path: &Path) -> PathBuf {
    let expanded = expand_path(path);
    let mut out = PathBuf::new();
    for component in expanded.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// A path as it would appear in the mount table: symlinks resolved where
/// the path exists, lexically normalized otherwise.
///
/// `canonicalize` can block on a stale network mount, so it runs on the
/// blocking pool.
pub async fn resolve_mount_root(path: &Path) -> PathBuf {
    let normalized = normalize_mountpoint(path);
    let query = normalized.clone();
    tokio::task::spawn_blocking(move || std::fs::canonicalize(&query))
        .await
        .ok()
        .and_then(std::result::Result::ok)
        .unwrap_or(normalized)
}

/// Lexical comparison of a mount table row against a query, given both the
/// query as typed and its resolved form. Never touches the filesystem.
pub fn same_mount_root(row: &Path, query: &Path, resolved: &Path) -> bool {
    let row = normalize_mountpoint(row);
    row == normalize_mountpoint(query) || row == resolved
}

/// Default settings file: `<config dir>/rmount/config.json`
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(base.join("rmount").join("config.json"))
}

/// Helper's own config, listing the available remotes
pub fn default_rclone_config_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".config").join("rclone").join("rclone.conf"))
}
