use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::probe::MountProbe;
use super::types::MountEntry;
use crate::error::Result;

/// In-memory mount table for testing
#[derive(Clone, Default)]
pub struct StaticMountTable {
    entries: Arc<Mutex<Vec<MountEntry>>>,
}

impl StaticMountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, root: &Path) {
        self.entries.lock().unwrap().push(MountEntry {
            root: root.to_path_buf(),
            source: "mock:".to_string(),
            fs_type: "fuse.mock".to_string(),
            options: vec!["rw".to_string()],
        });
    }

    pub fn remove(&self, root: &Path) {
        self.entries.lock().unwrap().retain(|e| e.root != root);
    }
}

#[async_trait]
impl MountProbe for StaticMountTable {
    async fn mounted_volumes(&self) -> Result<Vec<MountEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_mount_table() {
        let table = StaticMountTable::new();
        let root = Path::new("/tmp/static-mount");
        assert!(!table.is_mounted(root).await.unwrap());

        table.insert(root);
        assert!(table.is_mounted(root).await.unwrap());
        assert_eq!(table.entry_for(root).await.unwrap().unwrap().source, "mock:");

        table.remove(root);
        assert!(!table.is_mounted(root).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_query_matches_resolved_row() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("mnt");
        std::fs::create_dir(&dir).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        let table = StaticMountTable::new();
        table.insert(&std::fs::canonicalize(&dir).unwrap());
        assert!(table.is_mounted(&link).await.unwrap());
        assert!(!table.is_mounted(tmp.path()).await.unwrap());
    }
}
