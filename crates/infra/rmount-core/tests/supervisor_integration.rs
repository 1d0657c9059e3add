#![cfg(all(test, unix))]

use rmount_core::{MountEvent, MountProbe, MountState, MountSupervisor, SupervisorConfig, SystemMountTable};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn supervisor(dir: &Path) -> MountSupervisor {
    let config = SupervisorConfig {
        helper_path: write_script(
            dir,
            "rclone",
            "echo \"$@\" > \"$3.args\"\nwhile [ ! -e \"$3.released\" ]; do sleep 0.05; done",
        ),
        remote_path: "/".to_string(),
        unmount_tool: write_script(dir, "fusermount", "touch \"$2.released\""),
        unmount_timeout: Duration::from_secs(5),
        kill_grace: Duration::from_secs(2),
    };
    MountSupervisor::with_system_probe(config)
}

#[tokio::test]
async fn test_full_lifecycle_with_fake_helper() {
    let tmp = TempDir::new().unwrap();
    let mountpoint = tmp.path().join("drive");
    std::fs::create_dir_all(&mountpoint).unwrap();
    let sup = supervisor(tmp.path());

    let controller = sup.controller_for(&mountpoint, Some("gdrive"), true).unwrap();
    let mut events = controller.subscribe();
    assert!(controller.start());

    let mut seen = Vec::new();
    while seen.len() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(event);
    }
    assert!(matches!(seen[0], MountEvent::Started { .. }));
    assert!(matches!(seen[1], MountEvent::Mounted { .. }));
    assert!(sup.active_mountpoints().contains(&mountpoint));

    let args = std::fs::read_to_string(tmp.path().join("drive.args")).unwrap();
    assert_eq!(args.trim(), format!("mount gdrive:/ {}", mountpoint.display()));

    // The fake helper never mounts anything for real
    let probe = SystemMountTable::new();
    assert!(!probe.is_mounted(&mountpoint).await.unwrap());
    assert!(!controller.is_externally_mounted().await.unwrap());

    controller.umount().await.unwrap();
    assert_eq!(controller.state(), MountState::Terminated);
    assert!(sup.active_mountpoints().is_empty());
    assert!(sup.tracked_mountpoints().is_empty());
}

#[tokio::test]
async fn test_clones_share_registry() {
    let tmp = TempDir::new().unwrap();
    let mountpoint = tmp.path().join("drive");
    std::fs::create_dir_all(&mountpoint).unwrap();
    let sup = supervisor(tmp.path());
    let other = sup.clone();

    let controller = sup.controller_for(&mountpoint, Some("gdrive"), true).unwrap();
    assert!(controller.start());
    let seen = other.controller_for(&mountpoint, None, false).unwrap();
    assert!(Arc::ptr_eq(&controller, &seen));

    let results = other.shutdown().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].1.is_ok());
    assert!(sup.tracked_mountpoints().is_empty());
}
