use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Env {
    tmp: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> PathBuf {
        self.tmp.path().join("config.json")
    }

    fn dir(&self, name: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    fn rmount(&self) -> Command {
        let mut cmd = Command::cargo_bin("rmount").unwrap();
        cmd.env("RMOUNT_CONFIG", self.config())
            .env_remove("RUST_LOG")
            .env_remove("RMOUNT_HELPER");
        cmd
    }

    fn add(&self, connection: &str, mountpoint: &Path) {
        self.rmount()
            .args(["add", connection])
            .arg(mountpoint)
            .assert()
            .success();
    }
}

#[test]
fn test_list_without_settings() {
    let env = Env::new();
    env.rmount()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No mounts configured"));
    assert!(!env.config().exists());
}

#[test]
fn test_add_list_label_remove() {
    let env = Env::new();
    let drive = env.dir("drive");

    env.rmount()
        .args(["add", "gdrive"])
        .arg(&drive)
        .args(["--label", "Work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));

    env.rmount()
        .args(["list", "--detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Work"))
        .stdout(predicate::str::contains("gdrive:/"))
        .stdout(predicate::str::contains("not mounted"));

    env.rmount()
        .arg("label")
        .arg(&drive)
        .assert()
        .success()
        .stdout(predicate::str::contains("'gdrive'"));

    env.rmount().arg("remove").arg(&drive).assert().success();
    env.rmount()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No mounts configured"));

    // Saved over an existing file, so a backup was kept
    assert!(env.tmp.path().join("config.json.bak").exists());
}

#[test]
fn test_settings_use_legacy_layout() {
    let env = Env::new();
    let drive = env.dir("drive");
    env.add("gdrive:", &drive);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.config()).unwrap()).unwrap();
    let record = &raw["Q"]["mount_list"][0];
    assert_eq!(record["connection"], "gdrive");
    assert_eq!(record["mountpoint"], drive.display().to_string());
}

#[test]
fn test_add_rejects_unusable_mountpoints() {
    let env = Env::new();
    let drive = env.dir("drive");
    env.add("gdrive", &drive);

    env.rmount()
        .args(["add", "dropbox"])
        .arg(&drive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already configured"));

    let full = env.dir("full");
    std::fs::write(full.join("file.txt"), "data").unwrap();
    env.rmount()
        .args(["add", "dropbox"])
        .arg(&full)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not empty"));

    env.rmount()
        .args(["add", "dropbox"])
        .arg(env.tmp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an existing directory"));
}

#[test]
fn test_remove_unknown_mount_fails() {
    let env = Env::new();
    env.rmount()
        .args(["remove", "/not/configured"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No mount configured"));
}

#[test]
fn test_remotes_from_rclone_config() {
    let env = Env::new();
    let rclone_conf = env.tmp.path().join("rclone.conf");
    std::fs::write(&rclone_conf, "[gdrive]\ntype = drive\n\n[box]\ntype = box\n").unwrap();
    let settings = serde_json::json!({
        "Q": { "main": { "rclone_config": rclone_conf }, "mount_list": [] }
    });
    std::fs::write(env.config(), settings.to_string()).unwrap();

    env.rmount()
        .arg("remotes")
        .assert()
        .success()
        .stdout("gdrive\nbox\n");
}

#[test]
fn test_status_json() {
    let env = Env::new();
    let drive = env.dir("drive");
    env.add("gdrive", &drive);

    let output = env.rmount().args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["configured"][0]["connection"], "gdrive");
    assert_eq!(status["configured"][0]["mounted"], false);
}

#[test]
fn test_release_when_nothing_mounted() {
    let env = Env::new();
    let drive = env.dir("drive");
    env.rmount()
        .arg("release")
        .arg(&drive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing mounted"));
}

#[cfg(unix)]
#[test]
fn test_mount_reports_helper_failure() {
    use std::os::unix::fs::PermissionsExt;

    let env = Env::new();
    let drive = env.dir("drive");
    env.add("gdrive", &drive);

    let helper = env.tmp.path().join("rclone");
    std::fs::write(
        &helper,
        "#!/bin/sh\necho 'Failed to create file system: bad credentials' >&2\nexit 1\n",
    )
    .unwrap();
    std::fs::set_permissions(&helper, std::fs::Permissions::from_mode(0o755)).unwrap();

    env.rmount()
        .env("RMOUNT_HELPER", &helper)
        .args(["mount", "--all"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Starting"))
        .stderr(predicate::str::contains("bad credentials"))
        .stderr(predicate::str::contains("1 mount(s) failed"));
}

#[test]
fn test_mount_requires_a_target() {
    let env = Env::new();
    env.rmount().arg("mount").assert().failure();
}
