//! End-to-end runs of the binary with stub collaborator scripts.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A working directory with a daily source folder holding `videos` fake
/// mp4 files. Cover strategy `manifest` keeps the runs offline.
fn seeded_workspace(videos: usize) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let source_root = dir.path().join("source");
    let daily = source_root.join("20250820");
    fs::create_dir_all(&daily).unwrap();
    for i in 0..videos {
        fs::write(daily.join(format!("clip{i}.mp4")), b"fake").unwrap();
    }
    (dir, source_root)
}

fn runner(dir: &TempDir, source_root: &Path, upload_script: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sora-sync").expect("binary exists");
    cmd.current_dir(dir.path())
        .arg("latest")
        .arg("0")
        .arg("15")
        .arg(source_root)
        .arg("manifest")
        .arg("5")
        .arg("--upload-cmd")
        .arg(upload_script);
    cmd
}

#[test]
fn upload_success_cleans_up_and_exits_zero() {
    // Scenario A, with upload stubbed to succeed.
    let (dir, source_root) = seeded_workspace(3);
    let upload = write_script(dir.path(), "upload.sh", "exit 0");

    runner(&dir, &source_root, &upload)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline complete"));

    // Cleanup consumed the record and the synced files.
    assert!(!dir.path().join("videos/.sync_last.json").exists());
    assert!(!dir.path().join("videos/clip0.mp4").exists());
}

#[test]
fn nothing_to_upload_is_overall_success() {
    // Scenario B: the quota/no-op sentinel still exits 0.
    let (dir, source_root) = seeded_workspace(0);
    let upload = write_script(dir.path(), "upload.sh", "exit 2");

    runner(&dir, &source_root, &upload).assert().success();
    assert!(!dir.path().join("videos/.sync_last.json").exists());
}

#[test]
fn rerunning_on_an_empty_source_stays_successful() {
    let (dir, source_root) = seeded_workspace(0);
    let upload = write_script(dir.path(), "upload.sh", "exit 2");

    runner(&dir, &source_root, &upload).assert().success();
    runner(&dir, &source_root, &upload).assert().success();
}

#[test]
fn upload_failure_preserves_record_and_files_for_retry() {
    // Scenario C: generic upload failure, cleanup never runs.
    let (dir, source_root) = seeded_workspace(2);
    let upload = write_script(dir.path(), "upload.sh", "exit 1");

    runner(&dir, &source_root, &upload).assert().code(1);

    assert!(dir.path().join("videos/.sync_last.json").exists());
    assert!(dir.path().join("videos/clip0.mp4").exists());
    assert!(dir.path().join("videos/clip1.mp4").exists());
}

#[test]
fn sync_failure_never_reaches_upload() {
    let (dir, _) = seeded_workspace(0);
    // Upload would succeed, but the marker file proves it never ran.
    let upload = write_script(dir.path(), "upload.sh", "touch upload_ran; exit 0");
    let missing_root = dir.path().join("no-such-root");

    runner(&dir, &missing_root, &upload)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Pipeline failed"));
    assert!(!dir.path().join("upload_ran").exists());
}

#[test]
fn external_sync_and_cleanup_commands_are_honoured() {
    let (dir, source_root) = seeded_workspace(0);
    let sync = write_script(dir.path(), "sync.sh", "touch sync_ran; exit 0");
    let upload = write_script(dir.path(), "upload.sh", "exit 2");
    let cleanup = write_script(dir.path(), "cleanup.sh", "touch cleanup_ran; exit 0");

    let mut cmd = runner(&dir, &source_root, &upload);
    cmd.arg("--sync-cmd")
        .arg(&sync)
        .arg("--cleanup-cmd")
        .arg(&cleanup);
    cmd.assert().success();

    assert!(dir.path().join("sync_ran").exists());
    assert!(dir.path().join("cleanup_ran").exists());
}

#[test]
fn cleanup_failure_exits_nonzero() {
    let (dir, source_root) = seeded_workspace(1);
    let upload = write_script(dir.path(), "upload.sh", "exit 0");
    let cleanup = write_script(dir.path(), "cleanup.sh", "exit 1");

    let mut cmd = runner(&dir, &source_root, &upload);
    cmd.arg("--cleanup-cmd").arg(&cleanup);
    cmd.assert().code(1);
}
